//! In-memory backend that records every call.
//!
//! Lets the presentation pipeline run in tests and benches without a GPU.
//! Texture writes are validated against the texture description the same
//! way a real backend would reject them.

use std::collections::HashMap;

use vrender_core::{Result, Size, VRenderError};

use crate::backend::{ProgramDesc, ProgramId, Quad, RenderBackend, TextureDesc, TextureId};
use crate::shader::VideoUniforms;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateTexture(TextureId, TextureDesc),
    DestroyTexture(TextureId),
    WriteTexture { id: TextureId, len: usize, bytes_per_row: u32 },
    CreateProgram(ProgramId),
    DestroyProgram(ProgramId),
    BindUniforms(ProgramId),
    BeginPass { viewport: Size, clear: [f32; 4] },
    DrawQuad {
        program: ProgramId,
        textures: [Option<TextureId>; 3],
        quad: Quad,
    },
    EndPass,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    textures: HashMap<TextureId, TextureDesc>,
    texture_data: HashMap<TextureId, Vec<u8>>,
    programs: HashMap<ProgramId, String>,
    uniforms: HashMap<ProgramId, VideoUniforms>,
    in_pass: bool,
    next_id: u32,
    fail_programs: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `create_program` fail with a shader error.
    pub fn fail_program_creation(&mut self, fail: bool) {
        self.fail_programs = fail;
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn texture_desc(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&id)
    }

    /// Bytes of the last write into `id`.
    pub fn texture_data(&self, id: TextureId) -> Option<&[u8]> {
        self.texture_data.get(&id).map(Vec::as_slice)
    }

    pub fn program_source(&self, id: ProgramId) -> Option<&str> {
        self.programs.get(&id).map(String::as_str)
    }

    /// Uniforms last bound for `id`.
    pub fn uniforms(&self, id: ProgramId) -> Option<&VideoUniforms> {
        self.uniforms.get(&id)
    }

    /// Draw calls recorded so far, in order.
    pub fn draws(&self) -> Vec<(ProgramId, [Option<TextureId>; 3], Quad)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::DrawQuad {
                    program,
                    textures,
                    quad,
                } => Some((*program, *textures, *quad)),
                _ => None,
            })
            .collect()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for RecordingBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        if desc.width == 0 || desc.height == 0 {
            return Err(VRenderError::Gpu(format!(
                "zero-sized texture {}x{}",
                desc.width, desc.height
            )));
        }
        let id = TextureId(self.next());
        self.textures.insert(id, *desc);
        self.calls.push(BackendCall::CreateTexture(id, *desc));
        Ok(id)
    }

    fn destroy_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
        self.texture_data.remove(&id);
        self.calls.push(BackendCall::DestroyTexture(id));
    }

    fn write_texture(&mut self, id: TextureId, data: &[u8], bytes_per_row: u32) -> Result<()> {
        let desc = self
            .textures
            .get(&id)
            .ok_or_else(|| VRenderError::Gpu(format!("write into unknown texture {id:?}")))?;
        let row = desc.row_bytes() as usize;
        let needed = bytes_per_row as usize * (desc.height as usize - 1) + row;
        if (bytes_per_row as usize) < row || data.len() < needed {
            return Err(VRenderError::Gpu(format!(
                "write of {} bytes ({} per row) does not fill {}x{} {:?}",
                data.len(),
                bytes_per_row,
                desc.width,
                desc.height,
                desc.format
            )));
        }
        self.texture_data.insert(id, data.to_vec());
        self.calls.push(BackendCall::WriteTexture {
            id,
            len: data.len(),
            bytes_per_row,
        });
        Ok(())
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId> {
        if self.fail_programs {
            return Err(VRenderError::Shader(format!("{} rejected", desc.label)));
        }
        let id = ProgramId(self.next());
        self.programs.insert(id, desc.source.to_string());
        self.calls.push(BackendCall::CreateProgram(id));
        Ok(id)
    }

    fn destroy_program(&mut self, id: ProgramId) {
        self.programs.remove(&id);
        self.uniforms.remove(&id);
        self.calls.push(BackendCall::DestroyProgram(id));
    }

    fn bind_uniforms(&mut self, program: ProgramId, uniforms: &VideoUniforms) -> Result<()> {
        if !self.programs.contains_key(&program) {
            return Err(VRenderError::Gpu(format!("unknown program {program:?}")));
        }
        self.uniforms.insert(program, *uniforms);
        self.calls.push(BackendCall::BindUniforms(program));
        Ok(())
    }

    fn begin_pass(&mut self, viewport: Size, clear: [f32; 4]) -> Result<()> {
        if self.in_pass {
            return Err(VRenderError::Gpu("pass already open".to_string()));
        }
        self.in_pass = true;
        self.calls.push(BackendCall::BeginPass { viewport, clear });
        Ok(())
    }

    fn draw_quad(
        &mut self,
        program: ProgramId,
        textures: [Option<TextureId>; 3],
        quad: &Quad,
    ) -> Result<()> {
        if !self.in_pass {
            return Err(VRenderError::Gpu("draw outside of a pass".to_string()));
        }
        if !self.programs.contains_key(&program) {
            return Err(VRenderError::Gpu(format!("unknown program {program:?}")));
        }
        if let Some(id) = textures.iter().flatten().find(|id| !self.textures.contains_key(*id)) {
            return Err(VRenderError::Gpu(format!("unknown texture {id:?}")));
        }
        self.calls.push(BackendCall::DrawQuad {
            program,
            textures,
            quad: *quad,
        });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        if !self.in_pass {
            return Err(VRenderError::Gpu("no pass to end".to_string()));
        }
        self.in_pass = false;
        self.calls.push(BackendCall::EndPass);
        Ok(())
    }
}
