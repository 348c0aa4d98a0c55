//! The graphics-pipeline contract the presenter drives.
//!
//! A backend owns GPU objects and hands out opaque ids for them. All calls
//! happen on the render thread; the ids are plain values so the presenter
//! can keep them without borrowing the backend.

use vrender_core::{Rect, Result, Size, TexCoords, TexelFormat};

use crate::shader::VideoUniforms;

/// Handle to a backend texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Handle to a compiled program (vertex + fragment stage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Texture creation parameters.
///
/// Textures are always sampled with linear filtering and clamp-to-edge
/// wrapping, and never carry mipmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TexelFormat,
}

impl TextureDesc {
    /// Bytes in one tightly packed row.
    #[inline]
    pub fn row_bytes(&self) -> u32 {
        self.width * self.format.bytes_per_texel()
    }
}

/// Program creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    pub label: &'static str,
    /// Complete WGSL module exposing `vs_main` and `fs_main`.
    pub source: &'a str,
    /// Blend over the existing target contents instead of replacing them.
    pub alpha_blend: bool,
}

/// Quad vertex: item-space position plus texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

/// Four vertices drawn as a triangle strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub vertices: [Vertex; 4],
}

impl Quad {
    /// Quad covering `rect` and sampling `tex`.
    pub fn new(rect: Rect, tex: TexCoords) -> Self {
        let (l, t) = (rect.x, rect.y);
        let (r, b) = (rect.x + rect.width, rect.y + rect.height);
        let v = |x: f32, y: f32, u: f32, w: f32| Vertex {
            position: [x, y],
            tex_coord: [u, w],
        };
        Self {
            vertices: [
                v(l, t, tex.left, tex.top),
                v(l, b, tex.left, tex.bottom),
                v(r, t, tex.right, tex.top),
                v(r, b, tex.right, tex.bottom),
            ],
        }
    }

    /// Destination rectangle in item space.
    pub fn rect(&self) -> Rect {
        let [tl, _, _, br] = self.vertices;
        Rect::from_corners(tl.position.into(), br.position.into())
    }

    /// Texture rectangle sampled by the quad.
    pub fn tex_coords(&self) -> TexCoords {
        let [tl, _, _, br] = self.vertices;
        TexCoords {
            left: tl.tex_coord[0],
            top: tl.tex_coord[1],
            right: br.tex_coord[0],
            bottom: br.tex_coord[1],
        }
    }

    /// Vertices mapped from item space into normalized device coordinates.
    pub fn to_ndc(&self, viewport: Size) -> [Vertex; 4] {
        let w = viewport.width.max(1.0);
        let h = viewport.height.max(1.0);
        self.vertices.map(|v| Vertex {
            position: [v.position[0] / w * 2.0 - 1.0, 1.0 - v.position[1] / h * 2.0],
            tex_coord: v.tex_coord,
        })
    }
}

/// Rendering operations needed to present video frames.
pub trait RenderBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId>;

    fn destroy_texture(&mut self, id: TextureId);

    /// Replace the whole contents of `id`.
    ///
    /// `data` holds `height` rows of `bytes_per_row` bytes (the last row may
    /// be cut to the texture row size).
    fn write_texture(&mut self, id: TextureId, data: &[u8], bytes_per_row: u32) -> Result<()>;

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId>;

    fn destroy_program(&mut self, id: ProgramId);

    /// Set the uniform block used by the next draws with `program`.
    fn bind_uniforms(&mut self, program: ProgramId, uniforms: &VideoUniforms) -> Result<()>;

    /// Start a frame of `viewport` size, cleared to `clear`.
    fn begin_pass(&mut self, viewport: Size, clear: [f32; 4]) -> Result<()>;

    /// Draw `quad` sampling up to three textures (`p1`..`p3`).
    fn draw_quad(
        &mut self,
        program: ProgramId,
        textures: [Option<TextureId>; 3],
        quad: &Quad,
    ) -> Result<()>;

    /// Submit the frame.
    fn end_pass(&mut self) -> Result<()>;
}
