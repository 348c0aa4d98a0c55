//! [`RenderBackend`] on top of wgpu, rendering into an offscreen target.
//!
//! Draws are recorded between `begin_pass` and `end_pass` and encoded into a
//! single render pass when the pass ends. The target can be read back as an
//! RGBA image.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, trace};
use vrender_core::{Result, Size, TexelFormat, VRenderError};
use wgpu::util::DeviceExt;

use crate::backend::{ProgramDesc, ProgramId, Quad, RenderBackend, TextureDesc, TextureId, Vertex};
use crate::context::GpuContext;
use crate::shader::VideoUniforms;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

fn texture_format(format: TexelFormat) -> wgpu::TextureFormat {
    match format {
        TexelFormat::R8 => wgpu::TextureFormat::R8Unorm,
        TexelFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
        TexelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TexelFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
    }
}

/// A sampled texture and its view.
struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    row_bytes: u32,
}

impl GpuTexture {
    fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: Option<&str>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let row_bytes = width * format.block_copy_size(None).unwrap_or(4);
        Self {
            texture,
            view,
            width,
            height,
            row_bytes,
        }
    }

    fn write(&self, queue: &wgpu::Queue, data: &[u8], bytes_per_row: u32) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

struct Program {
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
}

struct PendingDraw {
    program: ProgramId,
    textures: [Option<TextureId>; 3],
    vertices: [Vertex; 4],
}

struct Pass {
    viewport: Size,
    clear: [f32; 4],
    draws: Vec<PendingDraw>,
}

/// wgpu implementation of the presenter's graphics contract.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    placeholder: GpuTexture,
    textures: HashMap<TextureId, GpuTexture>,
    programs: HashMap<ProgramId, Program>,
    target: Option<GpuTexture>,
    pass: Option<Pass>,
    next_id: u32,
}

impl WgpuBackend {
    pub fn new(ctx: &GpuContext) -> Self {
        let device = Arc::clone(&ctx.device);
        let queue = Arc::clone(&ctx.queue);

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Video Bind Group Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<VideoUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Video Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Video Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // Bound in place of unused slots.
        let placeholder = GpuTexture::new(
            &device,
            1,
            1,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            Some("Placeholder Texture"),
        );
        placeholder.write(&queue, &[0, 0, 0, 255], 4);

        Self {
            device,
            queue,
            bind_group_layout,
            pipeline_layout,
            sampler,
            placeholder,
            textures: HashMap::new(),
            programs: HashMap::new(),
            target: None,
            pass: None,
            next_id: 0,
        }
    }

    /// Create a context and a backend in one go.
    pub fn new_blocking() -> Result<Self> {
        let ctx = GpuContext::new_blocking()?;
        Ok(Self::new(&ctx))
    }

    /// Size of the current render target, if a pass has completed.
    pub fn target_size(&self) -> Option<(u32, u32)> {
        self.target.as_ref().map(|t| (t.width, t.height))
    }

    /// Copy the render target back to the CPU.
    pub fn read_pixels(&self) -> Result<RgbaImage> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| VRenderError::Gpu("nothing rendered yet".to_string()))?;

        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let unpadded = target.row_bytes;
        let padded = unpadded.div_ceil(align) * align;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: padded as u64 * target.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(target.height),
                },
            },
            wgpu::Extent3d {
                width: target.width,
                height: target.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| VRenderError::Gpu(format!("readback channel closed: {e}")))?
            .map_err(|e| VRenderError::Gpu(format!("failed to map readback buffer: {e}")))?;

        let mut pixels = Vec::with_capacity((unpadded * target.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded as usize) {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();

        RgbaImage::from_raw(target.width, target.height, pixels)
            .ok_or_else(|| VRenderError::Image("readback size mismatch".to_string()))
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn ensure_target(&mut self, viewport: Size) {
        let width = (viewport.width.round() as u32).max(1);
        let height = (viewport.height.round() as u32).max(1);
        if self.target_size() == Some((width, height)) {
            return;
        }
        debug!(width, height, "allocating render target");
        self.target = Some(GpuTexture::new(
            &self.device,
            width,
            height,
            TARGET_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            Some("Render Target"),
        ));
    }

    fn view(&self, id: Option<TextureId>) -> Result<&wgpu::TextureView> {
        match id {
            None => Ok(&self.placeholder.view),
            Some(id) => self
                .textures
                .get(&id)
                .map(|t| &t.view)
                .ok_or_else(|| VRenderError::Gpu(format!("unknown texture {id:?}"))),
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(VRenderError::Gpu(format!(
                "texture size {}x{} outside 1..={max}",
                desc.width, desc.height
            )));
        }
        let id = TextureId(self.next());
        let texture = GpuTexture::new(
            &self.device,
            desc.width,
            desc.height,
            texture_format(desc.format),
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            Some(desc.label),
        );
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.remove(&id) {
            texture.texture.destroy();
        }
    }

    fn write_texture(&mut self, id: TextureId, data: &[u8], bytes_per_row: u32) -> Result<()> {
        let texture = self
            .textures
            .get(&id)
            .ok_or_else(|| VRenderError::Gpu(format!("write into unknown texture {id:?}")))?;
        let needed = bytes_per_row as usize * (texture.height as usize - 1) + texture.row_bytes as usize;
        if bytes_per_row < texture.row_bytes || data.len() < needed {
            return Err(VRenderError::Gpu(format!(
                "write of {} bytes ({} per row) does not fill {}x{} texture",
                data.len(),
                bytes_per_row,
                texture.width,
                texture.height
            )));
        }
        texture.write(&self.queue, data, bytes_per_row);
        Ok(())
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });
        let blend = if desc.alpha_blend {
            wgpu::BlendState::ALPHA_BLENDING
        } else {
            wgpu::BlendState::REPLACE
        };
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &VERTEX_ATTRIBUTES,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(VRenderError::Shader(format!("{}: {err}", desc.label)));
        }

        let uniforms = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Video Uniforms"),
            size: std::mem::size_of::<VideoUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = ProgramId(self.next());
        debug!(program = id.0, label = desc.label, "compiled program");
        self.programs.insert(id, Program { pipeline, uniforms });
        Ok(id)
    }

    fn destroy_program(&mut self, id: ProgramId) {
        if let Some(program) = self.programs.remove(&id) {
            program.uniforms.destroy();
        }
    }

    fn bind_uniforms(&mut self, program: ProgramId, uniforms: &VideoUniforms) -> Result<()> {
        let program = self
            .programs
            .get(&program)
            .ok_or_else(|| VRenderError::Gpu(format!("unknown program {program:?}")))?;
        self.queue
            .write_buffer(&program.uniforms, 0, bytemuck::bytes_of(uniforms));
        Ok(())
    }

    fn begin_pass(&mut self, viewport: Size, clear: [f32; 4]) -> Result<()> {
        if self.pass.is_some() {
            return Err(VRenderError::Gpu("pass already open".to_string()));
        }
        self.pass = Some(Pass {
            viewport,
            clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw_quad(
        &mut self,
        program: ProgramId,
        textures: [Option<TextureId>; 3],
        quad: &Quad,
    ) -> Result<()> {
        if !self.programs.contains_key(&program) {
            return Err(VRenderError::Gpu(format!("unknown program {program:?}")));
        }
        let pass = self
            .pass
            .as_mut()
            .ok_or_else(|| VRenderError::Gpu("draw outside of a pass".to_string()))?;
        pass.draws.push(PendingDraw {
            program,
            textures,
            vertices: quad.to_ndc(pass.viewport),
        });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        let pass = self
            .pass
            .take()
            .ok_or_else(|| VRenderError::Gpu("no pass to end".to_string()))?;
        self.ensure_target(pass.viewport);

        let mut prepared = Vec::with_capacity(pass.draws.len());
        for draw in &pass.draws {
            let program = self
                .programs
                .get(&draw.program)
                .ok_or_else(|| VRenderError::Gpu(format!("unknown program {:?}", draw.program)))?;
            let [v0, v1, v2] = [
                self.view(draw.textures[0])?,
                self.view(draw.textures[1])?,
                self.view(draw.textures[2])?,
            ];
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Video Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(v0),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(v1),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(v2),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: program.uniforms.as_entire_binding(),
                    },
                ],
            });
            let vertices = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Quad Vertices"),
                    contents: bytemuck::cast_slice(&draw.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            prepared.push((&program.pipeline, bind_group, vertices));
        }

        let target = self
            .target
            .as_ref()
            .ok_or_else(|| VRenderError::Gpu("render target missing".to_string()))?;
        let [r, g, b, a] = pass.clear.map(f64::from);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            for (pipeline, bind_group, vertices) in &prepared {
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, bind_group, &[]);
                rpass.set_vertex_buffer(0, vertices.slice(..));
                rpass.draw(0..4, 0..1);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        trace!(draws = prepared.len(), "submitted pass");
        Ok(())
    }
}
