//! VRender GPU - Video texture upload and shader programs
//!
//! The presenter talks to the GPU through [`RenderBackend`]. [`WgpuBackend`]
//! renders with wgpu into an offscreen target; [`testing::RecordingBackend`]
//! records calls for tests.

pub mod backend;
pub mod context;
pub mod shader;
pub mod testing;
pub mod texture;
pub mod wgpu_backend;

pub use backend::{ProgramDesc, ProgramId, Quad, RenderBackend, TextureDesc, TextureId, Vertex};
pub use context::GpuContext;
pub use shader::{overlay_source, ProgramKey, ShaderParameterSet, VideoUniforms};
pub use texture::{TextureSlot, TextureUploadEngine};
pub use wgpu_backend::WgpuBackend;
