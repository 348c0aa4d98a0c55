//! VRender Present - Frame presentation coordinator
//!
//! A producer thread hands decoded frames to a [`FrameSender`]; the render
//! thread owns a [`Renderer`] that drains the latest frame, keeps textures
//! and the video program in sync with its format and draws it letterboxed
//! with the subtitle overlay on top.

pub mod config;
pub mod events;
mod mailbox;
pub mod osd;
pub mod renderer;

pub use config::RendererConfig;
pub use events::RenderEvent;
pub use mailbox::FrameSender;
pub use osd::{OsdImage, SubtitleBitmap};
pub use renderer::Renderer;
