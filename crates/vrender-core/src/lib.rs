//! VRender Core - Foundation types for video presentation
//!
//! This crate provides the fundamental types used throughout VRender:
//! - Pixel formats and their per-type texture layout table
//! - Decoded frame buffers
//! - Effect flags
//! - Rectangles, letterboxing and frame geometry resolution

pub mod effects;
pub mod error;
pub mod format;
pub mod frame;
pub mod geometry;
pub mod layout;

pub use effects::Effects;
pub use error::{Result, VRenderError};
pub use format::{
    ChromaSampling, Extent, FormatLayout, PixelType, SlotLayout, TexelFormat, VideoFormat,
    MAX_PLANES,
};
pub use frame::{FramePlane, VideoFrame};
pub use geometry::{Alignment, Point, Rect, Size};
pub use layout::{GeometryResolver, Letterbox, TexCoords, VertexUpdate};

/// Ratio comparison tolerance used for aspect and crop overrides.
pub const RATIO_EPSILON: f64 = 1e-5;

/// Whether two aspect/crop ratios should be treated as equal.
#[inline]
pub fn is_same_ratio(a: f64, b: f64) -> bool {
    (a - b).abs() < RATIO_EPSILON
}
