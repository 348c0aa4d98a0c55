//! Notifications published by the renderer.

use vrender_core::{Point, Rect, VideoFormat};

/// Side-channel notification for layout code.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// A frame with a different type or size was presented.
    FormatChanged(VideoFormat),
    /// The visible (letterboxed) video rectangle moved or resized.
    ScreenRectChanged(Rect),
    OffsetChanged(Point),
}
