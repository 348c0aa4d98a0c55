//! Frame geometry: letterboxed destination rectangle, texture coordinates,
//! alignment and offsets.
//!
//! The resolver keeps the state that drives the video quad (item size,
//! aspect and crop overrides, display aspect, alignment, percent offset) and
//! caches the last frame rectangle. It is recomputed when one of these inputs
//! or the format changes, never while uploading planes.

use glam::Vec2;

use crate::effects::Effects;
use crate::format::VideoFormat;
use crate::geometry::{Alignment, Point, Rect, Size};
use crate::is_same_ratio;

/// Aspect/crop override sentinel: follow the item's own box.
pub const RATIO_AUTO_FIT: f64 = 0.0;
/// Aspect/crop override sentinel: no override.
pub const RATIO_UNSET: f64 = -1.0;

/// Preferred item size when no frame has been presented.
const EMPTY_SIZE_HINT: (u32, u32) = (400, 300);

/// Texture-space rectangle sampled by the video quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexCoords {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Default for TexCoords {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: 1.0,
            bottom: 1.0,
        }
    }
}

/// Result of [`GeometryResolver::update_vertex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexUpdate {
    /// Destination rectangle of the video quad, offset applied.
    pub vertex: Rect,
    pub tex: TexCoords,
    /// Visible screen rectangle after letterboxing.
    pub screen: Rect,
    /// Whether `screen` differs from the previous update.
    pub screen_changed: bool,
}

/// Visible screen rectangle and the black bars around it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Letterbox {
    bounds: Rect,
    screen: Rect,
}

impl Letterbox {
    /// Update with the item bounds and the requested video rectangle.
    /// Returns true if the visible screen rectangle changed.
    pub fn set(&mut self, bounds: Rect, video: Rect) -> bool {
        let screen = bounds.intersection(video).unwrap_or_default();
        let changed = screen != self.screen;
        self.bounds = bounds;
        self.screen = screen;
        changed
    }

    /// Visible part of the video rectangle.
    #[inline]
    pub fn screen(&self) -> Rect {
        self.screen
    }

    /// Non-empty bars (top, bottom, left, right) that cover the rest of the item.
    pub fn bars(&self) -> Vec<Rect> {
        let b = self.bounds;
        let s = self.screen;
        if s.is_empty() {
            return if b.is_empty() { Vec::new() } else { vec![b] };
        }
        let s_bottom = s.y + s.height;
        let s_right = s.x + s.width;
        [
            Rect::new(b.x, b.y, b.width, s.y - b.y),
            Rect::new(b.x, s_bottom, b.width, b.y + b.height - s_bottom),
            Rect::new(b.x, s.y, s.x - b.x, s.height),
            Rect::new(s_right, s.y, b.x + b.width - s_right, s.height),
        ]
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect()
    }
}

/// Letterbox a source aspect inside `area`.
///
/// A box with the crop ratio is first fitted into the area; a box with the
/// target aspect is then expanded to cover it. The result is centered in
/// `area`.
pub fn frame_rect(area: Rect, target_aspect: f64, crop_ratio: f64) -> Rect {
    let letter = Size::new(crop_ratio as f32, 1.0).scaled_to_fit(area.size());
    let frame = Size::new(target_aspect as f32, 1.0).scaled_to_cover(letter);
    let x = area.x + (area.width - frame.width) * 0.5;
    let y = area.y + (area.height - frame.height) * 0.5;
    Rect::new(x, y, frame.width, frame.height)
}

/// Owns the geometry state of the video surface.
#[derive(Debug, Clone)]
pub struct GeometryResolver {
    item: Size,
    format: VideoFormat,
    aspect: f64,
    crop: f64,
    dar: f64,
    alignment: Alignment,
    offset: Point,
    vtx: Rect,
    letterbox: Letterbox,
}

impl Default for GeometryResolver {
    fn default() -> Self {
        Self {
            item: Size::default(),
            format: VideoFormat::empty(),
            aspect: RATIO_UNSET,
            crop: RATIO_UNSET,
            dar: 0.0,
            alignment: Alignment::CENTER,
            offset: Point::ZERO,
            vtx: Rect::default(),
            letterbox: Letterbox::default(),
        }
    }
}

impl GeometryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aspect ratio of the item box.
    pub fn item_aspect_ratio(&self) -> f64 {
        self.item.aspect_ratio()
    }

    /// Aspect ratio the frame is displayed with.
    ///
    /// Explicit override > 0 wins; 0 follows the item box; otherwise the
    /// stream's display aspect if meaningful, else the raw pixel aspect.
    pub fn target_aspect_ratio(&self) -> f64 {
        if self.aspect > 0.0 {
            return self.aspect;
        }
        if self.aspect == RATIO_AUTO_FIT {
            return self.item_aspect_ratio();
        }
        if self.dar > 0.01 {
            self.dar
        } else {
            self.format.pixel_aspect()
        }
    }

    /// Crop ratio, resolved like the aspect ratio but with its own fallback.
    pub fn target_crop_ratio(&self, fallback: f64) -> f64 {
        if self.crop > 0.0 {
            return self.crop;
        }
        if self.crop == RATIO_AUTO_FIT {
            return self.item_aspect_ratio();
        }
        fallback
    }

    /// Letterboxed frame rectangle inside `area` for the current state.
    /// Returns `area` unchanged when no frame format is known.
    pub fn frame_rect(&self, area: Rect) -> Rect {
        if self.format.is_empty() {
            return area;
        }
        let aspect = self.target_aspect_ratio();
        frame_rect(area, aspect, self.target_crop_ratio(aspect))
    }

    /// Recompute the cached frame rectangle. Returns true if it changed.
    pub fn update_geometry(&mut self) -> bool {
        let vtx = self.frame_rect(Rect::new(0.0, 0.0, self.item.width, self.item.height));
        if vtx != self.vtx {
            self.vtx = vtx;
            true
        } else {
            false
        }
    }

    /// Cached frame rectangle (the overlay layer follows it).
    #[inline]
    pub fn frame_rect_cached(&self) -> Rect {
        self.vtx
    }

    /// Texture rectangle for `format`, honoring flips and row padding.
    pub fn texture_coordinates(format: &VideoFormat, effects: Effects) -> TexCoords {
        let mut tc = TexCoords::default();
        if format.is_empty() || format.draw_width() == 0 {
            return tc;
        }
        tc.right = format.width() as f32 / format.draw_width() as f32;
        let active = effects.active();
        if active.contains(Effects::FLIP_VERTICALLY) {
            std::mem::swap(&mut tc.top, &mut tc.bottom);
        }
        if active.contains(Effects::FLIP_HORIZONTALLY) {
            std::mem::swap(&mut tc.left, &mut tc.right);
        }
        tc
    }

    /// Compute the quad for the next draw.
    ///
    /// The percent offset is scaled by the letterbox size, then alignment
    /// anchors each axis to an item edge independently.
    pub fn update_vertex(&mut self, effects: Effects) -> VertexUpdate {
        let (w, h) = (self.item.width, self.item.height);
        let letter = Size::new(self.target_crop_ratio(self.target_aspect_ratio()) as f32, 1.0)
            .scaled_to_fit(self.item);
        let mut offset = Vec2::new(
            self.offset.x as f32 * letter.width / 100.0,
            self.offset.y as f32 * letter.height / 100.0,
        );
        let mut xy = Vec2::new(w - letter.width, h - letter.height) * 0.5;
        if self.alignment.contains(Alignment::LEFT) {
            offset.x -= xy.x;
        } else if self.alignment.contains(Alignment::RIGHT) {
            offset.x += xy.x;
        }
        if self.alignment.contains(Alignment::TOP) {
            offset.y -= xy.y;
        } else if self.alignment.contains(Alignment::BOTTOM) {
            offset.y += xy.y;
        }
        xy += offset;

        let screen_changed = self.letterbox.set(
            Rect::new(0.0, 0.0, w, h),
            Rect::from_pos_size(xy, letter),
        );
        VertexUpdate {
            vertex: self.vtx.translated(offset),
            tex: Self::texture_coordinates(&self.format, effects),
            screen: self.letterbox.screen(),
            screen_changed,
        }
    }

    /// Preferred item size for the current frame.
    pub fn size_hint(&self) -> (u32, u32) {
        if self.format.is_empty() {
            return EMPTY_SIZE_HINT;
        }
        let aspect = self.target_aspect_ratio();
        let (fw, fh) = self.format.size();
        let size = Size::new(aspect as f32, 1.0).scaled_to_cover(Size::new(fw as f32, fh as f32));
        let crop = Size::new(self.target_crop_ratio(aspect) as f32, 1.0).scaled_to_fit(size);
        (crop.width.round() as u32, crop.height.round() as u32)
    }

    /// Width of the frame once the display aspect is applied.
    pub fn output_width(&self) -> u32 {
        if self.dar > 0.01 {
            (self.dar * self.format.height() as f64 + 0.5) as u32
        } else {
            self.format.width()
        }
    }

    // ── Setters: each returns true when the state actually changed ──

    pub fn set_format(&mut self, format: &VideoFormat) -> bool {
        let changed = self.format != *format;
        self.format = format.clone();
        changed
    }

    pub fn set_item_size(&mut self, size: Size) -> bool {
        let changed = self.item != size;
        self.item = size;
        changed
    }

    pub fn set_aspect_ratio(&mut self, ratio: f64) -> bool {
        if is_same_ratio(self.aspect, ratio) {
            return false;
        }
        self.aspect = ratio;
        true
    }

    pub fn set_crop_ratio(&mut self, ratio: f64) -> bool {
        if is_same_ratio(self.crop, ratio) {
            return false;
        }
        self.crop = ratio;
        true
    }

    /// Display aspect ratio reported by the stream.
    pub fn set_video_aspect_ratio(&mut self, ratio: f64) {
        self.dar = ratio;
    }

    pub fn set_alignment(&mut self, alignment: Alignment) -> bool {
        let changed = self.alignment != alignment;
        self.alignment = alignment;
        changed
    }

    pub fn set_offset(&mut self, offset: Point) -> bool {
        let changed = self.offset != offset;
        self.offset = offset;
        changed
    }

    // ── Accessors ──

    pub fn item_size(&self) -> Size {
        self.item
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.aspect
    }

    pub fn crop_ratio(&self) -> f64 {
        self.crop
    }

    pub fn video_aspect_ratio(&self) -> f64 {
        self.dar
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn letterbox(&self) -> &Letterbox {
        &self.letterbox
    }

    pub fn screen_rect(&self) -> Rect {
        self.letterbox.screen()
    }
}
