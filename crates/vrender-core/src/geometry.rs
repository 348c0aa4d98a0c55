//! Geometric primitives for laying out the video surface.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Integer point, used for pixel and percent offsets.
pub type Point = IVec2;

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from a top-left corner and a size.
    #[inline]
    pub fn from_pos_size(pos: Vec2, size: Size) -> Self {
        Self::new(pos.x, pos.y, size.width, size.height)
    }

    /// Create a rectangle from two corners.
    pub fn from_corners(min: Vec2, max: Vec2) -> Self {
        Self {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }

    /// Minimum corner (top-left).
    #[inline]
    pub fn min(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Maximum corner (bottom-right).
    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    #[inline]
    pub fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Width over height, or 1.0 for degenerate rectangles.
    #[inline]
    pub fn aspect_ratio(self) -> f64 {
        self.size().aspect_ratio()
    }

    /// Move the rectangle by `offset`.
    #[inline]
    pub fn translated(self, offset: Vec2) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y, self.width, self.height)
    }

    /// Compute intersection with another rectangle.
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x1 < x2 && y1 < y2 {
            Some(Self::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }
}

/// Floating point size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Width over height, or 1.0 for degenerate sizes.
    #[inline]
    pub fn aspect_ratio(self) -> f64 {
        if self.width <= 0.0 || self.height <= 0.0 {
            1.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    /// Largest size with this aspect ratio that fits inside `bounds`.
    pub fn scaled_to_fit(self, bounds: Size) -> Size {
        self.scaled(bounds, false)
    }

    /// Smallest size with this aspect ratio that covers `bounds`.
    pub fn scaled_to_cover(self, bounds: Size) -> Size {
        self.scaled(bounds, true)
    }

    fn scaled(self, bounds: Size, expand: bool) -> Size {
        if self.width <= 0.0 || self.height <= 0.0 {
            return bounds;
        }
        let (w, h) = (self.width as f64, self.height as f64);
        let (bw, bh) = (bounds.width as f64, bounds.height as f64);
        let rw = bh * w / h;
        let use_height = if expand { rw >= bw } else { rw <= bw };
        if use_height {
            Size::new(rw as f32, bh as f32)
        } else {
            Size::new(bw as f32, (bw * h / w) as f32)
        }
    }
}

bitflags! {
    /// Anchoring of the video rectangle inside the item.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Alignment: u32 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const H_CENTER = 1 << 2;
        const TOP = 1 << 3;
        const BOTTOM = 1 << 4;
        const V_CENTER = 1 << 5;
        const CENTER = Self::H_CENTER.bits() | Self::V_CENTER.bits();
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self::CENTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 50.0, 100.0, 100.0);
        let i = a.intersection(b).unwrap();
        assert_eq!(i, Rect::new(50.0, 50.0, 50.0, 50.0));
        assert!(a.intersection(Rect::new(200.0, 0.0, 10.0, 10.0)).is_none());
    }

    #[test]
    fn test_scale_fit_wide_into_4_3() {
        let s = Size::new(16.0, 9.0).scaled_to_fit(Size::new(800.0, 600.0));
        assert!((s.width - 800.0).abs() < 0.01);
        assert!((s.height - 450.0).abs() < 0.01);
    }

    #[test]
    fn test_scale_cover_wide_into_4_3() {
        let s = Size::new(16.0, 9.0).scaled_to_cover(Size::new(800.0, 600.0));
        assert!((s.width - 1066.667).abs() < 0.01);
        assert!((s.height - 600.0).abs() < 0.01);
    }

    #[test]
    fn test_translated() {
        let r = Rect::new(10.0, 10.0, 5.0, 5.0).translated(Vec2::new(-10.0, 2.0));
        assert_eq!(r, Rect::new(0.0, 12.0, 5.0, 5.0));
    }

    #[test]
    fn test_default_alignment_is_center() {
        assert_eq!(Alignment::default(), Alignment::H_CENTER | Alignment::V_CENTER);
    }
}
