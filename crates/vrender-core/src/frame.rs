//! Decoded video frames in CPU memory.
//!
//! A [`VideoFrame`] is built once by the producer and never mutated after
//! that; the presenter replaces it wholesale on every `present`.

use smallvec::SmallVec;

use crate::error::{Result, VRenderError};
use crate::format::{PixelType, VideoFormat, MAX_PLANES};

/// A plane of pixel data with stride information.
#[derive(Debug, Clone, Default)]
pub struct FramePlane {
    /// Raw bytes, `stride * rows` at least.
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
}

impl FramePlane {
    /// Create a zero-filled plane.
    pub fn zeroed(stride: usize, rows: usize) -> Self {
        Self {
            data: vec![0u8; stride * rows],
            stride,
        }
    }

    /// Get a row of pixel data, padding included.
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.stride]
    }

    #[inline]
    fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        &mut self.data[start..start + self.stride]
    }
}

/// A decoded video frame: format descriptor plus up to three planes.
#[derive(Debug, Clone, Default)]
pub struct VideoFrame {
    format: VideoFormat,
    planes: SmallVec<[FramePlane; MAX_PLANES]>,
}

impl VideoFrame {
    /// A frame carrying no image.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap decoder-provided planes.
    ///
    /// Rejects frames whose plane count or byte length does not match the
    /// pixel type and size.
    pub fn from_planes(
        pixel_type: PixelType,
        width: u32,
        height: u32,
        planes: impl IntoIterator<Item = FramePlane>,
    ) -> Result<Self> {
        let planes: SmallVec<[FramePlane; MAX_PLANES]> = planes.into_iter().collect();
        if pixel_type == PixelType::Empty || width == 0 || height == 0 {
            return Err(VRenderError::InvalidFrame(format!(
                "cannot build a {pixel_type:?} frame of {width}x{height}"
            )));
        }
        let expected = pixel_type.layout().plane_count;
        if planes.len() != expected {
            return Err(VRenderError::InvalidFrame(format!(
                "{pixel_type:?} needs {expected} planes, got {}",
                planes.len()
            )));
        }
        let strides: SmallVec<[u32; MAX_PLANES]> =
            planes.iter().map(|p| p.stride as u32).collect();
        let format = VideoFormat::with_strides(pixel_type, width, height, &strides);
        for (i, plane) in planes.iter().enumerate() {
            if (plane.stride as u32) < format.byte_width(i) {
                return Err(VRenderError::InvalidFrame(format!(
                    "plane {i} stride {} is narrower than {} bytes",
                    plane.stride,
                    format.byte_width(i)
                )));
            }
            let needed = plane.stride * format.byte_height(i) as usize;
            if plane.data.len() < needed {
                return Err(VRenderError::InvalidFrame(format!(
                    "plane {i} holds {} bytes, needs {needed}",
                    plane.data.len()
                )));
            }
        }
        Ok(Self { format, planes })
    }

    /// A tightly packed black frame of the given type.
    pub fn blank(pixel_type: PixelType, width: u32, height: u32) -> Self {
        let format = VideoFormat::new(pixel_type, width, height);
        let mut planes: SmallVec<[FramePlane; MAX_PLANES]> = (0..format.plane_count())
            .map(|i| {
                FramePlane::zeroed(format.byte_width(i) as usize, format.byte_height(i) as usize)
            })
            .collect();
        fill_black(pixel_type, &mut planes);
        Self { format, planes }
    }

    #[inline]
    pub fn format(&self) -> &VideoFormat {
        &self.format
    }

    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.format.pixel_type()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.format.is_empty()
    }

    #[inline]
    pub fn planes(&self) -> &[FramePlane] {
        &self.planes
    }

    #[inline]
    pub fn plane(&self, index: usize) -> Option<&FramePlane> {
        self.planes.get(index)
    }

    /// Raw bytes of `index`, or an empty slice past the last plane.
    #[inline]
    pub fn data(&self, index: usize) -> &[u8] {
        self.planes.get(index).map_or(&[], |p| p.data.as_slice())
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }
}

fn fill_black(pixel_type: PixelType, planes: &mut [FramePlane]) {
    const Y_BLACK: u8 = 16;
    const C_ZERO: u8 = 128;
    match pixel_type {
        PixelType::PlanarYuv420 => {
            planes[0].data.fill(Y_BLACK);
            planes[1].data.fill(C_ZERO);
            planes[2].data.fill(C_ZERO);
        }
        PixelType::SemiPlanarNv12 | PixelType::SemiPlanarNv21 => {
            planes[0].data.fill(Y_BLACK);
            planes[1].data.fill(C_ZERO);
        }
        PixelType::PackedYuy2 | PixelType::PackedUyvy => {
            let pattern = if pixel_type == PixelType::PackedYuy2 {
                [Y_BLACK, C_ZERO]
            } else {
                [C_ZERO, Y_BLACK]
            };
            let rows = planes[0].data.len() / planes[0].stride.max(1);
            for y in 0..rows {
                for pair in planes[0].row_mut(y).chunks_exact_mut(2) {
                    pair.copy_from_slice(&pattern);
                }
            }
        }
        PixelType::PackedRgba | PixelType::PackedBgra => {
            for px in planes[0].data.chunks_exact_mut(4) {
                px.copy_from_slice(&[0, 0, 0, 255]);
            }
        }
        PixelType::Empty => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_planes_match_format() {
        for ty in PixelType::SUPPORTED {
            let frame = VideoFrame::blank(ty, 64, 36);
            let f = frame.format();
            assert_eq!(frame.planes().len(), f.plane_count(), "{ty:?}");
            for i in 0..f.plane_count() {
                assert_eq!(
                    frame.data(i).len(),
                    (f.byte_width(i) * f.byte_height(i)) as usize,
                    "{ty:?} plane {i}"
                );
            }
        }
    }

    #[test]
    fn test_blank_yuv_is_video_black() {
        let frame = VideoFrame::blank(PixelType::PlanarYuv420, 4, 4);
        assert!(frame.data(0).iter().all(|&b| b == 16));
        assert!(frame.data(1).iter().all(|&b| b == 128));
        let frame = VideoFrame::blank(PixelType::PackedUyvy, 4, 2);
        assert_eq!(&frame.data(0)[0..4], &[128, 16, 128, 16]);
    }

    #[test]
    fn test_from_planes_with_padding() {
        let frame = VideoFrame::from_planes(
            PixelType::SemiPlanarNv12,
            100,
            50,
            [FramePlane::zeroed(128, 50), FramePlane::zeroed(128, 25)],
        )
        .unwrap();
        assert_eq!(frame.format().byte_width(0), 128);
        assert_eq!(frame.format().draw_width(), 128);
        assert_eq!(frame.format().width(), 100);
    }

    #[test]
    fn test_from_planes_rejects_short_plane() {
        let err = VideoFrame::from_planes(
            PixelType::PackedRgba,
            16,
            16,
            [FramePlane {
                data: vec![0; 16 * 4 * 15],
                stride: 64,
            }],
        );
        assert!(matches!(err, Err(VRenderError::InvalidFrame(_))));
    }

    #[test]
    fn test_from_planes_rejects_wrong_plane_count() {
        let err = VideoFrame::from_planes(
            PixelType::PlanarYuv420,
            16,
            16,
            [FramePlane::zeroed(16, 16)],
        );
        assert!(err.is_err());
        assert!(VideoFrame::from_planes(PixelType::Empty, 0, 0, []).is_err());
    }

    #[test]
    fn test_empty_frame() {
        let frame = VideoFrame::empty();
        assert!(frame.is_empty());
        assert!(frame.data(0).is_empty());
        assert_eq!(frame.memory_size(), 0);
    }
}
