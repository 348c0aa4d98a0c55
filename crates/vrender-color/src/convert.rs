//! CPU conversion between decoded frames and RGBA images.
//!
//! Used for snapshots (off the GPU path) and for building synthetic frames.

use std::path::Path;

use image::RgbaImage;
use vrender_core::{FramePlane, PixelType, Result, VRenderError, VideoFrame};

use crate::matrix::{rgb_to_yuv, ColorRange, YuvColorSpace, YuvToRgb};

/// Snapshot conversion of a [`VideoFrame`] into an RGBA image.
pub trait FrameImageExt {
    /// Convert with BT.601 limited-range coefficients.
    fn to_image(&self) -> Option<RgbaImage> {
        self.to_image_with(&YuvToRgb::default())
    }

    /// Convert with explicit YCbCr coefficients. `None` for empty frames.
    fn to_image_with(&self, matrix: &YuvToRgb) -> Option<RgbaImage>;
}

impl FrameImageExt for VideoFrame {
    fn to_image_with(&self, matrix: &YuvToRgb) -> Option<RgbaImage> {
        if self.is_empty() {
            return None;
        }
        let (width, height) = self.format().size();
        let planes = self.planes();
        let ty = self.pixel_type();
        Some(RgbaImage::from_fn(width, height, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let px = match ty {
                PixelType::PlanarYuv420 => {
                    let c = (y / 2, x / 2);
                    let yy = planes[0].row(y)[x];
                    let u = planes[1].row(c.0)[c.1];
                    let v = planes[2].row(c.0)[c.1];
                    with_alpha(matrix.apply(yy, u, v))
                }
                PixelType::SemiPlanarNv12 | PixelType::SemiPlanarNv21 => {
                    let yy = planes[0].row(y)[x];
                    let chroma = &planes[1].row(y / 2)[(x / 2) * 2..];
                    let (u, v) = if ty == PixelType::SemiPlanarNv12 {
                        (chroma[0], chroma[1])
                    } else {
                        (chroma[1], chroma[0])
                    };
                    with_alpha(matrix.apply(yy, u, v))
                }
                PixelType::PackedYuy2 | PixelType::PackedUyvy => {
                    let quad = &planes[0].row(y)[(x / 2) * 4..(x / 2) * 4 + 4];
                    let (yy, u, v) = if ty == PixelType::PackedYuy2 {
                        (quad[(x % 2) * 2], quad[1], quad[3])
                    } else {
                        (quad[1 + (x % 2) * 2], quad[0], quad[2])
                    };
                    with_alpha(matrix.apply(yy, u, v))
                }
                PixelType::PackedRgba => {
                    let p = &planes[0].row(y)[x * 4..x * 4 + 4];
                    [p[0], p[1], p[2], p[3]]
                }
                PixelType::PackedBgra => {
                    let p = &planes[0].row(y)[x * 4..x * 4 + 4];
                    [p[2], p[1], p[0], p[3]]
                }
                PixelType::Empty => [0, 0, 0, 0],
            };
            image::Rgba(px)
        }))
    }
}

#[inline]
fn with_alpha([r, g, b]: [u8; 3]) -> [u8; 4] {
    [r, g, b, 255]
}

/// Build a tightly packed frame of `pixel_type` from RGBA pixels.
///
/// Chroma is averaged over each subsampled block.
pub fn frame_from_rgba(
    pixel_type: PixelType,
    width: u32,
    height: u32,
    rgba: &[u8],
    space: YuvColorSpace,
    range: ColorRange,
) -> Result<VideoFrame> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(VRenderError::InvalidParameter(format!(
            "RGBA buffer holds {} bytes, {width}x{height} needs {expected}",
            rgba.len()
        )));
    }
    let (w, h) = (width as usize, height as usize);
    let pixel = |x: usize, y: usize| -> [u8; 4] {
        let i = (y.min(h - 1) * w + x.min(w - 1)) * 4;
        [rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3]]
    };
    let yuv = |x: usize, y: usize| {
        let [r, g, b, _] = pixel(x, y);
        rgb_to_yuv(space, range, [r, g, b])
    };
    // Average chroma of the block starting at (x, y) spanning (bw, bh) pixels.
    let chroma = |x: usize, y: usize, bw: usize, bh: usize| -> (u8, u8) {
        let (mut u, mut v) = (0u32, 0u32);
        for dy in 0..bh {
            for dx in 0..bw {
                let [_, cu, cv] = yuv(x + dx, y + dy);
                u += cu as u32;
                v += cv as u32;
            }
        }
        let n = (bw * bh) as u32;
        (((u + n / 2) / n) as u8, ((v + n / 2) / n) as u8)
    };

    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);
    let planes: Vec<FramePlane> = match pixel_type {
        PixelType::PlanarYuv420 => {
            let mut luma = FramePlane::zeroed(w, h);
            let mut cb = FramePlane::zeroed(cw, ch);
            let mut cr = FramePlane::zeroed(cw, ch);
            for y in 0..h {
                for x in 0..w {
                    luma.data[y * w + x] = yuv(x, y)[0];
                }
            }
            for y in 0..ch {
                for x in 0..cw {
                    let (u, v) = chroma(x * 2, y * 2, 2, 2);
                    cb.data[y * cw + x] = u;
                    cr.data[y * cw + x] = v;
                }
            }
            vec![luma, cb, cr]
        }
        PixelType::SemiPlanarNv12 | PixelType::SemiPlanarNv21 => {
            let mut luma = FramePlane::zeroed(w, h);
            let mut uv = FramePlane::zeroed(cw * 2, ch);
            for y in 0..h {
                for x in 0..w {
                    luma.data[y * w + x] = yuv(x, y)[0];
                }
            }
            for y in 0..ch {
                for x in 0..cw {
                    let (u, v) = chroma(x * 2, y * 2, 2, 2);
                    let pair = if pixel_type == PixelType::SemiPlanarNv12 {
                        [u, v]
                    } else {
                        [v, u]
                    };
                    let i = y * cw * 2 + x * 2;
                    uv.data[i..i + 2].copy_from_slice(&pair);
                }
            }
            vec![luma, uv]
        }
        PixelType::PackedYuy2 | PixelType::PackedUyvy => {
            let stride = cw * 4;
            let mut packed = FramePlane::zeroed(stride, h);
            for y in 0..h {
                for x in 0..cw {
                    let y0 = yuv(x * 2, y)[0];
                    let y1 = yuv(x * 2 + 1, y)[0];
                    let (u, v) = chroma(x * 2, y, 2, 1);
                    let quad = if pixel_type == PixelType::PackedYuy2 {
                        [y0, u, y1, v]
                    } else {
                        [u, y0, v, y1]
                    };
                    let i = y * stride + x * 4;
                    packed.data[i..i + 4].copy_from_slice(&quad);
                }
            }
            vec![packed]
        }
        PixelType::PackedRgba => vec![FramePlane {
            data: rgba.to_vec(),
            stride: w * 4,
        }],
        PixelType::PackedBgra => {
            let mut data = rgba.to_vec();
            for px in data.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            vec![FramePlane {
                data,
                stride: w * 4,
            }]
        }
        PixelType::Empty => {
            return Err(VRenderError::UnsupportedFormat(
                "cannot convert into an empty format".to_string(),
            ))
        }
    };
    VideoFrame::from_planes(pixel_type, width, height, planes)
}

/// Eight vertical color bars in the requested layout.
pub fn test_pattern(pixel_type: PixelType, width: u32, height: u32) -> Result<VideoFrame> {
    const BARS: [[u8; 4]; 8] = [
        [255, 255, 255, 255], // White
        [255, 255, 0, 255],   // Yellow
        [0, 255, 255, 255],   // Cyan
        [0, 255, 0, 255],     // Green
        [255, 0, 255, 255],   // Magenta
        [255, 0, 0, 255],     // Red
        [0, 0, 255, 255],     // Blue
        [0, 0, 0, 255],       // Black
    ];
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for _ in 0..height {
        for x in 0..width {
            let bar = (x as u64 * 8 / width.max(1) as u64) as usize;
            rgba.extend_from_slice(&BARS[bar.min(7)]);
        }
    }
    frame_from_rgba(
        pixel_type,
        width,
        height,
        &rgba,
        YuvColorSpace::Bt601,
        ColorRange::Limited,
    )
}

/// Write `image` to `path`, picking the encoder from the extension.
pub fn save_image(image: &RgbaImage, path: impl AsRef<Path>) -> Result<()> {
    image
        .save(path.as_ref())
        .map_err(|e| VRenderError::Image(format!("{}: {e}", path.as_ref().display())))
}
