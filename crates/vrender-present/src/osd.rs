//! Subtitle and on-screen-display overlay.
//!
//! The producer composes already rasterised subtitle bitmaps into a canvas
//! the size of the frame ([`OsdImage`]). The render thread uploads the
//! canvas into an RGBA texture and blends it over the video quad.

use std::sync::Arc;

use image::{imageops, RgbaImage};
use tracing::{debug, trace, warn};
use vrender_core::{Rect, Result, TexCoords, TexelFormat};
use vrender_gpu::{
    overlay_source, ProgramDesc, ProgramId, Quad, RenderBackend, TextureDesc, TextureId,
    VideoUniforms,
};

/// A rasterised subtitle image placed in frame coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleBitmap {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Bytes per row of `rgba`.
    pub stride: usize,
    /// Straight-alpha RGBA rows.
    pub rgba: Vec<u8>,
}

impl SubtitleBitmap {
    /// Bitmap with tightly packed rows.
    pub fn new(x: i32, y: i32, width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            stride: width as usize * 4,
            rgba,
        }
    }

    fn to_image(&self) -> Option<RgbaImage> {
        let row = self.width as usize * 4;
        if self.width == 0 || self.height == 0 || self.stride < row {
            return None;
        }
        let needed = self.stride * (self.height as usize - 1) + row;
        if self.rgba.len() < needed {
            return None;
        }
        let mut data = Vec::with_capacity(row * self.height as usize);
        for y in 0..self.height as usize {
            let start = y * self.stride;
            data.extend_from_slice(&self.rgba[start..start + row]);
        }
        RgbaImage::from_raw(self.width, self.height, data)
    }
}

/// Overlay canvas covering the whole frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OsdImage {
    canvas: RgbaImage,
    blank: bool,
}

impl OsdImage {
    /// Alpha-composite `bitmaps` in order onto a transparent canvas.
    ///
    /// Bitmaps are clipped to the canvas; malformed ones are skipped.
    pub fn compose(width: u32, height: u32, bitmaps: &[SubtitleBitmap]) -> Self {
        let mut canvas = RgbaImage::new(width, height);
        let mut blank = true;
        for bitmap in bitmaps {
            let Some(image) = bitmap.to_image() else {
                warn!(
                    width = bitmap.width,
                    height = bitmap.height,
                    len = bitmap.rgba.len(),
                    "skipping malformed subtitle bitmap"
                );
                continue;
            };
            imageops::overlay(&mut canvas, &image, bitmap.x as i64, bitmap.y as i64);
            blank = false;
        }
        Self { canvas, blank }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    /// Whether nothing was drawn onto the canvas.
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.blank
    }

    #[inline]
    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Blend the canvas over `target`, stretching it if sizes differ.
    pub fn draw_onto(&self, target: &mut RgbaImage) {
        if self.blank {
            return;
        }
        if target.dimensions() == self.canvas.dimensions() {
            imageops::overlay(target, &self.canvas, 0, 0);
        } else {
            let scaled = imageops::resize(
                &self.canvas,
                target.width(),
                target.height(),
                imageops::FilterType::Triangle,
            );
            imageops::overlay(target, &scaled, 0, 0);
        }
    }
}

/// Render-thread side of the overlay: texture, program and current canvas.
#[derive(Debug)]
pub(crate) struct OsdLayer {
    enabled: bool,
    frame_size: (u32, u32),
    image: Option<Arc<OsdImage>>,
    texture: Option<TextureId>,
    program: Option<ProgramId>,
    uploaded: bool,
}

impl OsdLayer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            frame_size: (0, 0),
            image: None,
            texture: None,
            program: None,
            uploaded: false,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Resize the overlay texture to a new frame size. Drops the canvas,
    /// which was composed for the old size.
    pub fn set_frame_size<B: RenderBackend>(&mut self, backend: &mut B, size: (u32, u32)) -> Result<()> {
        if self.frame_size == size && self.texture.is_some() {
            return Ok(());
        }
        if let Some(old) = self.texture.take() {
            backend.destroy_texture(old);
        }
        self.frame_size = size;
        self.image = None;
        self.uploaded = false;
        let (width, height) = size;
        if width > 0 && height > 0 {
            self.texture = Some(backend.create_texture(&TextureDesc {
                label: "osd",
                width,
                height,
                format: TexelFormat::Rgba8,
            })?);
            debug!(width, height, "allocated osd texture");
        }
        Ok(())
    }

    pub fn set_image(&mut self, image: Arc<OsdImage>) {
        self.image = Some(image);
        self.uploaded = false;
    }

    /// Canvas to composite onto snapshots.
    pub fn image(&self) -> Option<&OsdImage> {
        self.image.as_deref().filter(|_| self.enabled)
    }

    /// Upload the canvas if it changed since the last upload.
    pub fn upload<B: RenderBackend>(&mut self, backend: &mut B) -> Result<()> {
        if self.uploaded {
            return Ok(());
        }
        let (Some(texture), Some(image)) = (self.texture, self.image.as_ref()) else {
            return Ok(());
        };
        if (image.width(), image.height()) != self.frame_size {
            trace!("discarding osd canvas composed for another frame size");
            self.image = None;
            return Ok(());
        }
        if !image.is_blank() {
            backend.write_texture(texture, image.image().as_raw(), image.width() * 4)?;
        }
        self.uploaded = true;
        Ok(())
    }

    /// Blend the overlay over `rect`. Returns whether anything was drawn.
    pub fn draw<B: RenderBackend>(&mut self, backend: &mut B, rect: Rect) -> Result<bool> {
        let Some(texture) = self.texture else {
            return Ok(false);
        };
        let visible = self.enabled
            && self.uploaded
            && self.image.as_ref().is_some_and(|image| !image.is_blank());
        if !visible {
            return Ok(false);
        }
        let program = match self.program {
            Some(program) => program,
            None => {
                let source = overlay_source();
                let program = backend.create_program(&ProgramDesc {
                    label: "osd",
                    source: &source,
                    alpha_blend: true,
                })?;
                self.program = Some(program);
                program
            }
        };
        backend.bind_uniforms(program, &VideoUniforms::default())?;
        backend.draw_quad(
            program,
            [Some(texture), None, None],
            &Quad::new(rect, TexCoords::default()),
        )?;
        Ok(true)
    }

    pub fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(texture) = self.texture.take() {
            backend.destroy_texture(texture);
        }
        if let Some(program) = self.program.take() {
            backend.destroy_program(program);
        }
        self.image = None;
        self.uploaded = false;
        self.frame_size = (0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use vrender_gpu::testing::RecordingBackend;

    fn solid(x: i32, y: i32, w: u32, h: u32, px: [u8; 4]) -> SubtitleBitmap {
        SubtitleBitmap::new(x, y, w, h, px.repeat((w * h) as usize))
    }

    #[test]
    fn test_compose_places_and_clips() {
        let osd = OsdImage::compose(8, 4, &[solid(6, 2, 4, 4, [255, 0, 0, 255])]);
        assert!(!osd.is_blank());
        assert_eq!(osd.image().get_pixel(6, 2), &Rgba([255, 0, 0, 255]));
        assert_eq!(osd.image().get_pixel(7, 3), &Rgba([255, 0, 0, 255]));
        assert_eq!(osd.image().get_pixel(5, 2)[3], 0);
    }

    #[test]
    fn test_later_bitmaps_blend_over_earlier() {
        let osd = OsdImage::compose(
            2,
            1,
            &[solid(0, 0, 2, 1, [0, 0, 255, 255]), solid(1, 0, 1, 1, [255, 0, 0, 255])],
        );
        assert_eq!(osd.image().get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(osd.image().get_pixel(1, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_padded_stride_and_malformed_bitmaps() {
        let mut padded = solid(0, 0, 1, 2, [9, 9, 9, 255]);
        padded.stride = 8;
        padded.rgba = vec![9, 9, 9, 255, 0, 0, 0, 0, 9, 9, 9, 255];
        let short = SubtitleBitmap::new(0, 0, 4, 4, vec![0; 3]);
        let osd = OsdImage::compose(2, 2, &[short, padded]);
        assert_eq!(osd.image().get_pixel(0, 1), &Rgba([9, 9, 9, 255]));
        assert!(OsdImage::compose(2, 2, &[SubtitleBitmap::new(0, 0, 4, 4, vec![])]).is_blank());
    }

    #[test]
    fn test_draw_onto_snapshot() {
        let osd = OsdImage::compose(2, 2, &[solid(0, 0, 1, 1, [255, 255, 255, 255])]);
        let mut snapshot = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        osd.draw_onto(&mut snapshot);
        assert_eq!(snapshot.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(snapshot.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_layer_uploads_once_and_draws_blended() {
        let mut backend = RecordingBackend::new();
        let mut layer = OsdLayer::new(true);
        layer.set_frame_size(&mut backend, (4, 4)).unwrap();
        assert!(!layer.draw(&mut backend, Rect::new(0.0, 0.0, 4.0, 4.0)).unwrap());

        layer.set_image(Arc::new(OsdImage::compose(4, 4, &[solid(0, 0, 2, 2, [1, 2, 3, 255])])));
        layer.upload(&mut backend).unwrap();
        layer.upload(&mut backend).unwrap();
        assert_eq!(backend.count(|c| matches!(c, vrender_gpu::testing::BackendCall::WriteTexture { .. })), 1);

        backend.begin_pass(vrender_core::Size::new(4.0, 4.0), [0.0; 4]).unwrap();
        assert!(layer.draw(&mut backend, Rect::new(0.0, 0.0, 4.0, 4.0)).unwrap());
        backend.end_pass().unwrap();
        assert_eq!(backend.draws().len(), 1);
        assert_eq!(backend.live_programs(), 1);

        layer.release(&mut backend);
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn test_stale_canvas_is_discarded() {
        let mut backend = RecordingBackend::new();
        let mut layer = OsdLayer::new(true);
        layer.set_frame_size(&mut backend, (8, 8)).unwrap();
        layer.set_image(Arc::new(OsdImage::compose(4, 4, &[solid(0, 0, 1, 1, [1, 1, 1, 255])])));
        layer.upload(&mut backend).unwrap();
        assert!(layer.image().is_none());
    }
}
