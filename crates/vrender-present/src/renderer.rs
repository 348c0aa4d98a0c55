//! Render-thread owner of the presentation state.
//!
//! [`Renderer`] owns the backend, the texture slots, the compiled program
//! and the geometry. Nothing here is shared with the producer except the
//! mailbox, so GPU handles never cross threads.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;
use tracing::{debug, info, trace, warn};
use vrender_color::{ColorProperty, ColorRange, FrameImageExt, YuvColorSpace, YuvToRgb};
use vrender_core::{
    Alignment, Effects, GeometryResolver, Letterbox, Point, Rect, Result, Size, VRenderError,
    VideoFormat, VideoFrame,
};
use vrender_gpu::{
    ProgramDesc, ProgramId, ProgramKey, Quad, RenderBackend, ShaderParameterSet,
    TextureUploadEngine,
};

use crate::config::RendererConfig;
use crate::events::RenderEvent;
use crate::mailbox::{FrameSender, Mailbox};
use crate::osd::{OsdImage, OsdLayer};

/// Presents frames handed over by a [`FrameSender`].
///
/// Call [`prepare`](Self::prepare) then [`render`](Self::render) once per
/// display refresh, typically after a message on
/// [`redraw_requests`](Self::redraw_requests).
pub struct Renderer<B: RenderBackend> {
    backend: B,
    mailbox: Arc<Mailbox>,
    redraw: Receiver<()>,
    event_tx: Sender<RenderEvent>,
    event_rx: Receiver<RenderEvent>,
    /// Frame whose planes are in the textures.
    frame: Arc<VideoFrame>,
    format: VideoFormat,
    shader: ShaderParameterSet,
    program: Option<ProgramId>,
    program_key: Option<ProgramKey>,
    textures: TextureUploadEngine,
    geometry: GeometryResolver,
    osd: OsdLayer,
    item: Rect,
    clear_color: [f32; 4],
}

impl<B: RenderBackend> Renderer<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &RendererConfig::default())
    }

    pub fn with_config(backend: B, config: &RendererConfig) -> Self {
        let (mailbox, redraw) = Mailbox::new();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let mut renderer = Self {
            backend,
            mailbox,
            redraw,
            event_tx,
            event_rx,
            frame: Arc::default(),
            format: VideoFormat::empty(),
            shader: ShaderParameterSet::new(),
            program: None,
            program_key: None,
            textures: TextureUploadEngine::new(),
            geometry: GeometryResolver::new(),
            osd: OsdLayer::new(config.osd),
            item: Rect::default(),
            clear_color: config.clear_color,
        };
        renderer.apply_config(config);
        renderer
    }

    /// Apply every setting of `config`.
    pub fn apply_config(&mut self, config: &RendererConfig) {
        self.set_aspect_ratio(config.aspect_ratio);
        self.set_crop_ratio(config.crop_ratio);
        self.set_alignment(config.alignment);
        self.set_offset(config.offset_point());
        self.set_effects(config.effects);
        self.set_color(config.color);
        self.set_color_space(config.color_space, config.color_range);
        self.osd.set_enabled(config.osd);
        self.clear_color = config.clear_color;
    }

    /// A new producer handle feeding this renderer.
    pub fn sender(&self) -> FrameSender {
        FrameSender::new(Arc::clone(&self.mailbox))
    }

    /// Coalesced redraw requests: at most one is outstanding.
    pub fn redraw_requests(&self) -> Receiver<()> {
        self.redraw.clone()
    }

    /// Format, screen rectangle and offset notifications.
    pub fn events(&self) -> Receiver<RenderEvent> {
        self.event_rx.clone()
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // ── Per-frame path ──

    /// Pre-draw step: take the pending frame and bring GPU state up to date.
    ///
    /// Does nothing when no frame or overlay arrived since the last call.
    /// Otherwise reallocates textures on a format change, rebuilds the
    /// program when its key changed, and uploads the planes. Returns whether
    /// a frame was uploaded.
    pub fn prepare(&mut self) -> Result<bool> {
        let Some(pending) = self.mailbox.take() else {
            return Ok(false);
        };

        let mut uploaded = false;
        if let Some((frame, check_format)) = pending.frame {
            // The first frame and pixel type switches are always compared.
            let compare = check_format
                || self.format.is_empty()
                || self.format.pixel_type() != frame.pixel_type();
            if compare && self.format != *frame.format() {
                self.reset_format(frame.format(), true)?;
            }
            self.ensure_program();

            uploaded = match self.textures.upload(&mut self.backend, &frame) {
                Ok(uploaded) => uploaded,
                Err(VRenderError::FormatMismatch {
                    slot,
                    expected,
                    got,
                }) => {
                    warn!(
                        slot,
                        ?expected,
                        ?got,
                        "frame does not match the allocated textures, reallocating"
                    );
                    // Same logical format, so layout consumers are not notified.
                    self.reset_format(frame.format(), false)?;
                    self.ensure_program();
                    self.textures.upload(&mut self.backend, &frame)?
                }
                Err(e) => return Err(e),
            };
            self.frame = frame;
        }

        // After the format handling: resizing the overlay drops its canvas.
        if let Some(osd) = pending.osd {
            self.osd.set_image(osd);
        }
        self.osd.upload(&mut self.backend)?;
        Ok(uploaded)
    }

    /// Draw the current frame and the overlay into a pass of the item size.
    pub fn render(&mut self) -> Result<()> {
        self.ensure_program();
        self.backend.begin_pass(self.item.size(), self.clear_color)?;
        let drawn = self.draw_contents();
        let ended = self.backend.end_pass();
        drawn.and(ended)
    }

    fn draw_contents(&mut self) -> Result<()> {
        let update = self.geometry.update_vertex(self.shader.effects());
        if update.screen_changed {
            self.emit(RenderEvent::ScreenRectChanged(update.screen));
        }

        if let Some(program) = self.program {
            if !self.format.is_empty() && self.textures.drawn_frames() > 0 {
                let uniforms = self
                    .shader
                    .uniforms(&self.format, self.textures.stride_correction());
                self.backend.bind_uniforms(program, &uniforms)?;
                self.backend.draw_quad(
                    program,
                    self.textures.texture_ids(),
                    &Quad::new(update.vertex, update.tex),
                )?;
            }
        }

        self.osd
            .draw(&mut self.backend, self.geometry.frame_rect_cached())?;
        Ok(())
    }

    fn reset_format(&mut self, format: &VideoFormat, notify: bool) -> Result<()> {
        info!(
            pixel_type = ?format.pixel_type(),
            width = format.width(),
            height = format.height(),
            "video format changed"
        );
        self.format = format.clone();
        self.geometry.set_format(format);
        self.osd.set_frame_size(&mut self.backend, format.size())?;
        self.textures.ensure_allocated(&mut self.backend, format)?;
        self.update_geometry();
        if notify {
            self.emit(RenderEvent::FormatChanged(format.clone()));
        }
        Ok(())
    }

    /// Rebuild the video program if its key no longer matches.
    fn ensure_program(&mut self) {
        let key = self.shader.program_key(self.format.pixel_type());
        if self.program_key == Some(key) {
            return;
        }
        if let Some(old) = self.program.take() {
            self.backend.destroy_program(old);
        }
        self.program_key = Some(key);
        let Some(source) = self.shader.fragment_source(key.pixel_type) else {
            return;
        };
        let desc = ProgramDesc {
            label: "video",
            source: &source,
            alpha_blend: false,
        };
        match self.backend.create_program(&desc) {
            Ok(program) => {
                debug!(pixel_type = ?key.pixel_type, effects = ?key.effects, "built video program");
                self.program = Some(program);
            }
            Err(e) => warn!(error = %e, "video program failed to build, frames are not drawn"),
        }
    }

    fn update_geometry(&mut self) {
        if self.geometry.update_geometry() {
            trace!(rect = ?self.geometry.frame_rect_cached(), "frame rect updated");
        }
    }

    fn emit(&self, event: RenderEvent) {
        // The renderer keeps a receiver, so the channel never disconnects.
        let _ = self.event_tx.send(event);
    }

    /// Free every GPU object owned by the renderer.
    pub fn release(&mut self) {
        self.textures.release(&mut self.backend);
        self.osd.release(&mut self.backend);
        if let Some(program) = self.program.take() {
            self.backend.destroy_program(program);
        }
        self.program_key = None;
        self.format = VideoFormat::empty();
        self.geometry.set_format(&self.format);
    }

    // ── Snapshots ──

    /// Current frame as RGBA with the overlay on top, converted on the CPU.
    /// `None` until a frame with an image was presented.
    pub fn frame_image(&self) -> Option<RgbaImage> {
        if self.format.is_empty() {
            return None;
        }
        let frame = self.mailbox.latest_frame();
        let (space, range) = self.shader.color_space();
        let mut image = frame.to_image_with(&YuvToRgb::new(space, range))?;
        if let Some(osd) = self.osd.image() {
            osd.draw_onto(&mut image);
        }
        Some(image)
    }

    /// Current overlay canvas, if one was drawn for this frame size.
    pub fn osd_image(&self) -> Option<&OsdImage> {
        self.osd.image()
    }

    // ── Setters ──

    /// Move/resize the item. Returns true if the rectangle changed.
    pub fn resize(&mut self, item: Rect) -> bool {
        if self.item == item {
            return false;
        }
        self.item = item;
        self.geometry.set_item_size(item.size());
        self.update_geometry();
        self.mailbox.request_redraw();
        true
    }

    pub fn set_alignment(&mut self, alignment: Alignment) -> bool {
        self.refresh_if(|g| g.set_alignment(alignment))
    }

    pub fn set_aspect_ratio(&mut self, ratio: f64) -> bool {
        self.refresh_if(|g| g.set_aspect_ratio(ratio))
    }

    pub fn set_crop_ratio(&mut self, ratio: f64) -> bool {
        self.refresh_if(|g| g.set_crop_ratio(ratio))
    }

    /// Display aspect ratio reported by the stream (0 when unknown).
    pub fn set_video_aspect_ratio(&mut self, ratio: f64) {
        self.geometry.set_video_aspect_ratio(ratio);
        self.update_geometry();
    }

    /// Offset in percent of the letterbox size.
    pub fn set_offset(&mut self, offset: Point) -> bool {
        if !self.geometry.set_offset(offset) {
            return false;
        }
        self.emit(RenderEvent::OffsetChanged(offset));
        self.mailbox.request_redraw();
        true
    }

    /// Replace the effect flags. Returns true if they changed; the program
    /// is rebuilt on the next pass only if its source changes.
    pub fn set_effects(&mut self, effects: Effects) -> bool {
        if !self.shader.set_effects(effects) {
            return false;
        }
        self.mailbox.request_redraw();
        true
    }

    pub fn set_color(&mut self, color: ColorProperty) -> bool {
        if !self.shader.set_color(color) {
            return false;
        }
        self.mailbox.request_redraw();
        true
    }

    pub fn set_color_space(&mut self, space: YuvColorSpace, range: ColorRange) -> bool {
        if !self.shader.set_color_space(space, range) {
            return false;
        }
        self.mailbox.request_redraw();
        true
    }

    pub fn set_osd_enabled(&mut self, enabled: bool) {
        if self.osd.is_enabled() != enabled {
            self.osd.set_enabled(enabled);
            self.mailbox.request_redraw();
        }
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    fn refresh_if(&mut self, change: impl FnOnce(&mut GeometryResolver) -> bool) -> bool {
        if !change(&mut self.geometry) {
            return false;
        }
        self.update_geometry();
        self.mailbox.request_redraw();
        true
    }

    // ── Queries ──

    /// Whether a frame with an image has been presented.
    #[inline]
    pub fn has_frame(&self) -> bool {
        !self.format.is_empty()
    }

    /// Latest presented frame (possibly not drawn yet).
    pub fn frame(&self) -> Arc<VideoFrame> {
        self.mailbox.latest_frame()
    }

    /// Frame whose planes were uploaded last.
    #[inline]
    pub fn drawn_frame(&self) -> &VideoFrame {
        &self.frame
    }

    /// Format the textures are allocated for.
    #[inline]
    pub fn format(&self) -> &VideoFormat {
        &self.format
    }

    pub fn is_frame_pending(&self) -> bool {
        self.mailbox.is_frame_pending()
    }

    /// Frames uploaded since creation.
    #[inline]
    pub fn drawn_frames(&self) -> u64 {
        self.textures.drawn_frames()
    }

    /// Frames overwritten in the mailbox before they could be drawn.
    pub fn dropped_frames(&self) -> u64 {
        self.mailbox.dropped_frames()
    }

    /// Letterboxed frame rectangle inside `area` for the current state.
    pub fn frame_rect(&self, area: Rect) -> Rect {
        self.geometry.frame_rect(area)
    }

    /// Visible video rectangle after offset and alignment.
    pub fn screen_rect(&self) -> Rect {
        self.geometry.screen_rect()
    }

    pub fn letterbox(&self) -> &Letterbox {
        self.geometry.letterbox()
    }

    #[inline]
    pub fn item_rect(&self) -> Rect {
        self.item
    }

    /// Rectangle of the overlay layer, covering the whole item.
    pub fn overlay_rect(&self) -> Rect {
        Rect::from_pos_size(Default::default(), self.item.size())
    }

    /// Rectangle the OSD layer is drawn into.
    pub fn osd_rect(&self) -> Rect {
        self.geometry.frame_rect_cached()
    }

    pub fn size_hint(&self) -> Size {
        let (w, h) = self.geometry.size_hint();
        Size::new(w as f32, h as f32)
    }

    pub fn output_width(&self) -> u32 {
        self.geometry.output_width()
    }

    #[inline]
    pub fn effects(&self) -> Effects {
        self.shader.effects()
    }

    #[inline]
    pub fn color(&self) -> ColorProperty {
        self.shader.color()
    }

    pub fn color_space(&self) -> (YuvColorSpace, ColorRange) {
        self.shader.color_space()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.geometry.aspect_ratio()
    }

    pub fn crop_ratio(&self) -> f64 {
        self.geometry.crop_ratio()
    }

    pub fn alignment(&self) -> Alignment {
        self.geometry.alignment()
    }

    pub fn offset(&self) -> Point {
        self.geometry.offset()
    }

    /// Program currently used for the video quad.
    #[inline]
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    #[inline]
    pub fn textures(&self) -> &TextureUploadEngine {
        &self.textures
    }
}

impl<B: RenderBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        self.release();
    }
}
