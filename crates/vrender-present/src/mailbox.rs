//! Single-slot frame mailbox between the producer and the render thread.
//!
//! Each `present` overwrites the slot; only the latest frame is drawn. The
//! lock is held only while swapping values, never across GPU work.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::trace;
use vrender_core::VideoFrame;

use crate::osd::{OsdImage, SubtitleBitmap};

#[derive(Debug, Default)]
struct Slot {
    /// Latest presented frame, kept after it is drawn for snapshots.
    frame: Arc<VideoFrame>,
    frame_pending: bool,
    check_format: bool,
    osd: Option<Arc<OsdImage>>,
    osd_pending: bool,
    presented: u64,
    dropped: u64,
}

/// Work handed to the render thread by [`Mailbox::take`].
#[derive(Debug)]
pub(crate) struct Pending {
    /// New frame and whether its format must be compared.
    pub frame: Option<(Arc<VideoFrame>, bool)>,
    pub osd: Option<Arc<OsdImage>>,
}

#[derive(Debug)]
pub(crate) struct Mailbox {
    slot: Mutex<Slot>,
    redraw: Sender<()>,
}

impl Mailbox {
    pub fn new() -> (Arc<Self>, Receiver<()>) {
        // One outstanding request is enough: redraws coalesce.
        let (redraw, requests) = crossbeam_channel::bounded(1);
        let mailbox = Self {
            slot: Mutex::new(Slot::default()),
            redraw,
        };
        (Arc::new(mailbox), requests)
    }

    pub fn put_frame(&self, frame: VideoFrame, check_format: bool) {
        let frame = Arc::new(frame);
        let mut slot = self.slot.lock();
        if slot.frame_pending {
            slot.dropped += 1;
            // A format check requested by the overwritten frame still applies.
            slot.check_format |= check_format;
        } else {
            slot.check_format = check_format;
        }
        let old = std::mem::replace(&mut slot.frame, frame);
        slot.frame_pending = true;
        slot.presented += 1;
        drop(slot);
        drop(old);
        self.request_redraw();
    }

    pub fn put_osd(&self, osd: OsdImage) {
        let osd = Arc::new(osd);
        {
            let mut slot = self.slot.lock();
            slot.osd = Some(osd);
            slot.osd_pending = true;
        }
        self.request_redraw();
    }

    /// Drain pending work. `None` when nothing changed since the last call.
    pub fn take(&self) -> Option<Pending> {
        let mut slot = self.slot.lock();
        if !slot.frame_pending && !slot.osd_pending {
            return None;
        }
        let frame = std::mem::take(&mut slot.frame_pending)
            .then(|| (Arc::clone(&slot.frame), slot.check_format));
        let osd = if std::mem::take(&mut slot.osd_pending) {
            slot.osd.clone()
        } else {
            None
        };
        Some(Pending { frame, osd })
    }

    pub fn request_redraw(&self) {
        match self.redraw.try_send(()) {
            Ok(()) => trace!("redraw requested"),
            Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {}
        }
    }

    pub fn latest_frame(&self) -> Arc<VideoFrame> {
        Arc::clone(&self.slot.lock().frame)
    }

    /// Logical size of the latest frame.
    pub fn frame_size(&self) -> (u32, u32) {
        self.slot.lock().frame.format().size()
    }

    pub fn is_frame_pending(&self) -> bool {
        self.slot.lock().frame_pending
    }

    pub fn presented_frames(&self) -> u64 {
        self.slot.lock().presented
    }

    pub fn dropped_frames(&self) -> u64 {
        self.slot.lock().dropped
    }
}

/// Producer-side handle of a [`Renderer`](crate::Renderer).
///
/// Cheap to clone and safe to use from any thread. Never blocks on the
/// render thread.
#[derive(Debug, Clone)]
pub struct FrameSender {
    mailbox: Arc<Mailbox>,
}

impl FrameSender {
    pub(crate) fn new(mailbox: Arc<Mailbox>) -> Self {
        Self { mailbox }
    }

    /// Hand a decoded frame to the renderer and request a redraw.
    ///
    /// `check_format = false` skips the format comparison for streams known
    /// to keep the same format.
    pub fn present(&self, frame: VideoFrame, check_format: bool) {
        self.mailbox.put_frame(frame, check_format);
    }

    /// Compose subtitle bitmaps into the overlay canvas.
    ///
    /// The canvas is sized to the latest presented frame and built before
    /// the mailbox lock is taken.
    pub fn draw_osd(&self, bitmaps: &[SubtitleBitmap]) {
        let (width, height) = self.mailbox.frame_size();
        let osd = OsdImage::compose(width, height, bitmaps);
        self.mailbox.put_osd(osd);
    }

    pub fn is_frame_pending(&self) -> bool {
        self.mailbox.is_frame_pending()
    }

    /// Frames passed to `present` so far.
    pub fn presented_frames(&self) -> u64 {
        self.mailbox.presented_frames()
    }

    /// Frames overwritten before the render thread drew them.
    pub fn dropped_frames(&self) -> u64 {
        self.mailbox.dropped_frames()
    }
}
