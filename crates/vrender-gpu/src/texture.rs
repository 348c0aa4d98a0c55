//! Video texture slots and per-frame plane upload.

use tracing::{debug, trace};
use vrender_core::{Result, TexelFormat, VRenderError, VideoFormat, VideoFrame, MAX_PLANES};

use crate::backend::{RenderBackend, TextureDesc, TextureId};

const SLOT_LABELS: [&str; MAX_PLANES] = ["video slot 0", "video slot 1", "video slot 2"];

/// An allocated texture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSlot {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
    pub format: TexelFormat,
}

/// Owns the (up to three) textures that receive frame planes.
///
/// Allocation and upload both read the pixel type's layout table, so a
/// slot's texel format and dimensions are always consistent between the
/// two.
#[derive(Debug, Default)]
pub struct TextureUploadEngine {
    slots: [Option<TextureSlot>; MAX_PLANES],
    format: VideoFormat,
    stride_correction: [f32; 2],
    drawn_frames: u64,
}

impl TextureUploadEngine {
    pub fn new() -> Self {
        Self {
            stride_correction: [1.0, 1.0],
            ..Default::default()
        }
    }

    /// Make the slots match `format`.
    ///
    /// Slots whose size and texel format already match are kept; the others
    /// are recreated, and slots the format does not use are released.
    /// Returns true if any texture was (re)created or released.
    pub fn ensure_allocated<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        format: &VideoFormat,
    ) -> Result<bool> {
        let layout = format.layout();
        let mut changed = false;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let wanted = layout.slots.get(index).and_then(|s| {
                let (width, height) = format.slot_size(index)?;
                Some(TextureDesc {
                    label: SLOT_LABELS[index],
                    width,
                    height,
                    format: s.texel,
                })
            });
            // Zero-sized textures are invalid; such a slot stays unallocated.
            let wanted = wanted.filter(|d| d.width > 0 && d.height > 0);

            let keep = match (&*slot, &wanted) {
                (Some(cur), Some(desc)) => {
                    cur.width == desc.width && cur.height == desc.height && cur.format == desc.format
                }
                (None, None) => true,
                _ => false,
            };
            if keep {
                continue;
            }
            if let Some(old) = slot.take() {
                backend.destroy_texture(old.id);
            }
            if let Some(desc) = wanted {
                let id = backend.create_texture(&desc)?;
                debug!(
                    slot = index,
                    width = desc.width,
                    height = desc.height,
                    texel = ?desc.format,
                    "allocated video texture"
                );
                *slot = Some(TextureSlot {
                    id,
                    width: desc.width,
                    height: desc.height,
                    format: desc.format,
                });
            }
            changed = true;
        }
        self.format = format.clone();
        self.stride_correction = format.stride_correction();
        Ok(changed)
    }

    /// Upload every plane of `frame` into its slot.
    ///
    /// Returns `Ok(false)` without touching the drawn-frame counter when the
    /// frame carries no image. A slot whose allocation disagrees with the
    /// frame's plane geometry yields [`VRenderError::FormatMismatch`] and
    /// nothing is uploaded.
    pub fn upload<B: RenderBackend>(&mut self, backend: &mut B, frame: &VideoFrame) -> Result<bool> {
        let format = frame.format();
        let layout = format.layout();
        if frame.is_empty() || layout.slots.is_empty() {
            return Ok(false);
        }

        // Validate everything before the first write so a mismatch never
        // leaves the slots half-updated.
        for index in 0..layout.slots.len() {
            let got = format.slot_size(index).unwrap_or_default();
            match &self.slots[index] {
                Some(slot) if (slot.width, slot.height) == got => {}
                Some(slot) => {
                    return Err(VRenderError::FormatMismatch {
                        slot: index,
                        expected: (slot.width, slot.height),
                        got,
                    })
                }
                None => {
                    return Err(VRenderError::FormatMismatch {
                        slot: index,
                        expected: (0, 0),
                        got,
                    })
                }
            }
        }

        for (index, slot_layout) in layout.slots.iter().enumerate() {
            let Some(slot) = self.slots[index] else {
                continue;
            };
            let plane = frame.plane(slot_layout.source_plane).ok_or_else(|| {
                VRenderError::InvalidFrame(format!("missing plane {}", slot_layout.source_plane))
            })?;
            let rows = slot.height as usize;
            let len = (plane.stride * rows).min(plane.data.len());
            backend.write_texture(slot.id, &plane.data[..len], plane.stride as u32)?;
        }

        self.drawn_frames += 1;
        trace!(frames = self.drawn_frames, "uploaded frame planes");
        Ok(true)
    }

    /// Destroy every slot.
    pub fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        for slot in self.slots.iter_mut() {
            if let Some(old) = slot.take() {
                backend.destroy_texture(old.id);
            }
        }
        self.format = VideoFormat::empty();
        self.stride_correction = [1.0, 1.0];
    }

    #[inline]
    pub fn slot(&self, index: usize) -> Option<&TextureSlot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Texture ids bound as `p1`..`p3`.
    pub fn texture_ids(&self) -> [Option<TextureId>; MAX_PLANES] {
        self.slots.map(|s| s.map(|s| s.id))
    }

    /// Format the slots were last allocated for.
    #[inline]
    pub fn format(&self) -> &VideoFormat {
        &self.format
    }

    /// Stride correction of slots 1 and 2 for the allocated format.
    #[inline]
    pub fn stride_correction(&self) -> [f32; 2] {
        self.stride_correction
    }

    /// Frames uploaded since creation.
    #[inline]
    pub fn drawn_frames(&self) -> u64 {
        self.drawn_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BackendCall, RecordingBackend};
    use vrender_core::{FramePlane, PixelType};

    #[test]
    fn test_allocate_then_upload_every_type() {
        for ty in PixelType::SUPPORTED {
            let mut backend = RecordingBackend::new();
            let mut engine = TextureUploadEngine::new();
            let frame = VideoFrame::blank(ty, 64, 36);
            assert!(engine.ensure_allocated(&mut backend, frame.format()).unwrap());
            assert!(engine.upload(&mut backend, &frame).unwrap(), "{ty:?}");
            assert_eq!(engine.drawn_frames(), 1);
            assert_eq!(backend.live_textures(), ty.layout().slots.len(), "{ty:?}");
        }
    }

    #[test]
    fn test_slot_table() {
        let mut backend = RecordingBackend::new();
        let mut engine = TextureUploadEngine::new();
        let f = VideoFormat::new(PixelType::SemiPlanarNv21, 1280, 720);
        engine.ensure_allocated(&mut backend, &f).unwrap();
        let s1 = engine.slot(1).unwrap();
        assert_eq!((s1.width, s1.height, s1.format), (640, 360, TexelFormat::Rg8));
        assert!(engine.slot(2).is_none());

        let f = VideoFormat::new(PixelType::PackedUyvy, 1280, 720);
        engine.ensure_allocated(&mut backend, &f).unwrap();
        let s0 = engine.slot(0).unwrap();
        let s1 = engine.slot(1).unwrap();
        assert_eq!((s0.width, s0.format), (1280, TexelFormat::Rg8));
        assert_eq!((s1.width, s1.format), (640, TexelFormat::Rgba8));
    }

    #[test]
    fn test_same_geometry_keeps_handles() {
        let mut backend = RecordingBackend::new();
        let mut engine = TextureUploadEngine::new();
        let f = VideoFormat::new(PixelType::PlanarYuv420, 320, 240);
        engine.ensure_allocated(&mut backend, &f).unwrap();
        let ids = engine.texture_ids();
        assert!(!engine.ensure_allocated(&mut backend, &f).unwrap());
        assert_eq!(engine.texture_ids(), ids);
    }

    #[test]
    fn test_mismatch_is_reported_before_writing() {
        let mut backend = RecordingBackend::new();
        let mut engine = TextureUploadEngine::new();
        engine
            .ensure_allocated(&mut backend, &VideoFormat::new(PixelType::PlanarYuv420, 320, 240))
            .unwrap();
        backend.clear_calls();

        let padded = VideoFrame::from_planes(
            PixelType::PlanarYuv420,
            320,
            240,
            [
                FramePlane::zeroed(384, 240),
                FramePlane::zeroed(192, 120),
                FramePlane::zeroed(192, 120),
            ],
        )
        .unwrap();
        let err = engine.upload(&mut backend, &padded).unwrap_err();
        assert!(matches!(
            err,
            VRenderError::FormatMismatch {
                slot: 0,
                expected: (320, 240),
                got: (384, 240)
            }
        ));
        assert_eq!(engine.drawn_frames(), 0);
        assert!(backend.calls().is_empty());

        // Reallocating for the padded geometry fixes it.
        engine.ensure_allocated(&mut backend, padded.format()).unwrap();
        assert!(engine.upload(&mut backend, &padded).unwrap());
    }

    #[test]
    fn test_empty_frame_is_a_noop() {
        let mut backend = RecordingBackend::new();
        let mut engine = TextureUploadEngine::new();
        assert!(!engine.ensure_allocated(&mut backend, &VideoFormat::empty()).unwrap());
        assert!(!engine.upload(&mut backend, &VideoFrame::empty()).unwrap());
        assert_eq!(engine.drawn_frames(), 0);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_packed_slots_alias_plane_zero() {
        let mut backend = RecordingBackend::new();
        let mut engine = TextureUploadEngine::new();
        let frame = VideoFrame::blank(PixelType::PackedYuy2, 8, 2);
        engine.ensure_allocated(&mut backend, frame.format()).unwrap();
        engine.upload(&mut backend, &frame).unwrap();
        let ids = engine.texture_ids();
        let a = backend.texture_data(ids[0].unwrap()).unwrap();
        let b = backend.texture_data(ids[1].unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, frame.data(0));
    }

    #[test]
    fn test_switching_type_releases_unused_slots() {
        let mut backend = RecordingBackend::new();
        let mut engine = TextureUploadEngine::new();
        engine
            .ensure_allocated(&mut backend, &VideoFormat::new(PixelType::PlanarYuv420, 64, 64))
            .unwrap();
        assert_eq!(backend.live_textures(), 3);
        engine
            .ensure_allocated(&mut backend, &VideoFormat::new(PixelType::PackedRgba, 64, 64))
            .unwrap();
        assert_eq!(backend.live_textures(), 1);
        let destroyed = backend
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::DestroyTexture(_)))
            .count();
        assert_eq!(destroyed, 3);
        engine.release(&mut backend);
        assert_eq!(backend.live_textures(), 0);
    }
}
