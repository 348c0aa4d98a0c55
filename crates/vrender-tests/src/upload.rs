//! Texture slot allocation and plane upload for every pixel type.

use vrender_core::{FramePlane, PixelType, Rect, TexelFormat, VideoFormat, VideoFrame};
use vrender_gpu::testing::RecordingBackend;
use vrender_gpu::TextureUploadEngine;
use vrender_present::Renderer;

/// (texel format, width, height) of each slot for a 1280x720 frame.
fn expected_slots(ty: PixelType) -> Vec<(TexelFormat, u32, u32)> {
    match ty {
        PixelType::PlanarYuv420 => vec![
            (TexelFormat::R8, 1280, 720),
            (TexelFormat::R8, 640, 360),
            (TexelFormat::R8, 640, 360),
        ],
        PixelType::SemiPlanarNv12 | PixelType::SemiPlanarNv21 => vec![
            (TexelFormat::R8, 1280, 720),
            (TexelFormat::Rg8, 640, 360),
        ],
        PixelType::PackedYuy2 | PixelType::PackedUyvy => vec![
            (TexelFormat::Rg8, 1280, 720),
            (TexelFormat::Rgba8, 640, 720),
        ],
        PixelType::PackedRgba => vec![(TexelFormat::Rgba8, 1280, 720)],
        PixelType::PackedBgra => vec![(TexelFormat::Bgra8, 1280, 720)],
        PixelType::Empty => Vec::new(),
    }
}

#[test]
fn slot_table_per_pixel_type() {
    for ty in PixelType::SUPPORTED {
        let mut backend = RecordingBackend::new();
        let mut engine = TextureUploadEngine::new();
        let format = VideoFormat::new(ty, 1280, 720);
        assert!(engine.ensure_allocated(&mut backend, &format).unwrap());

        let slots: Vec<_> = (0..3)
            .filter_map(|i| engine.slot(i))
            .map(|s| (s.format, s.width, s.height))
            .collect();
        assert_eq!(slots, expected_slots(ty), "{ty:?}");
        assert_eq!(engine.stride_correction(), [1.0, 1.0], "{ty:?}");
    }
}

#[test]
fn every_pixel_type_uploads_through_renderer() {
    for ty in PixelType::SUPPORTED {
        let mut renderer = Renderer::new(RecordingBackend::new());
        renderer.resize(Rect::new(0.0, 0.0, 320.0, 180.0));
        let frame = VideoFrame::blank(ty, 320, 180);
        renderer.sender().present(frame.clone(), true);

        assert!(renderer.prepare().unwrap(), "{ty:?}");
        assert_eq!(renderer.drawn_frames(), 1);
        let ids = renderer.textures().texture_ids();
        for (index, slot) in ty.layout().slots.iter().enumerate() {
            let id = ids[index].unwrap();
            assert_eq!(
                renderer.backend().texture_data(id),
                Some(frame.data(slot.source_plane)),
                "{ty:?} slot {index}"
            );
        }

        renderer.render().unwrap();
        let draws = renderer.backend().draws();
        assert_eq!(draws.len(), 1, "{ty:?}");
        assert_eq!(draws[0].1, ids);
    }
}

#[test]
fn chroma_padding_sets_stride_correction() {
    // 1000 px wide: luma rows padded to 1024, chroma rows padded to 640
    // instead of the 512 that would keep them aligned with luma.
    let frame = VideoFrame::from_planes(
        PixelType::PlanarYuv420,
        1000,
        500,
        [
            FramePlane::zeroed(1024, 500),
            FramePlane::zeroed(640, 250),
            FramePlane::zeroed(640, 250),
        ],
    )
    .unwrap();
    let mut renderer = Renderer::new(RecordingBackend::new());
    renderer.resize(Rect::new(0.0, 0.0, 1000.0, 500.0));
    renderer.sender().present(frame, true);
    renderer.prepare().unwrap();

    let sc = renderer.textures().stride_correction();
    assert!((sc[0] - 0.8).abs() < 1e-6);
    assert!((sc[1] - 0.8).abs() < 1e-6);

    renderer.render().unwrap();
    let program = renderer.program().unwrap();
    let uniforms = renderer.backend().uniforms(program).unwrap();
    assert_eq!(uniforms.stride_correction(), sc);

    let (_, _, quad) = renderer.backend().draws()[0];
    assert!((quad.tex_coords().right - 1000.0 / 1024.0).abs() < 1e-6);
}

#[test]
fn aligned_padding_keeps_unit_correction() {
    let format = VideoFormat::with_strides(PixelType::SemiPlanarNv12, 1918, 1080, &[1920, 1920]);
    let mut backend = RecordingBackend::new();
    let mut engine = TextureUploadEngine::new();
    engine.ensure_allocated(&mut backend, &format).unwrap();
    assert_eq!(engine.stride_correction(), [1.0, 1.0]);
    let s1 = engine.slot(1).unwrap();
    assert_eq!((s1.width, s1.height), (960, 540));
}

#[test]
fn drawn_counter_counts_uploads_only() {
    let mut backend = RecordingBackend::new();
    let mut engine = TextureUploadEngine::new();
    let frame = VideoFrame::blank(PixelType::SemiPlanarNv21, 64, 48);
    engine.ensure_allocated(&mut backend, frame.format()).unwrap();
    for expected in 1..=3 {
        assert!(engine.upload(&mut backend, &frame).unwrap());
        assert_eq!(engine.drawn_frames(), expected);
    }
    assert!(!engine.upload(&mut backend, &VideoFrame::empty()).unwrap());
    assert_eq!(engine.drawn_frames(), 3);
}
