//! Producer to render-thread hand-off, format changes, program rebuilds and
//! snapshots, driven end to end over the recording backend.

use std::thread;

use vrender_color::{test_pattern, FrameImageExt};
use vrender_core::{Effects, FramePlane, PixelType, Rect, VideoFrame};
use vrender_gpu::testing::{BackendCall, RecordingBackend};
use vrender_present::{RenderEvent, Renderer, RendererConfig, SubtitleBitmap};

fn renderer() -> Renderer<RecordingBackend> {
    let mut renderer = Renderer::new(RecordingBackend::new());
    renderer.resize(Rect::new(0.0, 0.0, 640.0, 360.0));
    renderer
}

fn writes(renderer: &Renderer<RecordingBackend>) -> usize {
    renderer
        .backend()
        .count(|c| matches!(c, BackendCall::WriteTexture { .. }))
}

/// Solid RGBA frame whose first byte tags it.
fn tagged_frame(tag: u8) -> VideoFrame {
    let mut plane = FramePlane::zeroed(16 * 4, 16);
    plane.data.fill(tag);
    VideoFrame::from_planes(PixelType::PackedRgba, 16, 16, [plane]).unwrap()
}

#[test]
fn presents_between_prepares_coalesce_to_the_latest() {
    let mut renderer = renderer();
    let sender = renderer.sender();
    for tag in 1..=5 {
        sender.present(tagged_frame(tag), true);
    }
    assert!(renderer.is_frame_pending());
    assert!(renderer.prepare().unwrap());
    assert!(!renderer.is_frame_pending());

    assert_eq!(writes(&renderer), 1);
    assert_eq!(renderer.drawn_frames(), 1);
    assert_eq!(renderer.dropped_frames(), 4);
    let id = renderer.textures().texture_ids()[0].unwrap();
    assert_eq!(
        renderer.backend().texture_data(id),
        Some(tagged_frame(5).data(0))
    );
    assert_eq!(renderer.drawn_frame().data(0)[0], 5);

    // Nothing new: the next prepare does no work.
    renderer.backend_mut().clear_calls();
    assert!(!renderer.prepare().unwrap());
    assert!(renderer.backend().calls().is_empty());
}

#[test]
fn redraw_requests_coalesce() {
    let renderer = renderer();
    let redraw = renderer.redraw_requests();
    // Drain the request made by the initial resize.
    let _ = redraw.try_recv();
    let sender = renderer.sender();
    for tag in 0..10 {
        sender.present(tagged_frame(tag), false);
    }
    assert!(redraw.try_recv().is_ok());
    assert!(redraw.try_recv().is_err());
}

#[test]
fn kernel_effect_rebuilds_program_but_keeps_textures() {
    let mut renderer = renderer();
    renderer
        .sender()
        .present(VideoFrame::blank(PixelType::PlanarYuv420, 320, 180), true);
    renderer.prepare().unwrap();
    let textures = renderer.textures().texture_ids();
    let program = renderer.program().unwrap();
    assert!(!renderer
        .backend()
        .program_source(program)
        .unwrap()
        .contains("u.kern.x"));

    assert!(renderer.set_effects(Effects::SHARPEN));
    assert!(!renderer.set_effects(Effects::SHARPEN));
    renderer.render().unwrap();

    let rebuilt = renderer.program().unwrap();
    assert_ne!(rebuilt, program);
    assert_eq!(renderer.textures().texture_ids(), textures);
    assert!(renderer
        .backend()
        .program_source(rebuilt)
        .unwrap()
        .contains("u.kern.x"));
    assert_eq!(renderer.backend().live_programs(), 1);
    assert_eq!(renderer.backend().draws()[0].0, rebuilt);
}

#[test]
fn ignore_effect_restores_the_plain_program() {
    let mut renderer = renderer();
    renderer
        .sender()
        .present(VideoFrame::blank(PixelType::SemiPlanarNv12, 64, 64), true);
    renderer.prepare().unwrap();
    let plain = renderer.backend().program_source(renderer.program().unwrap()).map(str::to_owned);

    renderer.set_effects(Effects::GRAYSCALE | Effects::BLUR);
    renderer.render().unwrap();
    let filtered = renderer.backend().program_source(renderer.program().unwrap()).map(str::to_owned);
    assert_ne!(filtered, plain);

    renderer.set_effects(Effects::GRAYSCALE | Effects::BLUR | Effects::IGNORE_EFFECT);
    renderer.render().unwrap();
    let suspended = renderer.backend().program_source(renderer.program().unwrap()).map(str::to_owned);
    assert_eq!(suspended, plain);
    assert_eq!(renderer.effects(), Effects::GRAYSCALE | Effects::BLUR | Effects::IGNORE_EFFECT);
}

#[test]
fn padded_frame_with_same_size_reallocates() {
    let mut renderer = renderer();
    let events = renderer.events();
    let sender = renderer.sender();
    sender.present(VideoFrame::blank(PixelType::PlanarYuv420, 320, 240), true);
    renderer.prepare().unwrap();

    // Same pixel type and size, so the format compares equal; only the
    // plane geometry differs.
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
    sender.present(padded, true);
    assert!(renderer.prepare().unwrap());

    let slot = renderer.textures().slot(0).unwrap();
    assert_eq!((slot.width, slot.height), (384, 240));
    assert_eq!(renderer.drawn_frames(), 2);
    // Only the row padding changed: the first frame's notification is the
    // only one layout code sees.
    let format_changes = events
        .try_iter()
        .filter(|e| matches!(e, RenderEvent::FormatChanged(_)))
        .count();
    assert_eq!(format_changes, 1);

    renderer.render().unwrap();
    let (_, _, quad) = renderer.backend().draws()[0];
    assert!((quad.tex_coords().right - 320.0 / 384.0).abs() < 1e-6);
}

#[test]
fn pixel_type_switch_is_detected_without_check() {
    let mut renderer = renderer();
    let sender = renderer.sender();
    sender.present(VideoFrame::blank(PixelType::PlanarYuv420, 64, 64), true);
    renderer.prepare().unwrap();
    let program = renderer.program();

    sender.present(VideoFrame::blank(PixelType::PackedYuy2, 64, 64), false);
    assert!(renderer.prepare().unwrap());
    assert_eq!(renderer.format().pixel_type(), PixelType::PackedYuy2);
    assert_ne!(renderer.program(), program);
    assert!(renderer.textures().slot(1).is_some());
    assert!(renderer.textures().slot(2).is_none());
}

#[test]
fn empty_frame_releases_video_state() {
    let mut renderer = renderer();
    let sender = renderer.sender();
    sender.present(VideoFrame::blank(PixelType::PlanarYuv420, 64, 64), true);
    renderer.prepare().unwrap();
    assert!(renderer.has_frame());

    sender.present(VideoFrame::empty(), true);
    assert!(!renderer.prepare().unwrap());
    assert!(!renderer.has_frame());
    assert!(renderer.format().is_empty());
    assert_eq!(renderer.backend().live_textures(), 0);
    assert!(renderer.program().is_none());
    assert!(renderer.frame_image().is_none());

    renderer.backend_mut().clear_calls();
    renderer.render().unwrap();
    assert!(renderer.backend().draws().is_empty());
    assert_eq!(renderer.size_hint().width, 400.0);
}

#[test]
fn threaded_producer_accounts_for_every_frame() {
    const FRAMES: u64 = 200;
    let mut renderer = renderer();
    let sender = renderer.sender();
    let redraw = renderer.redraw_requests();

    let producer = thread::spawn(move || {
        for i in 0..FRAMES {
            sender.present(tagged_frame(i as u8), i == 0);
        }
    });
    while !producer.is_finished() {
        if redraw.recv_timeout(std::time::Duration::from_millis(10)).is_ok() {
            renderer.prepare().unwrap();
            renderer.render().unwrap();
            renderer.backend_mut().clear_calls();
        }
    }
    producer.join().unwrap();
    renderer.prepare().unwrap();

    assert_eq!(renderer.drawn_frames() + renderer.dropped_frames(), FRAMES);
    assert_eq!(renderer.drawn_frame().data(0)[0], (FRAMES - 1) as u8);
}

#[test]
fn osd_follows_frame_and_can_be_disabled() {
    let mut renderer = renderer();
    let sender = renderer.sender();
    sender.present(VideoFrame::blank(PixelType::PlanarYuv420, 64, 36), true);
    renderer.prepare().unwrap();
    sender.draw_osd(&[SubtitleBitmap::new(0, 30, 64, 6, vec![255; 64 * 6 * 4])]);

    // Overlay-only update: no frame upload.
    renderer.backend_mut().clear_calls();
    assert!(!renderer.prepare().unwrap());
    assert_eq!(writes(&renderer), 1);
    assert!(renderer.osd_image().is_some());

    renderer.render().unwrap();
    let draws = renderer.backend().draws();
    assert_eq!(draws.len(), 2);
    let (osd, expected) = (draws[1].2.rect(), renderer.osd_rect());
    assert!((osd.x - expected.x).abs() < 0.01 && (osd.y - expected.y).abs() < 0.01);
    assert!((osd.width - expected.width).abs() < 0.01);

    renderer.backend_mut().clear_calls();
    renderer.set_osd_enabled(false);
    renderer.render().unwrap();
    assert_eq!(renderer.backend().draws().len(), 1);
    assert!(renderer.osd_image().is_none());
}

#[test]
fn subtitle_drawn_with_first_frame_survives_format_change() {
    let mut renderer = renderer();
    let sender = renderer.sender();
    sender.present(VideoFrame::blank(PixelType::PlanarYuv420, 64, 36), true);
    sender.draw_osd(&[SubtitleBitmap::new(0, 0, 8, 8, vec![255; 8 * 8 * 4])]);

    assert!(renderer.prepare().unwrap());
    assert!(renderer.osd_image().is_some_and(|osd| !osd.is_blank()));
    renderer.render().unwrap();
    assert_eq!(renderer.backend().draws().len(), 2);

    // A new size arrives with its own subtitle in the same prepare.
    renderer.backend_mut().clear_calls();
    sender.present(VideoFrame::blank(PixelType::PlanarYuv420, 128, 72), true);
    sender.draw_osd(&[SubtitleBitmap::new(0, 60, 8, 8, vec![255; 8 * 8 * 4])]);
    renderer.prepare().unwrap();
    let osd = renderer.osd_image().unwrap();
    assert_eq!((osd.width(), osd.height()), (128, 72));
    renderer.render().unwrap();
    assert_eq!(renderer.backend().draws().len(), 2);

    let snapshot = renderer.frame_image().unwrap();
    assert_eq!(snapshot.get_pixel(0, 60).0, [255, 255, 255, 255]);
}

#[test]
fn config_applies_to_new_renderer() {
    let config = RendererConfig::from_json_str(
        r#"{ "aspect_ratio": 1.0, "effects": "FLIP_VERTICALLY", "osd": false, "clear_color": [0.5, 0.5, 0.5, 1.0] }"#,
    )
    .unwrap();
    let mut renderer = Renderer::with_config(RecordingBackend::new(), &config);
    renderer.resize(Rect::new(0.0, 0.0, 200.0, 100.0));
    assert_eq!(renderer.effects(), Effects::FLIP_VERTICALLY);
    assert_eq!(renderer.aspect_ratio(), 1.0);

    renderer
        .sender()
        .present(VideoFrame::blank(PixelType::PackedRgba, 64, 32), true);
    renderer.prepare().unwrap();
    renderer.render().unwrap();
    let begin = renderer
        .backend()
        .calls()
        .iter()
        .find_map(|c| match c {
            BackendCall::BeginPass { clear, .. } => Some(*clear),
            _ => None,
        });
    assert_eq!(begin, Some([0.5, 0.5, 0.5, 1.0]));
    let (_, _, quad) = renderer.backend().draws()[0];
    assert_eq!(quad.rect(), Rect::new(50.0, 0.0, 100.0, 100.0));
    assert_eq!(quad.tex_coords().top, 1.0);
}

#[test]
fn snapshot_of_color_bars() {
    let mut renderer = renderer();
    let frame = test_pattern(PixelType::PlanarYuv420, 64, 32).unwrap();
    let reference = frame.to_image().unwrap();
    renderer.sender().present(frame, true);
    renderer.prepare().unwrap();

    let image = renderer.frame_image().unwrap();
    assert_eq!(image.dimensions(), (64, 32));
    assert_eq!(image, reference);
    let white = image.get_pixel(4, 16).0;
    let red = image.get_pixel(5 * 8 + 4, 16).0;
    assert!(white[..3].iter().all(|&c| c > 240), "{white:?}");
    assert!(red[0] > 230 && red[1] < 20 && red[2] < 20, "{red:?}");
}
