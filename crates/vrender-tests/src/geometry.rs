//! Frame placement as seen through the renderer: letterboxing, overrides,
//! alignment and the events they emit.

use proptest::prelude::*;
use vrender_core::{Alignment, Effects, PixelType, Point, Rect, VideoFrame};
use vrender_gpu::testing::RecordingBackend;
use vrender_present::{RenderEvent, Renderer};

fn close(a: Rect, b: Rect) -> bool {
    (a.x - b.x).abs() < 0.01
        && (a.y - b.y).abs() < 0.01
        && (a.width - b.width).abs() < 0.01
        && (a.height - b.height).abs() < 0.01
}

fn renderer_with(pixel_type: PixelType, w: u32, h: u32, item: Rect) -> Renderer<RecordingBackend> {
    let mut renderer = Renderer::new(RecordingBackend::new());
    renderer.resize(item);
    renderer.sender().present(VideoFrame::blank(pixel_type, w, h), true);
    renderer.prepare().unwrap();
    renderer
}

fn last_quad(renderer: &Renderer<RecordingBackend>) -> Rect {
    let draws = renderer.backend().draws();
    draws.first().map(|(_, _, quad)| quad.rect()).unwrap()
}

#[test]
fn hd_frame_is_letterboxed_in_4_3_item() {
    let mut renderer = renderer_with(
        PixelType::PlanarYuv420,
        1920,
        1080,
        Rect::new(0.0, 0.0, 800.0, 600.0),
    );
    let events = renderer.events();
    renderer.render().unwrap();

    let expected = Rect::new(0.0, 75.0, 800.0, 450.0);
    assert!(close(last_quad(&renderer), expected));
    assert!(close(renderer.screen_rect(), expected));
    assert!(close(renderer.osd_rect(), expected));
    assert_eq!(renderer.letterbox().bars().len(), 2);

    let screen_events: Vec<_> = events
        .try_iter()
        .filter(|e| matches!(e, RenderEvent::ScreenRectChanged(_)))
        .collect();
    assert_eq!(screen_events.len(), 1);
}

#[test]
fn pillarbox_for_portrait_frame() {
    let mut renderer = renderer_with(
        PixelType::PackedRgba,
        360,
        640,
        Rect::new(0.0, 0.0, 1280.0, 720.0),
    );
    renderer.render().unwrap();
    let quad = last_quad(&renderer);
    assert!((quad.height - 720.0).abs() < 0.01);
    assert!((quad.width - 405.0).abs() < 0.01);
    assert!((quad.x - 437.5).abs() < 0.01);
}

#[test]
fn stream_display_aspect_widens_anamorphic_frame() {
    let mut renderer = renderer_with(
        PixelType::SemiPlanarNv12,
        720,
        576,
        Rect::new(0.0, 0.0, 1024.0, 768.0),
    );
    renderer.set_video_aspect_ratio(16.0 / 9.0);
    renderer.render().unwrap();
    let quad = last_quad(&renderer);
    assert!((quad.width - 1024.0).abs() < 0.01);
    assert!((quad.height - 576.0).abs() < 0.01);
    assert_eq!(renderer.output_width(), 1024);
}

#[test]
fn forced_aspect_and_crop() {
    let mut renderer = renderer_with(
        PixelType::PlanarYuv420,
        1920,
        1080,
        Rect::new(0.0, 0.0, 800.0, 600.0),
    );
    assert!(renderer.set_aspect_ratio(4.0 / 3.0));
    assert!(close(renderer.osd_rect(), Rect::new(0.0, 0.0, 800.0, 600.0)));

    assert!(renderer.set_aspect_ratio(-1.0));
    assert!(renderer.set_crop_ratio(4.0 / 3.0));
    let rect = renderer.osd_rect();
    assert!((rect.height - 600.0).abs() < 0.01);
    assert!(rect.x < 0.0 && rect.width > 800.0);
}

#[test]
fn alignment_and_offset_move_the_quad_but_not_the_osd() {
    let mut renderer = renderer_with(
        PixelType::PackedRgba,
        400,
        300,
        Rect::new(0.0, 0.0, 800.0, 300.0),
    );
    let events = renderer.events();
    renderer.set_alignment(Alignment::LEFT | Alignment::V_CENTER);
    renderer.render().unwrap();
    assert!((last_quad(&renderer).x - 0.0).abs() < 0.01);

    renderer.backend_mut().clear_calls();
    assert!(renderer.set_offset(Point::new(10, 0)));
    assert!(!renderer.set_offset(Point::new(10, 0)));
    renderer.render().unwrap();
    assert!((last_quad(&renderer).x - 40.0).abs() < 0.01);
    assert!(close(renderer.osd_rect(), Rect::new(200.0, 0.0, 400.0, 300.0)));

    let offsets: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e {
            RenderEvent::OffsetChanged(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(offsets, vec![Point::new(10, 0)]);
}

#[test]
fn ignore_effect_suspends_flips() {
    let mut renderer = renderer_with(
        PixelType::PackedBgra,
        64,
        64,
        Rect::new(0.0, 0.0, 64.0, 64.0),
    );
    renderer.set_effects(Effects::FLIP_HORIZONTALLY | Effects::IGNORE_EFFECT);
    renderer.render().unwrap();
    let (_, _, quad) = renderer.backend().draws()[0];
    assert_eq!(quad.tex_coords().left, 0.0);

    renderer.backend_mut().clear_calls();
    renderer.set_effects(Effects::FLIP_HORIZONTALLY);
    renderer.render().unwrap();
    let (_, _, quad) = renderer.backend().draws()[0];
    assert_eq!(quad.tex_coords().left, 1.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn quad_fits_item_and_keeps_frame_aspect(
        fw in 16u32..2048,
        fh in 16u32..2048,
        iw in 32.0f32..2560.0,
        ih in 32.0f32..1440.0,
    ) {
        let mut renderer = renderer_with(PixelType::PackedRgba, fw, fh, Rect::new(0.0, 0.0, iw, ih));
        renderer.render().unwrap();
        let quad = last_quad(&renderer);
        let aspect = fw as f64 / fh as f64;
        prop_assert!((quad.aspect_ratio() - aspect).abs() / aspect < 1e-3);
        prop_assert!(quad.width <= iw + 0.01 && quad.height <= ih + 0.01);
        prop_assert!(close(renderer.screen_rect(), quad));
    }
}
