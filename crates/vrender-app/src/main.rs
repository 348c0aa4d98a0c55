//! VRender - headless video presentation demo
//!
//! A producer thread plays the role of the decoder and presents animated
//! colour bars with a subtitle strip; the main thread renders them with
//! wgpu and saves the last rendered image.
//!
//! Usage: vrender [OUTPUT.png] [CONFIG.json|-] [FRAMES] [PIXEL_TYPE]

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::RecvTimeoutError;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vrender_color::{
    frame_from_rgba, save_image, test_pattern, ColorRange, FrameImageExt, YuvColorSpace,
};
use vrender_core::{PixelType, Rect};
use vrender_gpu::{GpuContext, WgpuBackend};
use vrender_present::{FrameSender, Renderer, RendererConfig, SubtitleBitmap};

const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 360;
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

struct Args {
    output: PathBuf,
    config: Option<PathBuf>,
    frames: u32,
    pixel_type: PixelType,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = std::env::args().skip(1);
        let output = args
            .next()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("vrender.png"));
        let config = args.next().filter(|a| a != "-").map(PathBuf::from);
        let frames = match args.next() {
            Some(n) => n
                .parse()
                .with_context(|| format!("invalid frame count {n:?}"))?,
            None => 30,
        };
        let pixel_type = match args.next() {
            Some(name) => name.parse()?,
            None => PixelType::PlanarYuv420,
        };
        Ok(Self {
            output,
            config,
            frames,
            pixel_type,
        })
    }
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse()?;
    let config = match &args.config {
        Some(path) => RendererConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RendererConfig::default(),
    };
    info!(
        pixel_type = args.pixel_type.name(),
        frames = args.frames,
        "VRender starting..."
    );

    let ctx = GpuContext::new_blocking()?;
    let mut renderer = Renderer::with_config(WgpuBackend::new(&ctx), &config);
    renderer.resize(Rect::new(0.0, 0.0, 1280.0, 720.0));

    let sender = renderer.sender();
    let redraw = renderer.redraw_requests();
    let events = renderer.events();
    let (pixel_type, frames) = (args.pixel_type, args.frames);
    let producer = thread::Builder::new()
        .name("producer".into())
        .spawn(move || produce(&sender, pixel_type, frames))?;

    // Render loop: one prepare/render per coalesced redraw request.
    loop {
        match redraw.recv_timeout(Duration::from_millis(100)) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) if producer.is_finished() => break,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if let Err(e) = renderer.prepare().and_then(|_| renderer.render()) {
            warn!(error = %e, "skipping frame");
        }
        for event in events.try_iter() {
            info!(?event, "render event");
        }
    }

    producer
        .join()
        .map_err(|_| anyhow!("producer thread panicked"))??;

    renderer.prepare()?;
    renderer.render()?;
    let image = renderer.backend().read_pixels()?;
    save_image(&image, &args.output).context("failed to write output image")?;

    if let Some(snapshot) = renderer.frame_image() {
        save_image(&snapshot, snapshot_path(&args.output)).context("failed to write snapshot")?;
    }

    info!(
        drawn = renderer.drawn_frames(),
        dropped = renderer.dropped_frames(),
        output = %args.output.display(),
        "VRender finished"
    );
    Ok(())
}

/// Decoder stand-in: scrolls colour bars and updates a subtitle strip.
fn produce(sender: &FrameSender, pixel_type: PixelType, frames: u32) -> Result<()> {
    let bars = test_pattern(PixelType::PackedRgba, FRAME_WIDTH, FRAME_HEIGHT)?
        .to_image()
        .ok_or_else(|| anyhow!("failed to build test pattern"))?;
    let row_bytes = FRAME_WIDTH as usize * 4;

    for index in 0..frames {
        let mut rgba = bars.as_raw().clone();
        let shift = (index as usize * 8 % FRAME_WIDTH as usize) * 4;
        for row in rgba.chunks_mut(row_bytes) {
            row.rotate_right(shift);
        }
        let frame = frame_from_rgba(
            pixel_type,
            FRAME_WIDTH,
            FRAME_HEIGHT,
            &rgba,
            YuvColorSpace::Bt601,
            ColorRange::Limited,
        )?;
        sender.present(frame, index == 0);
        sender.draw_osd(&[subtitle_strip(index, frames)]);
        thread::sleep(FRAME_INTERVAL);
    }
    info!(
        presented = sender.presented_frames(),
        dropped = sender.dropped_frames(),
        "producer done"
    );
    Ok(())
}

/// Semi-transparent progress strip along the bottom of the frame.
fn subtitle_strip(index: u32, frames: u32) -> SubtitleBitmap {
    let (width, height) = (FRAME_WIDTH - 40, 24);
    let filled = (width as u64 * (index as u64 + 1) / frames.max(1) as u64) as u32;
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..height {
        for x in 0..width {
            let px = if x < filled {
                [255, 255, 255, 200]
            } else {
                [0, 0, 0, 128]
            };
            rgba.extend_from_slice(&px);
        }
    }
    SubtitleBitmap::new(20, (FRAME_HEIGHT - height - 20) as i32, width, height, rgba)
}

fn snapshot_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vrender".to_string());
    output.with_file_name(format!("{stem}-snapshot.png"))
}
