use anyhow::{Context, Result, bail};
use clap::Parser;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use luma_motion::{DetectorConfig, LumaFrame, MotionDetector, Region};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];
const REGION_COLOR: Rgb<u8> = Rgb([255, 48, 48]);

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "motion_tester",
    version,
    about = "Runs a directory of frames through the luma motion detector",
    long_about = None
)]
struct Cli {
    /// Directory of input frames, processed in filename order
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for annotated frames
    #[arg(short, long, default_value = "annotated")]
    output: PathBuf,

    /// Detector config file (TOML)
    #[arg(short, long, env = "LUMA_MOTION_CONFIG")]
    config: Option<PathBuf>,

    /// Luma change a sampled pixel must exceed
    #[arg(long)]
    threshold: Option<u8>,

    /// Minimum region area in full-resolution pixels
    #[arg(long)]
    min_area: Option<u32>,

    /// Maximum regions per frame
    #[arg(long)]
    max_objects: Option<usize>,

    /// Display surface to map regions onto, as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_display)]
    display: Option<(f32, f32)>,
}

fn parse_display(value: &str) -> Result<(f32, f32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let w: f32 = w.trim().parse().map_err(|_| format!("bad display width '{w}'"))?;
    let h: f32 = h.trim().parse().map_err(|_| format!("bad display height '{h}'"))?;
    if w <= 0.0 || h <= 0.0 {
        return Err("display dimensions must be positive".into());
    }
    Ok((w, h))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    // Respect RUST_LOG; default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    info!(?config, "detector configuration");

    let frames = collect_frames(&cli.input)?;
    if frames.is_empty() {
        bail!("no frames found in {}", cli.input.display());
    }
    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("creating output directory {}", cli.output.display()))?;

    let mut detector = MotionDetector::new(config)?;
    let started = Instant::now();

    for path in &frames {
        let image = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
        let mut canvas = image.to_rgb8();
        let (width, height) = canvas.dimensions();

        let regions = detector.detect(LumaFrame::from_image(&image))?;
        debug!(frame = %path.display(), regions = regions.len(), "frame done");

        if let Some((display_w, display_h)) = cli.display {
            for region in &regions {
                let rect = region.to_display(width, height, display_w, display_h);
                info!(
                    frame = %path.display(),
                    left = rect.left,
                    top = rect.top,
                    right = rect.right,
                    bottom = rect.bottom,
                    "display region"
                );
            }
        }

        draw_regions(&mut canvas, &regions);
        let out_path = output_path(&cli.output, path);
        canvas
            .save(&out_path)
            .with_context(|| format!("writing {}", out_path.display()))?;
    }

    let elapsed = started.elapsed();
    let stats = detector.stats();
    let throughput = stats.frames() as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    println!("Processing complete. Output saved to {}", cli.output.display());
    println!("  frames            : {}", stats.frames());
    println!("  frames with motion: {}", stats.frames_with_motion());
    println!("  avg latency       : {:.3} ms", stats.average_latency().as_secs_f64() * 1000.0);
    println!("  max latency       : {:.3} ms", stats.max_latency().as_secs_f64() * 1000.0);
    println!("  throughput        : {throughput:.1} fps");
    Ok(())
}

/// Defaults, then the config file (or the environment alone), then CLI flags.
fn resolve_config(cli: &Cli) -> Result<DetectorConfig> {
    let mut config = match &cli.config {
        Some(path) => DetectorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            let mut config = DetectorConfig::default();
            config.apply_env()?;
            config
        }
    };

    if let Some(threshold) = cli.threshold {
        config.motion_threshold = threshold;
    }
    if let Some(min_area) = cli.min_area {
        config.min_motion_area = min_area;
    }
    if let Some(max_objects) = cli.max_objects {
        config.max_objects = max_objects;
    }
    config.validate()?;
    Ok(config)
}

fn collect_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;
    let mut frames = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if is_frame(&path) {
            frames.push(path);
        } else {
            warn!(path = %path.display(), "skipping non-frame file");
        }
    }
    frames.sort();
    Ok(frames)
}

fn is_frame(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                FRAME_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
}

fn output_path(dir: &Path, input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    dir.join(format!("{}.png", stem.to_string_lossy()))
}

fn draw_regions(canvas: &mut RgbImage, regions: &[Region]) {
    for region in regions {
        let rect = Rect::at(region.left as i32, region.top as i32)
            .of_size(region.width(), region.height());
        draw_hollow_rect_mut(canvas, rect, REGION_COLOR);
    }
}
