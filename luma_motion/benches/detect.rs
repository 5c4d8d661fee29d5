//! Detector Benchmarks
//!
//! Per-frame cost of the full detection pipeline on synthetic luma frames.
//!
//! # Running Benchmarks
//! ```bash
//! cargo bench --package luma_motion --bench detect
//! ```
//!
//! # Metrics Measured
//! - Latency of a still frame (early-out path)
//! - Latency of a frame with moving blocks (all stages)

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use luma_motion::core_modules::motion_mask::{MotionMask, MotionMaskBuilder};
use luma_motion::{DetectorConfig, LumaFrame, MotionDetector};
use std::time::Duration;

const RESOLUTIONS: [(u32, u32); 3] = [(640, 480), (1280, 720), (1920, 1080)];

/// A textured frame with a few bright squares whose position depends on `phase`.
fn create_test_frame(width: u32, height: u32, phase: usize) -> LumaFrame {
    let mut frame = LumaFrame::filled(width, height, 0);
    let w = width as usize;
    let h = height as usize;
    let luma = frame.luma_mut();
    for y in 0..h {
        for x in 0..w {
            luma[y * w + x] = ((x * 7 + y * 11) % 64) as u8;
        }
    }

    let size = w / 12;
    for block in 0..4 {
        let x0 = (block * w / 4 + phase * size / 2) % (w - size);
        let y0 = (block * h / 5 + size) % (h - size);
        for y in y0..y0 + size {
            luma[y * w + x0..y * w + x0 + size].fill(220);
        }
    }
    frame
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(5));

    for (width, height) in RESOLUTIONS {
        let frames = [create_test_frame(width, height, 0), create_test_frame(width, height, 1)];
        group.throughput(Throughput::Elements(1));

        let mut detector = MotionDetector::new(DetectorConfig::default()).unwrap();
        detector.detect(frames[0].clone()).unwrap();
        group.bench_with_input(
            BenchmarkId::new("still", format!("{}x{}", width, height)),
            &frames[0],
            |b, frame| {
                b.iter_batched(
                    || frame.clone(),
                    |frame| black_box(detector.detect(frame).unwrap()),
                    BatchSize::LargeInput,
                )
            },
        );

        let mut detector = MotionDetector::new(DetectorConfig::default()).unwrap();
        detector.detect(frames[0].clone()).unwrap();
        let mut turn = 1;
        group.bench_with_input(
            BenchmarkId::new("moving", format!("{}x{}", width, height)),
            &frames,
            |b, frames| {
                b.iter_batched(
                    || {
                        let frame = frames[turn].clone();
                        turn ^= 1;
                        frame
                    },
                    |frame| black_box(detector.detect(frame).unwrap()),
                    BatchSize::LargeInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_mask(c: &mut Criterion) {
    let mut group = c.benchmark_group("motion_mask");
    let config = DetectorConfig::default();
    let builder = MotionMaskBuilder::new(config.motion_threshold, config.scale_rule());

    for (width, height) in RESOLUTIONS {
        let prev = create_test_frame(width, height, 0);
        let curr = create_test_frame(width, height, 1);
        let mut mask = MotionMask::default();

        group.throughput(Throughput::Elements(1));
        let id = BenchmarkId::new("build_into", format!("{}x{}", width, height));
        group.bench_function(id, |b| {
            b.iter(|| {
                let summary = builder.build_into(black_box(&prev), black_box(&curr), &mut mask);
                black_box(summary.unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_detect, bench_mask);
criterion_main!(benches);
