// THEORY:
// This file is the main entry point for the `luma_motion` library crate.
// It exposes the `MotionDetector` and its data structures (`LumaFrame`, `Region`,
// `DetectorConfig`, ...) as the public surface consumed by camera glue code.
//
// The detection stages themselves live in `core_modules`, leaf-first:
// frame buffer -> motion mask -> morphology -> connected components -> regions.
// The `pipeline` module wires those stages per frame, and `capture_loop` is the
// optional async adapter for hosts that receive frames from a capture callback.

pub mod capture_loop;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod perf_stats;
pub mod pipeline;

pub use capture_loop::{CaptureLoop, Submission};
pub use config::DetectorConfig;
pub use core_modules::luma_frame::LumaFrame;
pub use core_modules::region::{DisplayRect, Region};
pub use error::{DetectError, DetectResult};
pub use pipeline::{DetectionReport, DetectorState, MotionDetector};
