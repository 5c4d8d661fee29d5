// THEORY:
// The `pipeline` module is the top-level API of the detection core. It wires the
// stages together per frame and owns everything that has to survive between
// frames: the previous luma frame and the reusable working buffers.
//
// Key architectural principles:
// 1.  **Two States**: `Idle` holds no frame, `Armed` holds exactly one. The first
//     frame after construction or `reset()` can only be stored, never compared.
// 2.  **Fixed Stage Order**: mask -> early-out -> opening -> components -> regions.
// 3.  **Self-Recovering**: geometry mismatches and empty frames are absorbed into an
//     empty result, and the incoming frame still replaces the previous one, so the
//     next call compares like with like again. Only buffer exhaustion escapes.
// 4.  **Allocation-Free Steady State**: masks, the visited grid, the fill stack and
//     the component arena are owned here and only resized when the grid changes.

use crate::config::DetectorConfig;
use crate::core_modules::connected_components::ComponentLabeler;
use crate::core_modules::luma_frame::{FrameBuffer, LumaFrame};
use crate::core_modules::morphology::morphology;
use crate::core_modules::motion_mask::{MotionMask, MotionMaskBuilder};
use crate::core_modules::region::{Region, RegionExtractor};
use crate::error::{DetectError, DetectResult};
use crate::perf_stats::PerfStats;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Whether the detector currently holds a previous frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Armed,
}

/// How a single `detect` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameOutcome {
    /// First frame after construction or reset; stored for the next call.
    #[default]
    Primed,
    /// Too few moving cells; later stages were skipped.
    Still,
    /// All stages ran. The region list may still be empty.
    Analyzed,
    /// Byte length differed from the previous frame, or the declared
    /// dimensions did not fit the buffer.
    GeometryMismatch,
    /// The current or previous frame had no bytes.
    EmptyInput,
}

/// The result of one frame, with enough detail to explain an empty answer.
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    /// 1-based index of the frame since the detector was built.
    pub frame_index: u64,
    pub width: u32,
    pub height: u32,
    pub regions: Vec<Region>,
    pub outcome: FrameOutcome,
    /// Downsample factor used for this frame, 0 when no comparison ran.
    pub scale: u32,
    /// Mask cells over threshold before the opening.
    pub motion_pixels: usize,
    /// Components that survived the labeler's noise floor.
    pub components: usize,
    pub latency: Duration,
}

impl DetectionReport {
    pub fn has_motion(&self) -> bool {
        !self.regions.is_empty()
    }
}

/// The motion detector. Feed it consecutive frames from one camera.
pub struct MotionDetector {
    config: DetectorConfig,
    mask_builder: MotionMaskBuilder,
    labeler: ComponentLabeler,
    extractor: RegionExtractor,
    frame_buffer: FrameBuffer,
    mask: MotionMask,
    eroded: MotionMask,
    opened: MotionMask,
    stats: PerfStats,
    frame_index: u64,
}

impl MotionDetector {
    pub fn new(config: DetectorConfig) -> DetectResult<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: DetectorConfig) -> Self {
        Self {
            mask_builder: MotionMaskBuilder::new(config.motion_threshold, config.scale_rule()),
            labeler: ComponentLabeler::new(config.min_component_cells),
            extractor: RegionExtractor::new(config.min_motion_area, config.max_objects),
            frame_buffer: FrameBuffer::new(),
            mask: MotionMask::default(),
            eroded: MotionMask::default(),
            opened: MotionMask::default(),
            stats: PerfStats::new(),
            frame_index: 0,
            config,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn stats(&self) -> &PerfStats {
        &self.stats
    }

    pub fn state(&self) -> DetectorState {
        if self.frame_buffer.is_empty() {
            DetectorState::Idle
        } else {
            DetectorState::Armed
        }
    }

    /// Back to `Idle`. Call this whenever the frame geometry changes on purpose
    /// (camera switch, resolution change). Working buffers are released and
    /// rebuilt for the next geometry.
    pub fn reset(&mut self) {
        self.frame_buffer.clear();
        self.mask = MotionMask::default();
        self.eroded = MotionMask::default();
        self.opened = MotionMask::default();
        debug!(frame_index = self.frame_index, "detector reset");
    }

    /// Processes one frame and returns at most `max_objects` regions.
    pub fn detect(&mut self, frame: LumaFrame) -> DetectResult<Vec<Region>> {
        Ok(self.detect_report(frame)?.regions)
    }

    /// Like [`detect`](Self::detect), with per-stage diagnostics.
    pub fn detect_report(&mut self, frame: LumaFrame) -> DetectResult<DetectionReport> {
        let started = Instant::now();
        self.frame_index += 1;

        let mut report = DetectionReport {
            frame_index: self.frame_index,
            width: frame.width,
            height: frame.height,
            ..DetectionReport::default()
        };

        let previous = self.frame_buffer.take();
        let outcome = match &previous {
            None => Ok(FrameOutcome::Primed),
            Some(prev) => self.analyze(prev, &frame, &mut report),
        };
        // The incoming frame becomes the reference whatever happened above.
        self.frame_buffer.swap(frame);
        drop(previous);

        report.outcome = outcome?;
        report.latency = started.elapsed();

        debug!(
            frame_index = report.frame_index,
            outcome = ?report.outcome,
            regions = report.regions.len(),
            elapsed_ms = report.latency.as_secs_f64() * 1000.0,
            "frame processed"
        );

        if let Some(fps) = self.stats.record(Instant::now(), report.latency, report.has_motion()) {
            info!(
                fps,
                avg_latency_ms = self.stats.average_latency().as_secs_f64() * 1000.0,
                "detector throughput"
            );
        }

        Ok(report)
    }

    fn analyze(
        &mut self,
        prev: &LumaFrame,
        curr: &LumaFrame,
        report: &mut DetectionReport,
    ) -> DetectResult<FrameOutcome> {
        // Stage 1: Downsampled Differencing
        let summary = match self.mask_builder.build_into(prev, curr, &mut self.mask) {
            Ok(summary) => summary,
            Err(DetectError::GeometryMismatch { previous, current }) => {
                warn!(previous, current, "frame size mismatch, reporting no motion");
                return Ok(FrameOutcome::GeometryMismatch);
            }
            Err(DetectError::MalformedFrame {
                width,
                height,
                bytes,
            }) => {
                warn!(
                    width,
                    height,
                    bytes,
                    "frame smaller than its dimensions, reporting no motion"
                );
                return Ok(FrameOutcome::GeometryMismatch);
            }
            Err(DetectError::EmptyInput) => {
                debug!("empty frame, reporting no motion");
                return Ok(FrameOutcome::EmptyInput);
            }
            Err(err) => return Err(err),
        };
        report.scale = summary.scale;
        report.motion_pixels = summary.motion_pixels;

        debug!(
            grid_width = summary.grid_width,
            grid_height = summary.grid_height,
            scale = summary.scale,
            motion_pixels = summary.motion_pixels,
            threshold = self.mask_builder.threshold(),
            "motion mask built"
        );

        // Stage 1.5: Early-Out
        if summary.motion_pixels < self.config.min_motion_pixels {
            return Ok(FrameOutcome::Still);
        }

        // Stage 2: Noise Suppression
        morphology::open_into(&self.mask, &mut self.eroded, &mut self.opened)?;

        // Stage 3: Spatial Grouping
        let components = self.labeler.label(&self.opened)?;
        report.components = components.len();

        // Stage 4: Region Extraction
        self.extractor.extract_into(
            components,
            summary.scale,
            curr.width,
            curr.height,
            &mut report.regions,
        );

        Ok(FrameOutcome::Analyzed)
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::from_valid_config(DetectorConfig::default())
    }
}
