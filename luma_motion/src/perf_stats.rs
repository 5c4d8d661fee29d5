//! Frame-rate and latency bookkeeping for the detector.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const LATENCY_HISTORY_LENGTH: usize = 120;
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Rolling performance counters, updated once per `detect` call.
#[derive(Debug, Clone)]
pub struct PerfStats {
    frames: u64,
    frames_with_motion: u64,
    latencies: VecDeque<Duration>,
    window_start: Option<Instant>,
    window_frames: u32,
    fps: f32,
}

impl Default for PerfStats {
    fn default() -> Self {
        Self {
            frames: 0,
            frames_with_motion: 0,
            latencies: VecDeque::with_capacity(LATENCY_HISTORY_LENGTH),
            window_start: None,
            window_frames: 0,
            fps: 0.0,
        }
    }
}

impl PerfStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one processed frame. Returns the new FPS figure when a
    /// one-second window just closed.
    pub fn record(&mut self, now: Instant, latency: Duration, had_motion: bool) -> Option<f32> {
        self.frames += 1;
        if had_motion {
            self.frames_with_motion += 1;
        }

        self.latencies.push_back(latency);
        if self.latencies.len() > LATENCY_HISTORY_LENGTH {
            self.latencies.pop_front();
        }

        let start = *self.window_start.get_or_insert(now);
        self.window_frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed >= FPS_WINDOW {
            self.fps = self.window_frames as f32 / elapsed.as_secs_f32();
            self.window_frames = 0;
            self.window_start = Some(now);
            Some(self.fps)
        } else {
            None
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn frames_with_motion(&self) -> u64 {
        self.frames_with_motion
    }

    /// Frames per second over the last completed one-second window.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn last_latency(&self) -> Option<Duration> {
        self.latencies.back().copied()
    }

    pub fn average_latency(&self) -> Duration {
        if self.latencies.is_empty() {
            return Duration::ZERO;
        }
        self.latencies.iter().sum::<Duration>() / self.latencies.len() as u32
    }

    pub fn max_latency(&self) -> Duration {
        self.latencies.iter().copied().max().unwrap_or_default()
    }
}
