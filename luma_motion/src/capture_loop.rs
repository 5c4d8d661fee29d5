// THEORY:
// `capture_loop` is the host-side adapter for cameras that deliver frames from an
// asynchronous callback. The detector itself is synchronous and must never see two
// frames at once; this module enforces that without queueing.
//
// Key architectural principles:
// 1.  **Single Owner**: a spawned worker task owns the `MotionDetector`. Frames and
//     reset commands reach it over one ordered channel.
// 2.  **Drop, Don't Buffer**: a one-permit semaphore marks a frame as in flight.
//     `submit` while the permit is taken drops the new frame on the spot and says
//     so; overrun frames are never buffered. The permit is released as soon as
//     `detect` returns.
// 3.  **Results As Messages**: each report is published on a `watch` channel. An
//     overlay subscribes and redraws from the latest value instead of sharing a
//     mutable canvas with the detector.
// 4.  **Fatal Stops The Loop**: a fatal detector error closes the semaphore, ends the
//     worker and is handed back from `shutdown`.

use crate::core_modules::luma_frame::LumaFrame;
use crate::error::{DetectError, DetectResult};
use crate::perf_stats::PerfStats;
use crate::pipeline::{DetectionReport, MotionDetector};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Handed to the worker.
    Accepted,
    /// A frame was still in flight; this one was discarded.
    Dropped,
    /// The worker has stopped.
    Closed,
}

enum Command {
    Frame(LumaFrame, OwnedSemaphorePermit),
    Reset,
}

/// A detector running on its own tokio task.
pub struct CaptureLoop {
    commands: mpsc::UnboundedSender<Command>,
    in_flight: Arc<Semaphore>,
    reports: watch::Receiver<Option<DetectionReport>>,
    dropped: Arc<AtomicU64>,
    worker: JoinHandle<DetectResult<PerfStats>>,
}

impl CaptureLoop {
    /// Spawns the worker. Must be called from within a tokio runtime.
    pub fn spawn(detector: MotionDetector) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (report_tx, reports) = watch::channel(None);
        let in_flight = Arc::new(Semaphore::new(1));

        let worker = tokio::spawn(Self::run(detector, command_rx, report_tx, in_flight.clone()));

        Self {
            commands,
            in_flight,
            reports,
            dropped: Arc::new(AtomicU64::new(0)),
            worker,
        }
    }

    async fn run(
        mut detector: MotionDetector,
        mut commands: mpsc::UnboundedReceiver<Command>,
        reports: watch::Sender<Option<DetectionReport>>,
        in_flight: Arc<Semaphore>,
    ) -> DetectResult<PerfStats> {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Frame(frame, permit) => {
                    let result = detector.detect_report(frame);
                    release_slot(permit, &in_flight, result.is_err());
                    match result {
                        Ok(report) => {
                            // No subscribers is fine; the latest value is kept.
                            reports.send_replace(Some(report));
                        }
                        Err(err) => {
                            error!(%err, "capture loop stopping");
                            return Err(err);
                        }
                    }
                }
                Command::Reset => detector.reset(),
            }
        }
        debug!(frames = detector.stats().frames(), "capture loop drained");
        Ok(detector.stats().clone())
    }

    /// Offers a frame to the detector without waiting.
    pub fn submit(&self, frame: LumaFrame) -> Submission {
        match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => match self.commands.send(Command::Frame(frame, permit)) {
                Ok(()) => Submission::Accepted,
                Err(_) => Submission::Closed,
            },
            Err(TryAcquireError::NoPermits) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Submission::Dropped
            }
            Err(TryAcquireError::Closed) => Submission::Closed,
        }
    }

    /// Queues a reset behind any frame already handed over. Returns `false`
    /// when the worker has stopped.
    pub fn reset(&self) -> bool {
        self.commands.send(Command::Reset).is_ok()
    }

    /// A receiver that always holds the latest report.
    pub fn subscribe(&self) -> watch::Receiver<Option<DetectionReport>> {
        self.reports.clone()
    }

    /// Frames discarded because the previous one was still being processed.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stops accepting frames, lets the worker finish what it holds and
    /// returns its final statistics.
    pub async fn shutdown(self) -> DetectResult<PerfStats> {
        let Self {
            commands, worker, ..
        } = self;
        drop(commands);
        worker
            .await
            .map_err(|err| DetectError::WorkerStopped(err.to_string()))?
    }
}

/// Frees the in-flight slot. After a fatal error the semaphore is closed before
/// the permit goes back.
fn release_slot(permit: OwnedSemaphorePermit, in_flight: &Semaphore, fatal: bool) {
    if fatal {
        in_flight.close();
    }
    drop(permit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::pipeline::FrameOutcome;

    fn moving_frame() -> LumaFrame {
        let mut frame = LumaFrame::filled(64, 64, 100);
        let luma = frame.luma_mut();
        for y in 10..30 {
            for x in 10..30 {
                luma[y * 64 + x] = 200;
            }
        }
        frame
    }

    fn detector() -> MotionDetector {
        MotionDetector::new(DetectorConfig {
            min_motion_area: 16,
            ..DetectorConfig::default()
        })
        .unwrap()
    }

    async fn next_report(rx: &mut watch::Receiver<Option<DetectionReport>>) -> DetectionReport {
        rx.changed().await.unwrap();
        rx.borrow_and_update().clone().unwrap()
    }

    #[tokio::test]
    async fn reports_are_published_in_order() {
        let capture = CaptureLoop::spawn(detector());
        let mut rx = capture.subscribe();

        assert_eq!(capture.submit(LumaFrame::filled(64, 64, 100)), Submission::Accepted);
        let first = next_report(&mut rx).await;
        assert_eq!(first.outcome, FrameOutcome::Primed);

        assert_eq!(capture.submit(moving_frame()), Submission::Accepted);
        let second = next_report(&mut rx).await;
        assert_eq!(second.frame_index, 2);
        assert_eq!(second.regions.len(), 1);

        let stats = capture.shutdown().await.unwrap();
        assert_eq!(stats.frames(), 2);
    }

    #[tokio::test]
    async fn frames_submitted_while_busy_are_dropped() {
        let capture = CaptureLoop::spawn(detector());
        let mut rx = capture.subscribe();

        // The worker cannot run until this task yields, so the first frame is
        // still in flight for the next two submissions.
        assert_eq!(capture.submit(LumaFrame::filled(64, 64, 100)), Submission::Accepted);
        assert_eq!(capture.submit(moving_frame()), Submission::Dropped);
        assert_eq!(capture.submit(moving_frame()), Submission::Dropped);
        assert_eq!(capture.dropped_frames(), 2);

        next_report(&mut rx).await;
        assert_eq!(capture.submit(moving_frame()), Submission::Accepted);
        let report = next_report(&mut rx).await;
        assert_eq!(report.frame_index, 2);

        capture.shutdown().await.unwrap();
    }

    #[test]
    fn fatal_release_never_reopens_the_slot() {
        let in_flight = Arc::new(Semaphore::new(1));
        let permit = in_flight.clone().try_acquire_owned().unwrap();
        release_slot(permit, &in_flight, true);
        assert!(matches!(
            in_flight.clone().try_acquire_owned(),
            Err(TryAcquireError::Closed)
        ));

        let in_flight = Arc::new(Semaphore::new(1));
        let permit = in_flight.clone().try_acquire_owned().unwrap();
        release_slot(permit, &in_flight, false);
        assert!(in_flight.clone().try_acquire_owned().is_ok());
    }

    #[tokio::test]
    async fn submissions_after_close_are_refused() {
        let capture = CaptureLoop::spawn(detector());
        capture.in_flight.close();
        assert_eq!(capture.submit(LumaFrame::filled(64, 64, 100)), Submission::Closed);
        assert_eq!(capture.dropped_frames(), 0);
        capture.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn reset_is_ordered_with_frames() {
        let capture = CaptureLoop::spawn(detector());
        let mut rx = capture.subscribe();

        capture.submit(LumaFrame::filled(64, 64, 100));
        next_report(&mut rx).await;

        assert!(capture.reset());
        capture.submit(moving_frame());
        let report = next_report(&mut rx).await;
        assert_eq!(report.outcome, FrameOutcome::Primed);
        assert!(report.regions.is_empty());

        capture.shutdown().await.unwrap();
    }
}
