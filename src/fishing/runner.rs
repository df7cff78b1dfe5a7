//! Detection runner - lifecycle and the polling loop.
//!
//! [`Detector`] owns the run lifecycle (Idle → Armed → Running → Stopped) and
//! the worker thread. The worker runs [`PollingLoop`], which per iteration:
//! snapshots the config, captures a frame, analyzes it, decides, clicks if
//! needed, and reports one status. A failed iteration is logged, reported as a
//! danger status, and followed by a longer backoff; only `stop` ends the loop.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::fishing::analyzer::analyze;
use crate::fishing::config::{ConfigSource, DetectionConfig};
use crate::fishing::controller::{decide, ClickKind, ControllerState, Decision};
use crate::fishing::region::CaptureRegion;
use crate::fishing::status::{Severity, StatusSink};

/// Longest single sleep between cancellation checks.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Maximum characters of an error message shown in the status line.
const ERROR_STATUS_LEN: usize = 40;

/// Grabs frames of a screen region.
pub trait FrameSource: Send {
    /// Returns an image whose dimensions match `region`.
    fn capture(&mut self, region: &CaptureRegion) -> Result<RgbaImage>;
}

impl<F> FrameSource for F
where
    F: FnMut(&CaptureRegion) -> Result<RgbaImage> + Send,
{
    fn capture(&mut self, region: &CaptureRegion) -> Result<RgbaImage> {
        self(region)
    }
}

/// Performs a pointer click at the current cursor position.
pub trait Clicker: Send {
    fn click(&mut self) -> Result<()>;
}

impl<F> Clicker for F
where
    F: FnMut() -> Result<()> + Send,
{
    fn click(&mut self) -> Result<()> {
        self()
    }
}

/// A captured frame did not have the size of the requested region.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("captured frame is {actual_width}x{actual_height}, expected {width}x{height}")]
pub struct FrameSizeMismatch {
    pub width: u32,
    pub height: u32,
    pub actual_width: u32,
    pub actual_height: u32,
}

/// Lifecycle errors of [`Detector`].
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("no capture region selected")]
    NoRegion,
    #[error("detection is already running")]
    AlreadyRunning,
    #[error("detection is not running")]
    NotRunning,
    #[error("failed to spawn detection thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("detection thread panicked")]
    WorkerPanicked,
}

/// Lifecycle states of a [`Detector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No region selected
    Idle,
    /// Region selected, not running
    Armed,
    Running,
    /// A run has ended; the region is kept
    Stopped,
}

impl std::fmt::Display for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorState::Idle => write!(f, "Idle"),
            DetectorState::Armed => write!(f, "Ready"),
            DetectorState::Running => write!(f, "Running"),
            DetectorState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Cooperative cancellation flag checked once per iteration.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration`, waking early if cancelled.
    ///
    /// Returns `false` if the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    pub iterations: u64,
    pub failed_iterations: u64,
    pub position_clicks: u64,
    pub recovery_clicks: u64,
}

impl SessionSummary {
    fn new() -> Self {
        Self {
            started_at: Local::now(),
            duration: Duration::ZERO,
            iterations: 0,
            failed_iterations: 0,
            position_clicks: 0,
            recovery_clicks: 0,
        }
    }

    pub fn total_clicks(&self) -> u64 {
        self.position_clicks + self.recovery_clicks
    }
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "started {}, {:.1}s, {} iterations ({} failed), {} clicks ({} position, {} recovery)",
            self.started_at.format("%H:%M:%S"),
            self.duration.as_secs_f32(),
            self.iterations,
            self.failed_iterations,
            self.total_clicks(),
            self.position_clicks,
            self.recovery_clicks
        )
    }
}

/// Formats an iteration error for the status line.
fn error_status_text(e: &anyhow::Error) -> String {
    let message = format!("{:#}", e);
    if message.chars().count() > ERROR_STATUS_LEN {
        let short: String = message.chars().take(ERROR_STATUS_LEN).collect();
        format!("Error: {}...", short)
    } else {
        format!("Error: {}", message)
    }
}

/// Runs one iteration body, converting a failure into a log entry and a
/// danger status.
///
/// Returns `None` if the body failed; the caller should then back off.
pub fn run_guarded<T>(sink: &dyn StatusSink, body: impl FnOnce() -> Result<T>) -> Option<T> {
    match body() {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Error in detection loop: {:#}", e);
            sink.update_status(&error_status_text(&e), Severity::Danger);
            None
        }
    }
}

/// The perception → decision → action loop for one run.
pub struct PollingLoop {
    region: CaptureRegion,
    frames: Box<dyn FrameSource>,
    clicker: Box<dyn Clicker>,
    sink: Arc<dyn StatusSink>,
    config: Arc<dyn ConfigSource>,
    state: ControllerState,
    summary: SessionSummary,
}

impl PollingLoop {
    pub fn new(
        region: CaptureRegion,
        frames: Box<dyn FrameSource>,
        clicker: Box<dyn Clicker>,
        sink: Arc<dyn StatusSink>,
        config: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            region,
            frames,
            clicker,
            sink,
            config,
            state: ControllerState::new(),
            summary: SessionSummary::new(),
        }
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Runs one iteration against an explicit config snapshot and time.
    pub fn iterate(&mut self, config: &DetectionConfig, now: Instant) -> Result<Decision> {
        let frame = self
            .frames
            .capture(&self.region)
            .context("Screen capture failed")?;

        let (width, height) = (self.region.width(), self.region.height());
        if frame.dimensions() != (width, height) {
            return Err(FrameSizeMismatch {
                width,
                height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            }
            .into());
        }

        let reading = analyze(&frame, config);
        let zone = reading.zone(config);
        let decision = decide(&mut self.state, &reading, zone, config, now);

        if let Some(kind) = decision.click {
            self.clicker.click().context("Click failed")?;
            match kind {
                ClickKind::Position => self.summary.position_clicks += 1,
                ClickKind::Recovery => self.summary.recovery_clicks += 1,
            }
            debug!(
                "{:?} click at x={:?} ({})",
                kind, reading.indicator_x, decision.status.text
            );
        }

        if let Some(position) = reading.relative_position() {
            self.sink.update_position(position);
        }
        self.sink
            .update_status(&decision.status.text, decision.status.severity);

        Ok(decision)
    }

    /// Loops until `token` is cancelled and returns the run's counters.
    pub fn run(mut self, token: &CancelToken) -> SessionSummary {
        let started = Instant::now();
        let sink = Arc::clone(&self.sink);
        info!("Detection started on region {}", self.region);

        while !token.is_cancelled() {
            let config = self.config.snapshot();
            self.summary.iterations += 1;

            let delay = match run_guarded(sink.as_ref(), || self.iterate(&config, Instant::now())) {
                Some(_) => config.poll_interval(),
                None => {
                    self.summary.failed_iterations += 1;
                    config.error_backoff()
                }
            };

            if !token.sleep(delay) {
                break;
            }
        }

        self.summary.duration = started.elapsed();
        info!("Detection stopped: {}", self.summary);
        self.summary
    }
}

struct Worker {
    token: CancelToken,
    handle: JoinHandle<SessionSummary>,
}

/// Owns the selected region and the detection thread.
#[derive(Default)]
pub struct Detector {
    region: Option<CaptureRegion>,
    stopped: bool,
    worker: Option<Worker>,
}

impl Detector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(&self) -> Option<CaptureRegion> {
        self.region
    }

    pub fn state(&self) -> DetectorState {
        match (&self.worker, self.region, self.stopped) {
            (Some(_), _, _) => DetectorState::Running,
            (None, None, _) => DetectorState::Idle,
            (None, Some(_), false) => DetectorState::Armed,
            (None, Some(_), true) => DetectorState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Sets the region to capture. Not allowed while running.
    pub fn select_region(&mut self, region: CaptureRegion) -> Result<(), DetectorError> {
        if self.is_running() {
            return Err(DetectorError::AlreadyRunning);
        }
        info!("Region selected: {}", region);
        self.region = Some(region);
        self.stopped = false;
        Ok(())
    }

    /// Starts the polling loop on a dedicated thread with fresh controller state.
    pub fn start(
        &mut self,
        frames: Box<dyn FrameSource>,
        clicker: Box<dyn Clicker>,
        sink: Arc<dyn StatusSink>,
        config: Arc<dyn ConfigSource>,
    ) -> Result<(), DetectorError> {
        if self.is_running() {
            return Err(DetectorError::AlreadyRunning);
        }
        let region = self.region.ok_or(DetectorError::NoRegion)?;

        let token = CancelToken::new();
        let worker_token = token.clone();
        let polling = PollingLoop::new(region, frames, clicker, sink, config);

        let handle = thread::Builder::new()
            .name("gauge-detector".to_string())
            .spawn(move || polling.run(&worker_token))?;

        self.worker = Some(Worker { token, handle });
        Ok(())
    }

    /// Requests the loop to stop and waits for the thread to finish.
    pub fn stop(&mut self) -> Result<SessionSummary, DetectorError> {
        let worker = self.worker.take().ok_or(DetectorError::NotRunning)?;
        self.stopped = true;
        worker.token.cancel();
        worker.handle.join().map_err(|_| DetectorError::WorkerPanicked)
    }
}

impl Drop for Detector {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.stop() {
                error!("Failed to stop detection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fishing::analyzer::testing::gauge_frame;
    use crate::fishing::config::SharedConfig;
    use crate::fishing::status::StatusBoard;
    use anyhow::anyhow;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        statuses: Mutex<Vec<(String, Severity)>>,
        positions: Mutex<Vec<f64>>,
    }

    impl StatusSink for RecordingSink {
        fn update_status(&self, text: &str, severity: Severity) {
            self.statuses
                .lock()
                .unwrap()
                .push((text.to_string(), severity));
        }

        fn update_position(&self, relative: f64) {
            self.positions.lock().unwrap().push(relative);
        }
    }

    fn region() -> CaptureRegion {
        CaptureRegion::new(100, 500, 480, 520).unwrap()
    }

    fn counting_clicker(count: Arc<AtomicU64>) -> Box<dyn Clicker> {
        Box::new(move || -> Result<()> {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn fast_config() -> Arc<dyn ConfigSource> {
        Arc::new(SharedConfig::new(DetectionConfig {
            poll_interval_ms: 1,
            error_backoff_ms: 2,
            ..Default::default()
        }))
    }

    fn polling_loop(
        frames: Box<dyn FrameSource>,
        clicks: Arc<AtomicU64>,
        sink: Arc<RecordingSink>,
    ) -> PollingLoop {
        PollingLoop::new(
            region(),
            frames,
            counting_clicker(clicks),
            sink,
            fast_config(),
        )
    }

    #[test]
    fn test_iteration_clicks_in_safe_zone() {
        let clicks = Arc::new(AtomicU64::new(0));
        let sink = Arc::new(RecordingSink::default());
        let frames = Box::new(|r: &CaptureRegion| -> Result<RgbaImage> {
            Ok(gauge_frame(r.width(), r.height(), Some(190)))
        });
        let mut polling = polling_loop(frames, clicks.clone(), sink.clone());

        let decision = polling
            .iterate(&DetectionConfig::default(), Instant::now())
            .unwrap();

        assert_eq!(decision.click, Some(ClickKind::Position));
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert_eq!(*sink.positions.lock().unwrap(), vec![0.5]);
        assert_eq!(
            *sink.statuses.lock().unwrap(),
            vec![("SAFE - Clicking!".to_string(), Severity::Success)]
        );
        assert_eq!(polling.summary().position_clicks, 1);
    }

    #[test]
    fn test_iteration_holds_in_right_zone() {
        let clicks = Arc::new(AtomicU64::new(0));
        let sink = Arc::new(RecordingSink::default());
        let frames = Box::new(|r: &CaptureRegion| -> Result<RgbaImage> {
            Ok(gauge_frame(r.width(), r.height(), Some(330)))
        });
        let mut polling = polling_loop(frames, clicks.clone(), sink.clone());

        let decision = polling
            .iterate(&DetectionConfig::default(), Instant::now())
            .unwrap();

        assert_eq!(decision.click, None);
        assert_eq!(clicks.load(Ordering::SeqCst), 0);
        assert_eq!(sink.statuses.lock().unwrap()[0].1, Severity::Danger);
    }

    #[test]
    fn test_iteration_uses_given_config() {
        let clicks = Arc::new(AtomicU64::new(0));
        let sink = Arc::new(RecordingSink::default());
        let frames = Box::new(|r: &CaptureRegion| -> Result<RgbaImage> {
            Ok(gauge_frame(r.width(), r.height(), Some(190)))
        });
        let mut polling = polling_loop(frames, clicks.clone(), sink.clone());

        // Only pure white passes, and the zone colors vanish with a zero threshold
        let colorless = DetectionConfig {
            line_threshold: 255,
            color_threshold: 0,
            ..Default::default()
        };
        let decision = polling.iterate(&colorless, Instant::now()).unwrap();
        assert_eq!(decision.status.text, "Incomplete gauge - Clicking every 4s");
        assert_eq!(*sink.positions.lock().unwrap(), vec![0.5]);

        let blind = DetectionConfig {
            line_threshold: 255,
            ..Default::default()
        };
        let frames = Box::new(|r: &CaptureRegion| -> Result<RgbaImage> {
            Ok(gauge_frame(r.width(), r.height(), None))
        });
        let mut polling = polling_loop(frames, clicks.clone(), sink.clone());
        sink.positions.lock().unwrap().clear();
        let decision = polling.iterate(&blind, Instant::now()).unwrap();
        assert_eq!(decision.status.text, "No gauge");
        assert!(sink.positions.lock().unwrap().is_empty());
    }

    #[test]
    fn test_frame_size_mismatch_is_an_error() {
        let clicks = Arc::new(AtomicU64::new(0));
        let sink = Arc::new(RecordingSink::default());
        let frames = Box::new(|_: &CaptureRegion| -> Result<RgbaImage> {
            Ok(gauge_frame(10, 10, Some(5)))
        });
        let mut polling = polling_loop(frames, clicks.clone(), sink.clone());

        let err = polling
            .iterate(&DetectionConfig::default(), Instant::now())
            .unwrap_err();
        assert!(err.downcast_ref::<FrameSizeMismatch>().is_some());
        assert!(sink.statuses.lock().unwrap().is_empty());
    }

    #[test]
    fn test_guarded_reports_error_status() {
        let sink = RecordingSink::default();

        let value = run_guarded(&sink, || Ok(7));
        assert_eq!(value, Some(7));
        assert!(sink.statuses.lock().unwrap().is_empty());

        let value: Option<()> = run_guarded(&sink, || {
            Err(anyhow!("capture device lost while grabbing the gauge region"))
        });
        assert_eq!(value, None);

        let statuses = sink.statuses.lock().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].1, Severity::Danger);
        assert_eq!(
            statuses[0].0,
            "Error: capture device lost while grabbing the g..."
        );
    }

    #[test]
    fn test_cancel_token_sleep() {
        let token = CancelToken::new();
        assert!(token.sleep(Duration::from_millis(1)));

        token.cancel();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_loop_survives_failed_iterations() {
        let clicks = Arc::new(AtomicU64::new(0));
        let sink = Arc::new(RecordingSink::default());
        let mut calls = 0u32;
        let frames = Box::new(move |r: &CaptureRegion| -> Result<RgbaImage> {
            calls += 1;
            if calls % 2 == 0 {
                Err(anyhow!("capture failed"))
            } else {
                Ok(gauge_frame(r.width(), r.height(), Some(190)))
            }
        });
        let polling = polling_loop(frames, clicks.clone(), sink.clone());

        let token = CancelToken::new();
        let worker_token = token.clone();
        let handle = thread::spawn(move || polling.run(&worker_token));
        thread::sleep(Duration::from_millis(100));
        token.cancel();
        let summary = handle.join().unwrap();

        assert!(summary.iterations >= 4, "{}", summary);
        assert!(summary.failed_iterations >= 1);
        assert!(summary.iterations > summary.failed_iterations);
        assert_eq!(summary.position_clicks, clicks.load(Ordering::SeqCst));

        let statuses = sink.statuses.lock().unwrap();
        assert!(statuses.iter().any(|(_, s)| *s == Severity::Danger));
        assert!(statuses.iter().any(|(_, s)| *s == Severity::Success));
    }

    #[test]
    fn test_loop_snapshots_config_every_iteration() {
        struct CountingConfig(AtomicU64);

        impl ConfigSource for CountingConfig {
            fn snapshot(&self) -> DetectionConfig {
                self.0.fetch_add(1, Ordering::SeqCst);
                DetectionConfig {
                    poll_interval_ms: 1,
                    ..Default::default()
                }
            }
        }

        let config = Arc::new(CountingConfig(AtomicU64::new(0)));
        let frames = Box::new(|r: &CaptureRegion| -> Result<RgbaImage> {
            Ok(gauge_frame(r.width(), r.height(), None))
        });
        let polling = PollingLoop::new(
            region(),
            frames,
            counting_clicker(Arc::new(AtomicU64::new(0))),
            Arc::new(StatusBoard::new()),
            config.clone(),
        );

        let token = CancelToken::new();
        let worker_token = token.clone();
        let handle = thread::spawn(move || polling.run(&worker_token));
        thread::sleep(Duration::from_millis(50));
        token.cancel();
        let summary = handle.join().unwrap();

        assert_eq!(config.0.load(Ordering::SeqCst), summary.iterations);
    }

    #[test]
    fn test_detector_lifecycle() {
        let mut detector = Detector::new();
        assert_eq!(detector.state(), DetectorState::Idle);

        let frames = || -> Box<dyn FrameSource> {
            Box::new(|r: &CaptureRegion| -> Result<RgbaImage> {
                Ok(gauge_frame(r.width(), r.height(), Some(190)))
            })
        };
        let clicks = Arc::new(AtomicU64::new(0));
        let board = Arc::new(StatusBoard::new());

        let err = detector
            .start(frames(), counting_clicker(clicks.clone()), board.clone(), fast_config())
            .unwrap_err();
        assert!(matches!(err, DetectorError::NoRegion));
        assert!(matches!(detector.stop(), Err(DetectorError::NotRunning)));

        detector.select_region(region()).unwrap();
        assert_eq!(detector.state(), DetectorState::Armed);

        detector
            .start(frames(), counting_clicker(clicks.clone()), board.clone(), fast_config())
            .unwrap();
        assert_eq!(detector.state(), DetectorState::Running);
        assert!(matches!(
            detector.start(frames(), counting_clicker(clicks.clone()), board.clone(), fast_config()),
            Err(DetectorError::AlreadyRunning)
        ));
        assert!(matches!(
            detector.select_region(region()),
            Err(DetectorError::AlreadyRunning)
        ));

        thread::sleep(Duration::from_millis(50));
        let summary = detector.stop().unwrap();
        assert_eq!(detector.state(), DetectorState::Stopped);
        assert!(summary.iterations > 0);
        assert!(summary.position_clicks > 0);
        assert!(board.snapshot().status.text.starts_with("SAFE"));

        // A stopped detector can run again with the same region
        detector
            .start(frames(), counting_clicker(clicks), board, fast_config())
            .unwrap();
        assert!(detector.is_running());
        detector.stop().unwrap();

        detector.select_region(region()).unwrap();
        assert_eq!(detector.state(), DetectorState::Armed);
    }
}
