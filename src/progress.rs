//! Progress reporting and cancellation support.
//!
//! A [`LoopSyncJob`](crate::LoopSyncJob) reports each stage transition to a
//! [`ProgressCallback`], and downloads report byte counts the same way.
//! [`CancellationToken`] lets another thread abandon a job; the pipeline
//! checks it between stages, never in the middle of an external process.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use loopsync::{JobOptions, JobProgress, ProgressCallback};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, progress: &JobProgress) {
//!         if let Some(message) = &progress.message {
//!             println!("[{:?}] {message}", progress.stage);
//!         }
//!     }
//! }
//!
//! let options = JobOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The step a job is currently performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum JobStage {
    /// Streaming a remote file to disk.
    Download,
    /// Measuring the input durations.
    Probe,
    /// Building the 2-copy calibration loop.
    Calibrate,
    /// Concatenating the final loop.
    BuildLoop,
    /// Trimming and muxing against the audio.
    Reconcile,
    /// Writing descriptive tags.
    Tag,
    /// Copying the result to its destination.
    Deliver,
}

/// A snapshot of job progress.
#[derive(Debug, Clone)]
pub struct JobProgress {
    /// What kind of work is being performed.
    pub stage: JobStage,
    /// Units completed so far (stages for a job, bytes for a download).
    pub current: u64,
    /// Total units expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since tracking started.
    pub elapsed: Duration,
    /// Human-readable status line for this update.
    pub message: Option<String>,
}

/// Trait for receiving progress updates.
///
/// Callbacks observe but cannot halt the job. Use [`CancellationToken`] for
/// that.
pub trait ProgressCallback: Send + Sync {
    /// Called on every stage transition and download chunk.
    fn on_progress(&self, progress: &JobProgress);
}

/// Discards all progress notifications. Used when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _progress: &JobProgress) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// # Example
///
/// ```
/// use loopsync::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks elapsed time and unit counts, and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    stage: JobStage,
    total: Option<u64>,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        stage: JobStage,
        total: Option<u64>,
    ) -> Self {
        Self {
            callback,
            stage,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Move to `stage`, counting it as one completed unit.
    pub(crate) fn enter(&mut self, stage: JobStage, message: impl Into<String>) {
        self.stage = stage;
        self.current += 1;
        self.report(Some(message.into()));
    }

    /// Record `units` more completed units (bytes, for downloads).
    #[cfg_attr(not(feature = "fetch"), allow(dead_code))]
    pub(crate) fn advance_by(&mut self, units: u64) {
        self.current += units;
        self.report(None);
    }

    /// Unconditionally emit a final report.
    pub(crate) fn finish(&mut self, message: impl Into<String>) {
        self.report(Some(message.into()));
    }

    fn report(&self, message: Option<String>) {
        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| (self.current.min(total) as f32 / total as f32) * 100.0);

        let progress = JobProgress {
            stage: self.stage,
            current: self.current,
            total: self.total,
            percentage,
            elapsed: self.start_time.elapsed(),
            message,
        };

        self.callback.on_progress(&progress);
    }
}
