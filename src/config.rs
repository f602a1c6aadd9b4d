//! Tool and job configuration.
//!
//! [`ToolPaths`] names the external programs a [`VideoLooper`](crate::VideoLooper)
//! invokes. [`JobOptions`] is a builder that threads the sync policy, loop
//! detection, tags, progress callbacks, and cancellation through a
//! [`LoopSyncJob`](crate::LoopSyncJob) without growing its signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use loopsync::{CancellationToken, JobOptions, JobProgress, ProgressCallback, SyncPolicy};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, progress: &JobProgress) {
//!         println!("{:?}", progress.stage);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = JobOptions::new()
//!     .with_policy(SyncPolicy::precision())
//!     .with_loop_detection(true)
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::sync::Arc;

use crate::ffmpeg::FfmpegLogLevel;
use crate::metadata::MediaTags;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::sync::SyncPolicy;

/// Locations of the external FFmpeg tools and the verbosity they run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// The `ffmpeg` executable. Defaults to `ffmpeg` on `PATH`.
    pub ffmpeg: PathBuf,
    /// The `ffprobe` executable. Defaults to `ffprobe` on `PATH`.
    pub ffprobe: PathBuf,
    /// Value passed as `-loglevel` to every spawned tool.
    pub log_level: FfmpegLogLevel,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            log_level: FfmpegLogLevel::Error,
        }
    }
}

impl ToolPaths {
    /// Use a specific `ffmpeg` binary.
    #[must_use]
    pub fn with_ffmpeg(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg = path.into();
        self
    }

    /// Use a specific `ffprobe` binary.
    #[must_use]
    pub fn with_ffprobe(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe = path.into();
        self
    }

    /// Set the `-loglevel` passed to spawned tools.
    #[must_use]
    pub fn with_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.log_level = level;
        self
    }
}

/// Per-job settings.
///
/// A default-constructed value uses the precision sync policy, enables loop
/// detection, deletes the work directory when the job ends, and writes no
/// tags.
#[derive(Clone)]
pub struct JobOptions {
    pub(crate) policy: SyncPolicy,
    pub(crate) loop_detection: bool,
    pub(crate) keep_temp: bool,
    pub(crate) tags: Option<MediaTags>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for JobOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("JobOptions")
            .field("policy", &self.policy)
            .field("loop_detection", &self.loop_detection)
            .field("keep_temp", &self.keep_temp)
            .field("has_tags", &self.tags.is_some())
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl JobOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            policy: SyncPolicy::precision(),
            loop_detection: true,
            keep_temp: false,
            tags: None,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Choose how the looped video is trimmed against the audio.
    #[must_use]
    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable the ±3 repeat-count search. Defaults to `true`.
    #[must_use]
    pub fn with_loop_detection(mut self, enabled: bool) -> Self {
        self.loop_detection = enabled;
        self
    }

    /// Keep the job's work directory instead of deleting it.
    #[must_use]
    pub fn with_keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    /// Write these tags into the finished file.
    #[must_use]
    pub fn with_tags(mut self, tags: MediaTags) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Attach a progress callback, invoked once per stage transition.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token, checked before each stage starts.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The configured sync policy.
    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Whether the repeat-count search is enabled.
    pub fn loop_detection(&self) -> bool {
        self.loop_detection
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
