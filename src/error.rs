//! Error types for the `loopsync` crate.
//!
//! This module defines [`LoopSyncError`], the unified error type returned by
//! every fallible operation in the crate, and [`Stage`], which names the
//! external tool invocation a [`LoopSyncError::StageFailed`] came from.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::{io::Error as IoError, path::PathBuf};

use thiserror::Error;

/// The external tool invocation a job was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Reading a media file's duration.
    Probe,
    /// Building the disposable 2-copy calibration loop.
    Calibration,
    /// Building the final looped video.
    LoopBuild,
    /// Muxing and trimming the looped video against the audio.
    Reconcile,
    /// Writing descriptive tags into the finished file.
    Metadata,
    /// Checking that a tool is installed.
    ToolCheck,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Stage::Probe => "probe",
            Stage::Calibration => "calibration",
            Stage::LoopBuild => "loop build",
            Stage::Reconcile => "reconcile",
            Stage::Metadata => "metadata",
            Stage::ToolCheck => "tool check",
        };
        f.write_str(name)
    }
}

/// The unified error type for all `loopsync` operations.
///
/// A zero duration ([`ZeroDuration`](LoopSyncError::ZeroDuration)) and a
/// failed external process ([`StageFailed`](LoopSyncError::StageFailed)) are
/// kept apart so callers can tell "the file could not be measured" from
/// "ffmpeg rejected the job".
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoopSyncError {
    /// The duration of a media file could not be determined.
    #[error("Could not determine the duration of {path}")]
    ZeroDuration {
        /// File whose probe returned zero.
        path: PathBuf,
    },

    /// An external tool exited unsuccessfully.
    #[error("{stage} failed ({status}){}", detail_suffix(.detail))]
    StageFailed {
        /// Which stage was running.
        stage: Stage,
        /// Exit status as reported by the OS.
        status: String,
        /// Last non-empty line the tool wrote to stderr, if any.
        detail: Option<String>,
    },

    /// An external tool could not be started at all.
    #[error("Failed to start {program}: {reason}")]
    ToolSpawn {
        /// Program that was invoked.
        program: String,
        /// Underlying OS error.
        reason: String,
    },

    /// A duration that must be positive and finite was not.
    #[error("Invalid duration for {what}: {seconds}s")]
    InvalidDuration {
        /// What the duration describes (e.g. `"audio"`).
        what: &'static str,
        /// The rejected value in seconds.
        seconds: f64,
    },

    /// A loop must contain at least one copy of the clip.
    #[error("Repeat count must be at least 1")]
    InvalidRepeatCount,

    /// The job was cancelled between two stages.
    #[error("Operation cancelled")]
    Cancelled,

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error originating from the in-process FFmpeg libraries.
    #[cfg(feature = "libav")]
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// The media catalog or a download request failed.
    #[cfg(feature = "fetch")]
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The catalog record does not carry the requested media version.
    #[cfg(feature = "fetch")]
    #[error("Media record has no {0}")]
    MissingMedia(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|line| format!(": {line}"))
        .unwrap_or_default()
}

#[cfg(feature = "libav")]
impl From<ffmpeg_next::Error> for LoopSyncError {
    fn from(error: ffmpeg_next::Error) -> Self {
        LoopSyncError::FfmpegError(error.to_string())
    }
}

#[cfg(feature = "fetch")]
impl From<reqwest::Error> for LoopSyncError {
    fn from(error: reqwest::Error) -> Self {
        LoopSyncError::Fetch(error.to_string())
    }
}
