//! Media duration probing.
//!
//! A [`DurationProbe`] answers one question: how long does this file play?
//! Probing never fails loudly. A file that cannot be measured yields `0.0`,
//! which every caller must treat as "unknown", never as a real zero-length
//! file. [`require_duration`] converts that sentinel into
//! [`LoopSyncError::ZeroDuration`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use loopsync::{DurationProbe, FfprobeProber, SystemRunner, ToolPaths};
//!
//! let prober = FfprobeProber::new(Arc::new(SystemRunner), ToolPaths::default());
//! let seconds = prober.probe("clip.mp4".as_ref());
//! if seconds > 0.0 {
//!     println!("clip plays for {seconds:.3}s");
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
#[cfg(feature = "libav")]
use std::time::Duration;

use crate::command::{CommandRunner, ToolCommand};
use crate::config::ToolPaths;
use crate::error::LoopSyncError;

/// Measures the playable duration of a media file in seconds.
pub trait DurationProbe: Send + Sync {
    /// Duration of `path` in seconds, or `0.0` if it cannot be determined.
    fn probe(&self, path: &Path) -> f64;
}

/// Probe `path` and reject the zero sentinel.
///
/// # Errors
///
/// Returns [`LoopSyncError::ZeroDuration`] when the prober could not
/// determine a positive duration.
pub fn require_duration(prober: &dyn DurationProbe, path: &Path) -> Result<f64, LoopSyncError> {
    let seconds = prober.probe(path);
    if seconds > 0.0 {
        Ok(seconds)
    } else {
        Err(LoopSyncError::ZeroDuration {
            path: path.to_path_buf(),
        })
    }
}

/// Parse the text `ffprobe` prints for `format=duration`.
///
/// Empty, unparseable, negative, or non-finite output maps to `0.0`.
pub fn parse_duration_output(stdout: &str) -> f64 {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .unwrap_or(0.0)
}

/// Probes durations by running `ffprobe` and reading the container duration.
pub struct FfprobeProber {
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
}

impl FfprobeProber {
    /// Create a prober that runs `tools.ffprobe` through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>, tools: ToolPaths) -> Self {
        Self { runner, tools }
    }

    /// The `ffprobe` invocation used for `path`.
    pub fn command(&self, path: &Path) -> ToolCommand {
        ToolCommand::new(&self.tools.ffprobe)
            .args(["-v", self.tools.log_level.as_arg()])
            .args([
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
    }
}

impl DurationProbe for FfprobeProber {
    fn probe(&self, path: &Path) -> f64 {
        match self.runner.run(&self.command(path)) {
            Ok(output) if output.success => {
                let seconds = parse_duration_output(&output.stdout);
                log::debug!("Probed {}: {seconds}s", path.display());
                seconds
            }
            Ok(output) => {
                log::debug!(
                    "ffprobe failed on {} ({}): {}",
                    path.display(),
                    output.status,
                    output.last_error_line().unwrap_or_default()
                );
                0.0
            }
            Err(error) => {
                log::debug!("ffprobe could not run on {}: {error}", path.display());
                0.0
            }
        }
    }
}

/// Probes durations in-process through the FFmpeg libraries.
///
/// Opens the container, reads its duration, and closes it again without
/// touching any stream data.
#[cfg(feature = "libav")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LibavProber;

#[cfg(feature = "libav")]
impl LibavProber {
    /// Initialise FFmpeg and create the prober.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::FfmpegError`] if the libraries fail to
    /// initialise.
    pub fn new() -> Result<Self, LoopSyncError> {
        ffmpeg_next::init()?;
        Ok(Self)
    }

    fn container_duration(path: &Path) -> Result<f64, LoopSyncError> {
        let context = ffmpeg_next::format::input(&path)?;
        // Container duration is in microseconds.
        let duration_microseconds = context.duration();
        if duration_microseconds <= 0 {
            return Ok(0.0);
        }
        Ok(Duration::from_micros(duration_microseconds as u64).as_secs_f64())
    }
}

#[cfg(feature = "libav")]
impl DurationProbe for LibavProber {
    fn probe(&self, path: &Path) -> f64 {
        match Self::container_duration(path) {
            Ok(seconds) => {
                log::debug!("Probed {}: {seconds}s", path.display());
                seconds
            }
            Err(error) => {
                log::debug!("Could not open {}: {error}", path.display());
                0.0
            }
        }
    }
}
