//! Video/audio reconciliation.
//!
//! The looped video rarely matches the audio exactly. [`reconcile`]
//! measures both inputs, picks one of three [`SyncBranch`]es from the signed
//! difference, and stream-copies the first video stream and the first audio
//! stream into one file whose tracks end together.
//!
//! Two [`SyncPolicy`] variants exist and are deliberately kept apart: the
//! legacy policy treats anything within 10 ms as matched and normalizes
//! negative timestamps; the precision policy uses a configurable (default
//! 1 ms) tolerance and moves the index to the front of the file.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

use crate::command::{CommandRunner, ToolCommand, run_stage};
use crate::config::ToolPaths;
use crate::error::{LoopSyncError, Stage};
use crate::media::MediaStream;
use crate::probe::DurationProbe;

/// Tolerance of [`SyncPolicy::TrimToShorter`], in seconds.
pub const LEGACY_TOLERANCE: f64 = 0.01;

/// Default tolerance of [`SyncPolicy::TrimToShorterWithTolerance`], in
/// seconds.
pub const PRECISION_TOLERANCE: f64 = 0.001;

/// How the looped video is trimmed against the audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncPolicy {
    /// Legacy behaviour: fixed 10 ms tolerance, negative timestamps shifted
    /// to zero.
    TrimToShorter,
    /// Precision behaviour: the given tolerance in seconds, fast-start
    /// output.
    TrimToShorterWithTolerance(f64),
}

impl SyncPolicy {
    /// The precision policy with its default 1 ms tolerance.
    pub fn precision() -> Self {
        SyncPolicy::TrimToShorterWithTolerance(PRECISION_TOLERANCE)
    }

    /// Largest |video − audio| treated as already matched, in seconds.
    pub fn tolerance(self) -> f64 {
        match self {
            SyncPolicy::TrimToShorter => LEGACY_TOLERANCE,
            SyncPolicy::TrimToShorterWithTolerance(tolerance) => tolerance,
        }
    }

    /// Whether the output index is moved to the front of the file.
    pub fn faststart(self) -> bool {
        matches!(self, SyncPolicy::TrimToShorterWithTolerance(_))
    }

    /// Numeric label used in output file names (`1` legacy, `2` precision).
    pub fn method_number(self) -> u8 {
        match self {
            SyncPolicy::TrimToShorter => 1,
            SyncPolicy::TrimToShorterWithTolerance(_) => 2,
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::precision()
    }
}

/// The trim applied by [`reconcile`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncBranch {
    /// Durations already match; the muxer stops at whichever stream ends
    /// first.
    Shortest,
    /// The video is longer; output is capped at the audio duration.
    CapAtAudio(f64),
    /// The audio is longer; output is capped at the video duration.
    CapAtVideo(f64),
}

impl SyncBranch {
    /// Pick the branch for the given durations.
    pub fn select(video_duration: f64, audio_duration: f64, tolerance: f64) -> Self {
        let difference = video_duration - audio_duration;
        if difference.abs() < tolerance {
            SyncBranch::Shortest
        } else if difference > 0.0 {
            SyncBranch::CapAtAudio(audio_duration)
        } else {
            SyncBranch::CapAtVideo(video_duration)
        }
    }

    /// The explicit output cap in seconds, if this branch sets one.
    pub fn cap(self) -> Option<f64> {
        match self {
            SyncBranch::Shortest => None,
            SyncBranch::CapAtAudio(seconds) | SyncBranch::CapAtVideo(seconds) => Some(seconds),
        }
    }
}

impl Display for SyncBranch {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SyncBranch::Shortest => write!(f, "matched, trimmed to shortest stream"),
            SyncBranch::CapAtAudio(seconds) => write!(f, "video longer, capped at {seconds}s"),
            SyncBranch::CapAtVideo(seconds) => write!(f, "audio longer, capped at {seconds}s"),
        }
    }
}

/// The `ffmpeg` invocation that muxes `video` and `audio` into `output`
/// under `policy`, trimmed according to `branch`.
pub fn reconcile_command(
    tools: &ToolPaths,
    video: &Path,
    audio: &Path,
    output: &Path,
    policy: SyncPolicy,
    branch: SyncBranch,
) -> ToolCommand {
    let mut command = ToolCommand::new(&tools.ffmpeg)
        .args(["-hide_banner", "-loglevel", tools.log_level.as_arg()])
        .arg("-i")
        .arg(video)
        .arg("-i")
        .arg(audio)
        .args(["-c", "copy", "-map", "0:v:0", "-map", "1:a:0"]);

    command = match branch.cap() {
        None => command.arg("-shortest"),
        Some(seconds) => command.arg("-t").arg(format_seconds(seconds)),
    };

    command = if policy.faststart() {
        command.args(["-movflags", "+faststart"])
    } else {
        command.args(["-avoid_negative_ts", "make_zero"])
    };

    command.arg("-y").arg(output).produces(output)
}

/// Measure `video` and `audio`, choose a branch, and mux them into `output`.
///
/// Both durations must be known before a branch is chosen; nothing is
/// spawned otherwise. There is no fallback branch: a failed mux fails the
/// call.
///
/// # Errors
///
/// Returns [`LoopSyncError::ZeroDuration`] if either input cannot be
/// measured, and [`LoopSyncError::StageFailed`] if `ffmpeg` fails.
pub fn reconcile(
    runner: &dyn CommandRunner,
    prober: &dyn DurationProbe,
    tools: &ToolPaths,
    video: &MediaStream,
    audio: &MediaStream,
    output: &Path,
    policy: SyncPolicy,
) -> Result<SyncBranch, LoopSyncError> {
    let video_duration = video.require_duration(prober)?;
    let audio_duration = audio.require_duration(prober)?;

    let branch = SyncBranch::select(video_duration, audio_duration, policy.tolerance());
    log::info!("Reconciling video {video_duration}s against audio {audio_duration}s: {branch}");

    let command = reconcile_command(tools, video.path(), audio.path(), output, policy, branch);
    run_stage(runner, Stage::Reconcile, &command)?;

    Ok(branch)
}

/// Shortest decimal form that round-trips, e.g. `18.06` or `10`.
fn format_seconds(seconds: f64) -> String {
    format!("{seconds}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_seconds_round_trips() {
        assert_eq!(format_seconds(10.0), "10");
        assert_eq!(format_seconds(18.06), "18.06");
        assert_eq!(format_seconds(10.0005), "10.0005");
    }

    #[test]
    fn policy_tolerances() {
        assert_eq!(SyncPolicy::TrimToShorter.tolerance(), 0.01);
        assert_eq!(SyncPolicy::precision().tolerance(), 0.001);
        assert_eq!(SyncPolicy::TrimToShorterWithTolerance(0.04).tolerance(), 0.04);
    }
}
