//! Loop duration calibration and repeat-count selection.
//!
//! Concatenating a clip N times and measuring the result does not give
//! exactly N × the single-clip duration: timestamps are regenerated and
//! rounded to frame boundaries, and the container adds its own overhead.
//! [`calibrate_unit_duration`] measures that bias on a disposable 2-copy
//! loop built with the exact flags the real build uses, and
//! [`optimal_repeat_count`] picks the repeat count whose length lands
//! closest to the target.
//!
//! # Example
//!
//! ```
//! use loopsync::{LoopPlan, optimal_repeat_count};
//!
//! // A 6.02 s loop against 20 s of audio: 3 copies (18.06 s) beat 4 (24.08 s).
//! assert_eq!(optimal_repeat_count(20.0, 6.02, true), 3);
//! assert_eq!(optimal_repeat_count(20.0, 6.02, false), 4);
//!
//! let plan = LoopPlan::new(20.0, 6.02, true)?;
//! assert_eq!(plan.repeat_count(), 3);
//! # Ok::<(), loopsync::LoopSyncError>(())
//! ```

use std::path::Path;

use crate::command::CommandRunner;
use crate::concat::LoopConcat;
use crate::config::ToolPaths;
use crate::error::{LoopSyncError, Stage};
use crate::probe::DurationProbe;

/// Number of copies in the calibration loop.
pub const CALIBRATION_COPIES: u32 = 2;

/// Container extension of every loop a job builds, calibration included.
pub const LOOP_CONTAINER: &str = "mp4";

/// Offsets around the baseline repeat count examined when loop detection is
/// enabled, in scan order.
pub const SEARCH_OFFSETS: [i64; 6] = [-3, -2, -1, 1, 2, 3];

/// Measure the duration of one loop iteration as it comes out of
/// concatenation.
///
/// Builds `calibration.concat.txt` and `calibration.<container>` in
/// `work_dir`, probes the 2-copy result, and returns half of it. The
/// container must be the one the real loop is written to, so both go
/// through the same muxer. When the calibration build fails or cannot be
/// measured, falls back to the raw duration of `clip`, which may itself be
/// `0.0` if the clip is unreadable.
pub fn calibrate_unit_duration(
    runner: &dyn CommandRunner,
    prober: &dyn DurationProbe,
    tools: &ToolPaths,
    clip: &Path,
    work_dir: &Path,
    container: &str,
) -> f64 {
    let output = work_dir.join(format!("calibration.{container}"));

    let calibrated = LoopConcat::new(clip, CALIBRATION_COPIES, &output)
        .and_then(|concat| concat.for_stage(Stage::Calibration).run(runner, tools));

    match calibrated {
        Ok(stream) => {
            let measured = stream.duration(prober);
            if measured > 0.0 {
                let unit = measured / f64::from(CALIBRATION_COPIES);
                log::debug!(
                    "Calibrated loop duration: {unit}s ({measured}s for {} copies)",
                    CALIBRATION_COPIES
                );
                return unit;
            }
            log::warn!("Calibration loop could not be measured, using raw clip duration");
        }
        Err(error) => {
            log::warn!("Calibration loop failed ({error}), using raw clip duration");
        }
    }

    prober.probe(clip)
}

/// Choose how many copies of a `unit_duration` loop best cover
/// `target_duration`.
///
/// The baseline is `ceil(target / unit)`, never less than 1. With detection
/// enabled, the baseline and its neighbours at [`SEARCH_OFFSETS`] are
/// compared by `|target − count × unit|`; a candidate replaces the current
/// best only when strictly closer, so the baseline wins ties.
///
/// A non-finite or non-positive `unit_duration` yields 1.
pub fn optimal_repeat_count(
    target_duration: f64,
    unit_duration: f64,
    detection_enabled: bool,
) -> u32 {
    if !unit_duration.is_finite() || unit_duration <= 0.0 || !target_duration.is_finite() {
        return 1;
    }

    let baseline = (target_duration / unit_duration)
        .ceil()
        .clamp(1.0, f64::from(u32::MAX)) as i64;
    if !detection_enabled {
        return baseline as u32;
    }

    let distance = |count: i64| (target_duration - count as f64 * unit_duration).abs();

    let mut best = baseline;
    let mut best_distance = distance(baseline);

    for offset in SEARCH_OFFSETS {
        let candidate = baseline + offset;
        if candidate <= 0 || candidate > i64::from(u32::MAX) {
            continue;
        }
        let candidate_distance = distance(candidate);
        if candidate_distance < best_distance {
            best = candidate;
            best_distance = candidate_distance;
        }
    }

    best as u32
}

/// How the loop for one job is built: the calibrated duration of one
/// iteration and the number of iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub struct LoopPlan {
    unit_duration: f64,
    repeat_count: u32,
}

impl LoopPlan {
    /// Plan a loop of `unit_duration` iterations covering `target_duration`.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::InvalidDuration`] if either duration is not
    /// positive and finite.
    pub fn new(
        target_duration: f64,
        unit_duration: f64,
        detection_enabled: bool,
    ) -> Result<Self, LoopSyncError> {
        validate_positive("target", target_duration)?;
        validate_positive("loop unit", unit_duration)?;

        Ok(Self {
            unit_duration,
            repeat_count: optimal_repeat_count(target_duration, unit_duration, detection_enabled),
        })
    }

    /// Calibrated duration of one loop iteration, in seconds.
    pub fn unit_duration(&self) -> f64 {
        self.unit_duration
    }

    /// Number of copies to concatenate.
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Predicted length of the finished loop, in seconds.
    pub fn expected_duration(&self) -> f64 {
        f64::from(self.repeat_count) * self.unit_duration
    }
}

fn validate_positive(what: &'static str, seconds: f64) -> Result<(), LoopSyncError> {
    if seconds.is_finite() && seconds > 0.0 {
        Ok(())
    } else {
        Err(LoopSyncError::InvalidDuration { what, seconds })
    }
}
