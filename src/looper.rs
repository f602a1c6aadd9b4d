//! The [`VideoLooper`] entry point.
//!
//! `VideoLooper` bundles the two collaborators every stage needs, a
//! [`CommandRunner`] and a [`DurationProbe`], together with the tool
//! locations. Each method maps to one pipeline stage; [`LoopSyncJob`](crate::LoopSyncJob)
//! strings them together.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

use crate::calibrate::{LOOP_CONTAINER, LoopPlan, calibrate_unit_duration};
use crate::command::{CommandRunner, SystemRunner, run_stage};
use crate::concat::LoopConcat;
use crate::config::ToolPaths;
use crate::error::{LoopSyncError, Stage};
use crate::media::MediaStream;
use crate::metadata::MediaTags;
use crate::probe::{DurationProbe, FfprobeProber};
use crate::sync::{SyncBranch, SyncPolicy, reconcile};

/// Runs the loop/sync stages against injectable collaborators.
///
/// Cloning is cheap; clones share the same collaborators. A `VideoLooper`
/// holds no per-job state and can be shared between concurrent jobs as
/// long as each job uses its own work directory.
///
/// # Example
///
/// ```no_run
/// use loopsync::{SyncPolicy, VideoLooper};
///
/// let looper = VideoLooper::new();
/// let work_dir = tempfile::tempdir()?;
///
/// let audio = looper.probe("audio.mp3".as_ref());
/// let plan = looper.plan("clip.mp4".as_ref(), audio, true, work_dir.path())?;
/// let looped_path = work_dir.path().join("looped.mp4");
/// let looped = looper.build_loop("clip.mp4".as_ref(), plan.repeat_count(), &looped_path)?;
/// looper.reconcile(&looped, &"audio.mp3".into(), "out.mp4".as_ref(), SyncPolicy::precision())?;
/// # Ok::<(), loopsync::LoopSyncError>(())
/// ```
#[derive(Clone)]
pub struct VideoLooper {
    runner: Arc<dyn CommandRunner>,
    prober: Arc<dyn DurationProbe>,
    tools: ToolPaths,
}

impl Debug for VideoLooper {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoLooper")
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl Default for VideoLooper {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoLooper {
    /// Spawn real `ffmpeg`/`ffprobe` processes found on `PATH`.
    pub fn new() -> Self {
        Self::with_tools(ToolPaths::default())
    }

    /// Spawn real processes using the given tool locations.
    pub fn with_tools(tools: ToolPaths) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let prober = Arc::new(FfprobeProber::new(Arc::clone(&runner), tools.clone()));
        Self {
            runner,
            prober,
            tools,
        }
    }

    /// Replace the process runner. The prober is left untouched.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the duration prober.
    #[must_use]
    pub fn with_prober(mut self, prober: Arc<dyn DurationProbe>) -> Self {
        self.prober = prober;
        self
    }

    /// Tool locations in use.
    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// The process runner in use.
    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// The duration prober in use.
    pub fn prober(&self) -> &dyn DurationProbe {
        self.prober.as_ref()
    }

    /// Duration of `path` in seconds, `0.0` if unknown.
    pub fn probe(&self, path: &Path) -> f64 {
        self.prober.probe(path)
    }

    /// Calibrated duration of one iteration of `clip`, measured in the
    /// [`LOOP_CONTAINER`] every job loop is written to.
    ///
    /// See [`calibrate_unit_duration`].
    pub fn calibrate(&self, clip: &Path, work_dir: &Path) -> f64 {
        calibrate_unit_duration(
            self.runner.as_ref(),
            self.prober.as_ref(),
            &self.tools,
            clip,
            work_dir,
            LOOP_CONTAINER,
        )
    }

    /// Calibrate `clip` and plan a loop covering `target_duration`.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::ZeroDuration`] if neither the calibration
    /// loop nor the clip itself can be measured, and
    /// [`LoopSyncError::InvalidDuration`] for a non-positive target.
    pub fn plan(
        &self,
        clip: &Path,
        target_duration: f64,
        detection_enabled: bool,
        work_dir: &Path,
    ) -> Result<LoopPlan, LoopSyncError> {
        let unit = self.calibrate(clip, work_dir);
        if unit <= 0.0 {
            return Err(LoopSyncError::ZeroDuration {
                path: clip.to_path_buf(),
            });
        }

        let plan = LoopPlan::new(target_duration, unit, detection_enabled)?;
        log::info!(
            "Loop plan: {} x {}s = {}s for target {}s",
            plan.repeat_count(),
            plan.unit_duration(),
            plan.expected_duration(),
            target_duration
        );
        Ok(plan)
    }

    /// Concatenate `repeat_count` copies of `clip` into `output`.
    ///
    /// # Errors
    ///
    /// See [`LoopConcat::new`] and [`LoopConcat::run`].
    pub fn build_loop(
        &self,
        clip: &Path,
        repeat_count: u32,
        output: &Path,
    ) -> Result<MediaStream, LoopSyncError> {
        LoopConcat::new(clip, repeat_count, output)?.run(self.runner.as_ref(), &self.tools)
    }

    /// Like [`build_loop`](Self::build_loop), but the playlist lives in a
    /// scratch directory that is removed afterwards, so only `output` is
    /// left behind.
    ///
    /// # Errors
    ///
    /// See [`LoopConcat::new`] and [`LoopConcat::run`].
    pub fn export_loop(
        &self,
        clip: &Path,
        repeat_count: u32,
        output: &Path,
    ) -> Result<MediaStream, LoopSyncError> {
        let scratch = tempfile::Builder::new().prefix("loopsync_loop_").tempdir()?;
        LoopConcat::new(clip, repeat_count, output)?
            .with_playlist(scratch.path().join("loop.concat.txt"))
            .run(self.runner.as_ref(), &self.tools)
    }

    /// Mux `video` and `audio` into `output` with matched durations.
    ///
    /// # Errors
    ///
    /// See [`reconcile`].
    pub fn reconcile(
        &self,
        video: &MediaStream,
        audio: &MediaStream,
        output: &Path,
        policy: SyncPolicy,
    ) -> Result<SyncBranch, LoopSyncError> {
        reconcile(
            self.runner.as_ref(),
            self.prober.as_ref(),
            &self.tools,
            video,
            audio,
            output,
            policy,
        )
    }

    /// Copy `input` to `output` with `tags` written into the container.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::StageFailed`] if `ffmpeg` fails.
    pub fn tag(&self, input: &Path, output: &Path, tags: &MediaTags) -> Result<(), LoopSyncError> {
        let command = tags.command(&self.tools, input, output);
        run_stage(self.runner.as_ref(), Stage::Metadata, &command)?;
        Ok(())
    }
}
