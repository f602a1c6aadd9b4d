//! End-to-end loop/sync jobs.
//!
//! [`LoopSyncJob`] runs the whole pipeline for one clip and one audio
//! track: probe → calibrate → build loop → reconcile → tag → deliver.
//! Stages run strictly in order, each blocking on one external process.
//! Intermediate files live in a private temporary directory that is removed
//! when the job ends, whether it succeeded or not.
//!
//! # Example
//!
//! ```no_run
//! use loopsync::{JobOptions, LoopSyncJob, SyncPolicy, VideoLooper};
//!
//! let options = JobOptions::new().with_policy(SyncPolicy::precision());
//! let report = LoopSyncJob::new(VideoLooper::new(), options)
//!     .run("clip.mp4".as_ref(), "audio.mp3".as_ref(), "synced.mp4".as_ref())?;
//! println!("{} loops, {}", report.plan.repeat_count(), report.branch);
//! # Ok::<(), loopsync::LoopSyncError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::calibrate::{LOOP_CONTAINER, LoopPlan};
use crate::config::JobOptions;
use crate::error::LoopSyncError;
use crate::looper::VideoLooper;
use crate::media::MediaStream;
use crate::progress::{JobStage, ProgressTracker};
use crate::sync::SyncBranch;

const STAGE_COUNT: u64 = 6;

/// What a finished job did.
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Loop plan the job built.
    pub plan: LoopPlan,
    /// Trim the reconciler applied.
    pub branch: SyncBranch,
    /// Duration of the single source clip, in seconds.
    pub clip_duration: f64,
    /// Duration of the audio track, in seconds.
    pub audio_duration: f64,
    /// Where the finished file was delivered.
    pub output: PathBuf,
    /// The work directory, when it was kept.
    pub work_dir: Option<PathBuf>,
}

/// One loop/sync job.
#[derive(Debug, Clone)]
pub struct LoopSyncJob {
    looper: VideoLooper,
    options: JobOptions,
}

impl LoopSyncJob {
    /// Create a job that runs its stages through `looper`.
    pub fn new(looper: VideoLooper, options: JobOptions) -> Self {
        Self { looper, options }
    }

    /// Loop `clip` to the length of `audio` and deliver the result to
    /// `destination`.
    ///
    /// # Errors
    ///
    /// Returns the first error any stage reports; nothing is delivered in
    /// that case. [`LoopSyncError::Cancelled`] is returned if the options'
    /// cancellation token fires before a stage starts.
    pub fn run(
        &self,
        clip: &Path,
        audio: &Path,
        destination: &Path,
    ) -> Result<JobReport, LoopSyncError> {
        let work_dir = tempfile::Builder::new().prefix("loopsync_").tempdir()?;
        log::debug!("Job work directory: {}", work_dir.path().display());

        let result = self.run_in(clip, audio, destination, work_dir.path());

        let kept = if self.options.keep_temp {
            Some(work_dir.keep())
        } else {
            drop_work_dir(work_dir);
            None
        };

        result.map(|mut report| {
            report.work_dir = kept;
            report
        })
    }

    fn run_in(
        &self,
        clip: &Path,
        audio: &Path,
        destination: &Path,
        work_dir: &Path,
    ) -> Result<JobReport, LoopSyncError> {
        let looper = &self.looper;
        let options = &self.options;
        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            JobStage::Probe,
            Some(STAGE_COUNT),
        );

        self.checkpoint()?;
        tracker.enter(JobStage::Probe, "Measuring inputs");
        let clip_stream = MediaStream::new(clip);
        let audio_stream = MediaStream::new(audio);
        let audio_duration = audio_stream.require_duration(looper.prober())?;
        let clip_duration = clip_stream.require_duration(looper.prober())?;

        self.checkpoint()?;
        tracker.enter(JobStage::Calibrate, "Calibrating loop duration");
        let plan = looper.plan(clip, audio_duration, options.loop_detection, work_dir)?;

        self.checkpoint()?;
        tracker.enter(
            JobStage::BuildLoop,
            format!("Building {} loop(s)", plan.repeat_count()),
        );
        let looped_path = work_dir.join(format!("looped.{LOOP_CONTAINER}"));
        let looped = looper.build_loop(clip, plan.repeat_count(), &looped_path)?;

        self.checkpoint()?;
        tracker.enter(JobStage::Reconcile, "Synchronizing video and audio");
        let synced = work_dir.join("synced.mp4");
        let branch = looper.reconcile(&looped, &audio_stream, &synced, options.policy)?;

        self.checkpoint()?;
        let finished = match &options.tags {
            Some(tags) => {
                tracker.enter(JobStage::Tag, "Writing metadata");
                let tagged = work_dir.join("tagged.mp4");
                looper.tag(&synced, &tagged, tags)?;
                tagged
            }
            None => {
                tracker.enter(JobStage::Tag, "No metadata to write");
                synced
            }
        };

        self.checkpoint()?;
        tracker.enter(JobStage::Deliver, format!("Saving {}", destination.display()));
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&finished, destination)?;
        tracker.finish("Done");

        log::info!(
            "Delivered {} ({} loops, {branch})",
            destination.display(),
            plan.repeat_count()
        );

        Ok(JobReport {
            plan,
            branch,
            clip_duration,
            audio_duration,
            output: destination.to_path_buf(),
            work_dir: None,
        })
    }

    fn checkpoint(&self) -> Result<(), LoopSyncError> {
        if self.options.is_cancelled() {
            Err(LoopSyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn drop_work_dir(work_dir: TempDir) {
    let path = work_dir.path().to_path_buf();
    if let Err(error) = work_dir.close() {
        log::warn!("Could not remove {}: {error}", path.display());
    }
}
