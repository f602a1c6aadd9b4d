//! # loopsync
//!
//! Loop a short video clip to the length of an audio track and mux both into
//! one synchronized file, without re-encoding.
//!
//! A clip concatenated N times rarely plays for exactly N × its own
//! duration: timestamps are regenerated and rounded to frame boundaries.
//! `loopsync` measures that bias on a 2-copy calibration loop, picks the
//! repeat count whose length lands closest to the audio, builds the loop by
//! stream copy, and trims the result against the audio to within a
//! millisecond. All heavy lifting is done by the `ffmpeg` and `ffprobe`
//! command-line tools.
//!
//! ## Quick Start
//!
//! ### Run a whole job
//!
//! ```no_run
//! use loopsync::{JobOptions, LoopSyncJob, SyncPolicy, VideoLooper};
//!
//! let job = LoopSyncJob::new(
//!     VideoLooper::new(),
//!     JobOptions::new().with_policy(SyncPolicy::precision()),
//! );
//! let report = job.run("clip.mp4".as_ref(), "audio.mp3".as_ref(), "out.mp4".as_ref())?;
//! println!("{} loops, {}", report.plan.repeat_count(), report.branch);
//! # Ok::<(), loopsync::LoopSyncError>(())
//! ```
//!
//! ### Plan a loop by hand
//!
//! ```
//! use loopsync::optimal_repeat_count;
//!
//! // 10 s loop, 24 s of audio: 2 copies (20 s) are closer than 3 (30 s).
//! assert_eq!(optimal_repeat_count(24.0, 10.0, true), 2);
//! assert_eq!(optimal_repeat_count(24.0, 10.0, false), 3);
//! ```
//!
//! ## Testing without FFmpeg
//!
//! Every stage talks to the outside world through two traits,
//! [`CommandRunner`] and [`DurationProbe`]. Both can be replaced on a
//! [`VideoLooper`] with fakes, so the pipeline can be exercised without
//! spawning processes.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `libav` | [`LibavProber`], an in-process prober built on `ffmpeg-next` (default) |
//! | `fetch` | Catalog lookup and streaming downloads via `reqwest` and Tokio (default) |
//! | `full` | Enables all of the above |

pub mod calibrate;
#[cfg(feature = "fetch")]
pub mod catalog;
pub mod command;
pub mod concat;
pub mod config;
#[cfg(feature = "fetch")]
pub mod download;
pub mod error;
pub mod ffmpeg;
pub mod looper;
pub mod media;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod sync;
pub mod validation;

pub use calibrate::{
    CALIBRATION_COPIES, LOOP_CONTAINER, LoopPlan, SEARCH_OFFSETS, calibrate_unit_duration,
    optimal_repeat_count,
};
#[cfg(feature = "fetch")]
pub use catalog::{CatalogClient, MediaRecord};
pub use command::{CommandRunner, SystemRunner, ToolCommand, ToolOutput, run_stage};
pub use concat::LoopConcat;
pub use config::{JobOptions, ToolPaths};
#[cfg(feature = "fetch")]
pub use download::Downloader;
pub use error::{LoopSyncError, Stage};
pub use ffmpeg::FfmpegLogLevel;
#[cfg(feature = "libav")]
pub use ffmpeg::set_ffmpeg_log_level;
pub use looper::VideoLooper;
pub use media::MediaStream;
pub use metadata::{MediaTags, MusicInfo};
pub use naming::{output_file_name, sanitize_filename};
pub use pipeline::{JobReport, LoopSyncJob};
#[cfg(feature = "libav")]
pub use probe::LibavProber;
pub use probe::{DurationProbe, FfprobeProber, parse_duration_output, require_duration};
pub use progress::{CancellationToken, JobProgress, JobStage, ProgressCallback};
pub use sync::{
    LEGACY_TOLERANCE, PRECISION_TOLERANCE, SyncBranch, SyncPolicy, reconcile, reconcile_command,
};
pub use validation::{ValidationReport, check_tools};
