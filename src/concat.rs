//! Loop construction by demuxer-level concatenation.
//!
//! [`LoopConcat`] writes a concat-demuxer playlist that lists the same clip
//! `repeat_count` times, then has `ffmpeg` stream-copy the playlist into one
//! file. Nothing is re-encoded. This is equivalent to
//!
//! ```text
//! ffmpeg -f concat -safe 0 -i loop.concat.txt -c copy \
//!        -fflags +genpts -vsync cfr -avoid_negative_ts make_zero -y loop.mp4
//! ```
//!
//! # Example
//!
//! ```no_run
//! use loopsync::{LoopConcat, SystemRunner, ToolPaths};
//!
//! LoopConcat::new("clip.mp4", 4, "looped.mp4")?
//!     .run(&SystemRunner, &ToolPaths::default())?;
//! # Ok::<(), loopsync::LoopSyncError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::command::{CommandRunner, ToolCommand, run_stage};
use crate::config::ToolPaths;
use crate::error::{LoopSyncError, Stage};
use crate::media::MediaStream;

/// Builds one continuous stream out of back-to-back copies of a clip.
#[derive(Debug, Clone)]
pub struct LoopConcat {
    clip: PathBuf,
    repeat_count: u32,
    output: PathBuf,
    playlist: PathBuf,
    stage: Stage,
}

impl LoopConcat {
    /// Describe a loop of `repeat_count` copies of `clip` written to `output`.
    ///
    /// The clip path is made absolute so the playlist does not depend on the
    /// working directory of the spawned process. The playlist is written next
    /// to the output as `<output-stem>.concat.txt`.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::InvalidRepeatCount`] if `repeat_count` is
    /// zero, or an I/O error if the clip path cannot be made absolute.
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>>(
        clip: P1,
        repeat_count: u32,
        output: P2,
    ) -> Result<Self, LoopSyncError> {
        if repeat_count == 0 {
            return Err(LoopSyncError::InvalidRepeatCount);
        }

        let clip = std::path::absolute(clip.as_ref())?;
        let output = output.as_ref().to_path_buf();
        let playlist = playlist_path_for(&output);

        Ok(Self {
            clip,
            repeat_count,
            output,
            playlist,
            stage: Stage::LoopBuild,
        })
    }

    /// Write the playlist to `path` instead of next to the output.
    #[must_use]
    pub fn with_playlist(mut self, path: impl Into<PathBuf>) -> Self {
        self.playlist = path.into();
        self
    }

    /// Report failures as `stage`. Defaults to [`Stage::LoopBuild`].
    #[must_use]
    pub fn for_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Number of copies in the loop.
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Where the playlist is written.
    pub fn playlist_path(&self) -> &Path {
        &self.playlist
    }

    /// Playlist text: one `file '<absolute-path>'` line per copy.
    pub fn playlist(&self) -> String {
        let entry = format!("file '{}'\n", escape_concat_path(&self.clip));
        entry.repeat(self.repeat_count as usize)
    }

    /// The `ffmpeg` invocation that performs the concatenation.
    pub fn command(&self, tools: &ToolPaths) -> ToolCommand {
        ToolCommand::new(&tools.ffmpeg)
            .args(["-hide_banner", "-loglevel", tools.log_level.as_arg()])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&self.playlist)
            .args(["-c", "copy"])
            .args(["-fflags", "+genpts"])
            .args(["-vsync", "cfr"])
            .args(["-avoid_negative_ts", "make_zero"])
            .arg("-y")
            .arg(&self.output)
            .produces(&self.output)
    }

    /// Write the playlist and run the concatenation.
    ///
    /// Partial output is left in place on failure; the caller owns the
    /// directory it lives in.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the playlist cannot be written, and
    /// [`LoopSyncError::StageFailed`] if `ffmpeg` exits unsuccessfully.
    pub fn run(
        &self,
        runner: &dyn CommandRunner,
        tools: &ToolPaths,
    ) -> Result<MediaStream, LoopSyncError> {
        log::debug!(
            "Concatenating {} copies of {} into {}",
            self.repeat_count,
            self.clip.display(),
            self.output.display()
        );

        fs::write(&self.playlist, self.playlist())?;
        run_stage(runner, self.stage, &self.command(tools))?;

        Ok(MediaStream::new(&self.output))
    }
}

/// `<dir>/<stem>.concat.txt` for an output at `<dir>/<stem>.<ext>`.
fn playlist_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "loop".to_string());
    output.with_file_name(format!("{stem}.concat.txt"))
}

/// Quote a path for a concat playlist: `'` becomes `'\''`.
fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}
