//! On-disk media artifacts.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use crate::error::LoopSyncError;
use crate::probe::DurationProbe;

/// A media file produced or consumed by one pipeline stage.
///
/// The duration is measured the first time it is asked for and cached for
/// the lifetime of the value. A zero probe result is cached too, so a
/// failing file is not re-probed.
#[derive(Debug, Clone)]
pub struct MediaStream {
    path: PathBuf,
    duration: OnceCell<f64>,
}

impl MediaStream {
    /// Refer to the media file at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            duration: OnceCell::new(),
        }
    }

    /// Refer to `path` with an already known duration.
    pub fn with_duration(path: impl Into<PathBuf>, seconds: f64) -> Self {
        let stream = Self::new(path);
        let _ = stream.duration.set(seconds);
        stream
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Duration in seconds, probing on first use. `0.0` means unknown.
    pub fn duration(&self, prober: &dyn DurationProbe) -> f64 {
        *self.duration.get_or_init(|| prober.probe(&self.path))
    }

    /// Duration in seconds, rejecting the zero sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::ZeroDuration`] if the file cannot be measured.
    pub fn require_duration(&self, prober: &dyn DurationProbe) -> Result<f64, LoopSyncError> {
        let seconds = self.duration(prober);
        if seconds > 0.0 {
            Ok(seconds)
        } else {
            Err(LoopSyncError::ZeroDuration {
                path: self.path.clone(),
            })
        }
    }

    /// Consume the stream and return its path.
    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl From<&str> for MediaStream {
    fn from(path: &str) -> Self {
        MediaStream::new(path)
    }
}

impl From<PathBuf> for MediaStream {
    fn from(path: PathBuf) -> Self {
        MediaStream::new(path)
    }
}
