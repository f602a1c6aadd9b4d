//! Streaming file downloads.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::catalog::USER_AGENT;
use crate::error::LoopSyncError;
use crate::progress::{JobStage, ProgressCallback, ProgressTracker};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Streams remote files to disk, reporting byte progress.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    /// Downloader with a 30 s request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::Fetch`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, LoopSyncError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Download `url` into `path`, returning the number of bytes written.
    ///
    /// Progress is reported as [`JobStage::Download`] with the byte count;
    /// the total is only known when the server sends `Content-Length`.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::Fetch`] on transport errors or a non-success
    /// status, and an I/O error if the file cannot be written.
    pub async fn download(
        &self,
        url: &str,
        path: &Path,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<u64, LoopSyncError> {
        log::debug!("Downloading {url} to {}", path.display());

        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoopSyncError::Fetch(format!("{url} returned {status}")));
        }

        let total = response.content_length().filter(|&length| length > 0);
        let mut tracker = ProgressTracker::new(progress, JobStage::Download, total);
        let mut file = File::create(path).await?;
        let mut written = 0_u64;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            tracker.advance_by(chunk.len() as u64);
        }

        file.flush().await?;
        tracker.finish(format!("Downloaded {written} bytes"));
        Ok(written)
    }
}
