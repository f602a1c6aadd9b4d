//! Media catalog lookup.
//!
//! [`CatalogClient`] fetches the record of one media item by ID and exposes
//! what a job needs from it: the best video URL, the audio URL, and the
//! descriptive [`MediaTags`].
//!
//! # Example
//!
//! ```no_run
//! use loopsync::catalog::{CatalogClient, extract_media_id};
//!
//! # async fn example() -> Result<(), loopsync::LoopSyncError> {
//! let client = CatalogClient::new()?;
//! let id = extract_media_id("https://coub.com/view/2abc3");
//! let record = client.fetch(&id).await?;
//! let (video_url, quality) = record.video_url()?;
//! println!("{quality}: {video_url}");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::LoopSyncError;
use crate::metadata::{MediaTags, MusicInfo};

/// Base URL of the catalog API; the media ID is appended.
pub const DEFAULT_API_BASE: &str = "https://coub.com/api/v2/coubs/";

/// User agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Video qualities in order of preference.
pub const QUALITY_PRIORITY: [&str; 3] = ["higher", "high", "med"];

const FALLBACK_QUALITY: &str = "med";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Last path segment of a media page URL, ignoring any query, fragment, or
/// trailing slash. A bare ID is returned unchanged.
pub fn extract_media_id(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// One downloadable rendition.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaVersion {
    /// Direct URL of the file.
    pub url: String,
}

/// Per-quality video and audio renditions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Html5Versions {
    /// Video renditions keyed by quality name.
    #[serde(default)]
    pub video: HashMap<String, MediaVersion>,
    /// Audio renditions keyed by quality name.
    #[serde(default)]
    pub audio: HashMap<String, MediaVersion>,
}

/// Container of the rendition groups.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileVersions {
    /// HTML5-playable renditions.
    #[serde(default)]
    pub html5: Html5Versions,
}

/// A tag as published in the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogTag {
    /// Tag text.
    #[serde(default)]
    pub title: Option<String>,
}

/// Music attribution as published in the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogMusic {
    /// Track title.
    #[serde(default)]
    pub title: Option<String>,
    /// Album name.
    #[serde(default)]
    pub album_name: Option<String>,
    /// Performing artist.
    #[serde(default)]
    pub artist_title: Option<String>,
}

/// The catalog record of one media item.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaRecord {
    /// Title of the item.
    #[serde(default)]
    pub title: String,
    /// Published tags.
    #[serde(default)]
    pub tags: Vec<CatalogTag>,
    /// Music attribution, if any.
    #[serde(default)]
    pub music: Option<CatalogMusic>,
    /// Downloadable renditions.
    #[serde(default)]
    pub file_versions: FileVersions,
}

impl MediaRecord {
    /// The highest-priority video rendition and its quality name.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::MissingMedia`] if none of the known
    /// qualities is present.
    pub fn video_url(&self) -> Result<(&str, &'static str), LoopSyncError> {
        let videos = &self.file_versions.html5.video;
        QUALITY_PRIORITY
            .iter()
            .chain(std::iter::once(&FALLBACK_QUALITY))
            .find_map(|quality| {
                videos
                    .get(*quality)
                    .map(|version| (version.url.as_str(), *quality))
            })
            .ok_or_else(|| LoopSyncError::MissingMedia("video rendition".to_string()))
    }

    /// The high-quality audio rendition.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::MissingMedia`] if the record has no
    /// high-quality audio.
    pub fn audio_url(&self) -> Result<&str, LoopSyncError> {
        self.file_versions
            .html5
            .audio
            .get("high")
            .map(|version| version.url.as_str())
            .ok_or_else(|| LoopSyncError::MissingMedia("high-quality audio".to_string()))
    }

    /// Title, non-empty tags, and music attribution.
    pub fn tags(&self) -> MediaTags {
        let tags = self
            .tags
            .iter()
            .filter_map(|tag| tag.title.clone())
            .filter(|title| !title.is_empty());

        let mut media_tags = MediaTags::new(self.title.clone()).with_tags(tags);
        if let Some(music) = &self.music {
            media_tags = media_tags.with_music(MusicInfo::new(
                music.title.clone().unwrap_or_default(),
                music.album_name.clone().unwrap_or_default(),
                music.artist_title.clone().unwrap_or_default(),
            ));
        }
        media_tags
    }
}

/// HTTP client for the media catalog.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    /// Client for [`DEFAULT_API_BASE`].
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::Fetch`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, LoopSyncError> {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    /// Client for a different API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::Fetch`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, LoopSyncError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Request URL for `media_id`.
    pub fn record_url(&self, media_id: &str) -> String {
        format!("{}{media_id}", self.base_url)
    }

    /// Fetch and parse the record of `media_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LoopSyncError::Fetch`] on transport errors, non-success
    /// status codes, or an unparseable body.
    pub async fn fetch(&self, media_id: &str) -> Result<MediaRecord, LoopSyncError> {
        let url = self.record_url(media_id);
        log::debug!("Fetching catalog record {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoopSyncError::Fetch(format!("{url} returned {status}")));
        }

        Ok(response.json::<MediaRecord>().await?)
    }
}
