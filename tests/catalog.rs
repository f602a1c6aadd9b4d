//! Catalog record parsing tests.

#![cfg(feature = "fetch")]

use loopsync::catalog::{CatalogClient, MediaRecord, extract_media_id};
use loopsync::{Downloader, LoopSyncError, MusicInfo};

const RECORD: &str = r#"{
    "title": "Sunset",
    "tags": [{"title": "beach"}, {"title": ""}, {"title": null}, {"title": "waves"}],
    "music": {"title": "Tide", "album_name": "Shore", "artist_title": "The Gulls"},
    "file_versions": {
        "html5": {
            "video": {
                "high": {"url": "https://cdn.example.com/high.mp4", "size": 1024},
                "med": {"url": "https://cdn.example.com/med.mp4"}
            },
            "audio": {
                "high": {"url": "https://cdn.example.com/high.mp3"},
                "med": {"url": "https://cdn.example.com/med.mp3"}
            }
        }
    },
    "views_count": 12
}"#;

#[test]
fn media_id_is_last_path_segment() {
    assert_eq!(extract_media_id("https://coub.com/view/2abc3"), "2abc3");
    assert_eq!(extract_media_id("https://coub.com/view/2abc3/"), "2abc3");
    assert_eq!(extract_media_id("https://coub.com/view/2abc3?ref=home#top"), "2abc3");
    assert_eq!(extract_media_id("2abc3"), "2abc3");
}

#[test]
fn clients_build_with_timeout_and_user_agent() {
    assert!(CatalogClient::new().is_ok());
    assert!(Downloader::new().is_ok());
}

#[test]
fn record_url_appends_id() {
    let client = CatalogClient::with_base_url("http://localhost:9000/api/").unwrap();
    assert_eq!(client.record_url("2abc3"), "http://localhost:9000/api/2abc3");
}

#[test]
fn best_available_video_quality_is_chosen() {
    let record: MediaRecord = serde_json::from_str(RECORD).unwrap();
    let (url, quality) = record.video_url().unwrap();

    assert_eq!(quality, "high");
    assert_eq!(url, "https://cdn.example.com/high.mp4");
    assert_eq!(record.audio_url().unwrap(), "https://cdn.example.com/high.mp3");
}

#[test]
fn record_tags_skip_empty_entries() {
    let record: MediaRecord = serde_json::from_str(RECORD).unwrap();
    let tags = record.tags();

    assert_eq!(tags.title, "Sunset");
    assert_eq!(tags.tags, ["beach", "waves"]);
    assert_eq!(tags.music, Some(MusicInfo::new("Tide", "Shore", "The Gulls")));
}

#[test]
fn sparse_record_reports_missing_media() {
    let record: MediaRecord = serde_json::from_str(r#"{"title": "Bare"}"#).unwrap();

    assert!(matches!(record.video_url(), Err(LoopSyncError::MissingMedia(_))));
    assert!(matches!(record.audio_url(), Err(LoopSyncError::MissingMedia(_))));
    assert!(record.tags().music.is_none());
}
