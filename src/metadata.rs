//! Descriptive tags for the finished file.
//!
//! [`MediaTags`] carries the title, free-form tags, and optional music
//! attribution of a job and renders them as container metadata. Tagging is
//! a stream copy; audio and video are never touched.
//!
//! # Example
//!
//! ```
//! use loopsync::{MediaTags, MusicInfo};
//!
//! let tags = MediaTags::new("Sunset loop")
//!     .with_tags(["beach", "\"summer\""])
//!     .with_music(MusicInfo::new("Waves", "Coastline", "The Tides"));
//!
//! assert_eq!(tags.display_title(), "Waves; Coastline");
//! assert_eq!(tags.formatted_tags(), "beach; summer");
//! ```

use std::path::Path;

use crate::command::ToolCommand;
use crate::config::ToolPaths;

const TITLE_LIMIT: usize = 200;
const COMMENT_LIMIT: usize = 500;
const DESCRIPTION_PREFIX: &str = "CVideo: ";

/// Music attribution attached to a clip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MusicInfo {
    /// Track title.
    pub title: String,
    /// Album name.
    pub album: String,
    /// Performing artist.
    pub artist: String,
}

impl MusicInfo {
    /// Create attribution from its three parts. Surrounding whitespace is
    /// trimmed.
    pub fn new(
        title: impl Into<String>,
        album: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into().trim().to_string(),
            album: album.into().trim().to_string(),
            artist: artist.into().trim().to_string(),
        }
    }

    /// `title; album`, or whichever of the two is present.
    pub fn display_title(&self) -> Option<String> {
        match (self.title.is_empty(), self.album.is_empty()) {
            (false, false) => Some(format!("{}; {}", self.title, self.album)),
            (false, true) => Some(self.title.clone()),
            (true, false) => Some(self.album.clone()),
            (true, true) => None,
        }
    }
}

/// Title, tags, and music attribution for one job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaTags {
    /// Title of the media item.
    pub title: String,
    /// Free-form tags as published.
    pub tags: Vec<String>,
    /// Music attribution, when the item has any.
    pub music: Option<MusicInfo>,
}

impl MediaTags {
    /// Tags with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the free-form tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the music attribution.
    #[must_use]
    pub fn with_music(mut self, music: MusicInfo) -> Self {
        self.music = Some(music);
        self
    }

    /// The music display title if there is one, else the media title.
    pub fn display_title(&self) -> String {
        self.music
            .as_ref()
            .and_then(MusicInfo::display_title)
            .unwrap_or_else(|| self.title.clone())
    }

    /// Cleaned tags joined with `"; "`.
    ///
    /// Quotes are removed, then anything other than word characters,
    /// whitespace, and `-.,:;!?()` is dropped. Tags left empty are skipped.
    pub fn formatted_tags(&self) -> String {
        self.tags
            .iter()
            .map(|tag| clean_tag(tag))
            .filter(|tag| !tag.is_empty())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// `-metadata` key/value pairs, in the order they are written.
    ///
    /// The title is capped at 200 characters, the cleaned tag list at 500
    /// before its `Tags: ` prefix, and the media title at 200 before its
    /// `CVideo: ` prefix.
    pub fn metadata_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("title", truncate(&self.display_title(), TITLE_LIMIT))];

        let tags = self.formatted_tags();
        if !tags.is_empty() {
            pairs.push(("comment", format!("Tags: {}", truncate(&tags, COMMENT_LIMIT))));
        }

        pairs.push((
            "description",
            format!("{DESCRIPTION_PREFIX}{}", truncate(&self.title, TITLE_LIMIT)),
        ));

        if let Some(music) = &self.music {
            if !music.title.is_empty() {
                pairs.push(("album", truncate(&music.album, TITLE_LIMIT)));
            }
            if !music.artist.is_empty() {
                pairs.push(("artist", truncate(&music.artist, TITLE_LIMIT)));
                pairs.push(("composer", truncate(&music.artist, TITLE_LIMIT)));
            }
        }

        pairs.push(("encoder", "ffmpeg".to_string()));
        pairs
    }

    /// The `ffmpeg` invocation that copies `input` to `output` with these
    /// tags.
    pub fn command(&self, tools: &ToolPaths, input: &Path, output: &Path) -> ToolCommand {
        let mut command = ToolCommand::new(&tools.ffmpeg)
            .args(["-hide_banner", "-loglevel", tools.log_level.as_arg()])
            .arg("-i")
            .arg(input)
            .args(["-map", "0", "-c", "copy"]);

        for (key, value) in self.metadata_pairs() {
            command = command.arg("-metadata").arg(format!("{key}={value}"));
        }

        command
            .args(["-movflags", "+faststart", "-brand", "mp42", "-y"])
            .arg(output)
            .produces(output)
    }
}

fn clean_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| *c != '"' && *c != '\'')
        .filter(|c| {
            c.is_alphanumeric() || *c == '_' || c.is_whitespace() || "-.,:;!?()".contains(*c)
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_tag_drops_symbols_and_quotes() {
        assert_eq!(clean_tag("  \"rock & roll\" #1 "), "rock  roll 1");
        assert_eq!(clean_tag("@@@"), "");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate("ééé", 2), "éé");
    }
}
