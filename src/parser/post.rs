use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Content placeholder for posts with no text node (pure media posts).
pub const MEDIA_PLACEHOLDER: &str = "[Media Content]";

/// Timestamp grammar used in the `data-pre-plain-text` attribute, e.g.
/// "17:42, 18/08/2025".
pub const TIMESTAMP_FORMAT: &str = "%H:%M, %d/%m/%Y";

/// Classification priority is Video, then GIF/Image, then Text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostType {
    Video,
    GifImage,
    Text,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Video => "Video",
            PostType::GifImage => "GIF/Image",
            PostType::Text => "Text",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One post extracted from a channel's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub channel: String,
    pub category: String,
    pub content: String,
    pub post_type: PostType,
    /// Raw locale-formatted timestamp string, if the element carried one.
    pub timestamp: Option<String>,
    pub reactions: u64,
    pub links: Vec<String>,
}

impl PostRecord {
    /// Composite key suppressing duplicate rows re-rendered across scroll
    /// passes: raw timestamp plus a content prefix.
    pub fn dedup_key(&self, prefix_len: usize) -> String {
        let prefix: String = self.content.chars().take(prefix_len).collect();
        format!("{}-{}", self.timestamp.as_deref().unwrap_or(""), prefix)
    }

    /// Calendar day of the post, when the timestamp parses.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.timestamp
            .as_deref()
            .and_then(parse_post_timestamp)
            .map(|dt| dt.date())
    }
}

pub fn parse_post_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok()
}
