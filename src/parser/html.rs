use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::ScrapeError;
use crate::parser::metrics::ReactionParser;
use crate::parser::post::{PostRecord, PostType, MEDIA_PLACEHOLDER};

/// html parser for pulling channel posts out of a rendered history view
pub struct HistoryParser {
    row_selector: Selector,
    text_selector: Selector,
    reaction_selector: Selector,
    video_selector: Selector,
    image_selector: Selector,
    timestamp_re: Regex,
    link_re: Regex,
    reactions: ReactionParser,
}

impl HistoryParser {
    // set up a parser with css selectors ready
    pub fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            row_selector: Selector::parse("div.message-in, div.message-out")
                .map_err(|e| ScrapeError::Parse(format!("Invalid row selector: {}", e)))?,
            text_selector: Selector::parse("div.copyable-text")
                .map_err(|e| ScrapeError::Parse(format!("Invalid text selector: {}", e)))?,
            reaction_selector: Selector::parse(r#"button[aria-label*="eaction"]"#)
                .map_err(|e| ScrapeError::Parse(format!("Invalid reaction selector: {}", e)))?,
            video_selector: Selector::parse("video")
                .map_err(|e| ScrapeError::Parse(format!("Invalid video selector: {}", e)))?,
            image_selector: Selector::parse(r#"img[src^="blob"]"#)
                .map_err(|e| ScrapeError::Parse(format!("Invalid image selector: {}", e)))?,
            // "[17:42, 18/08/2025] Channel:" prefix on copyable text
            timestamp_re: Regex::new(r"^\[(.*?)\]")
                .map_err(|e| ScrapeError::Parse(format!("Invalid timestamp pattern: {}", e)))?,
            link_re: Regex::new(r"https?://\S+")
                .map_err(|e| ScrapeError::Parse(format!("Invalid link pattern: {}", e)))?,
            reactions: ReactionParser::new(),
        })
    }

    /// Extract every currently rendered post. Deduplication across scroll
    /// passes is the caller's concern, not the parser's.
    pub fn parse_history(&self, html: &str, channel: &str, category: &str) -> Vec<PostRecord> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();

        for row in document.select(&self.row_selector) {
            records.push(self.parse_row(&row, channel, category));
        }

        debug!("Parsed {} posts from history view", records.len());
        records
    }

    fn parse_row(
        &self,
        row: &scraper::ElementRef,
        channel: &str,
        category: &str,
    ) -> PostRecord {
        let text_node = row.select(&self.text_selector).next();

        let content = text_node
            .map(|node| {
                node.text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<&str>>()
                    .join(" ")
            })
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| MEDIA_PLACEHOLDER.to_string());

        let timestamp = text_node
            .and_then(|node| node.value().attr("data-pre-plain-text"))
            .and_then(|raw| self.timestamp_re.captures(raw.trim()))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());

        let reactions = row
            .select(&self.reaction_selector)
            .next()
            .and_then(|button| button.value().attr("aria-label"))
            .map(|label| self.reactions.parse(label))
            .unwrap_or(0);

        let post_type = if row.select(&self.video_selector).next().is_some() {
            PostType::Video
        } else if row.select(&self.image_selector).next().is_some() {
            PostType::GifImage
        } else {
            PostType::Text
        };

        let links = self.extract_links(&content);

        PostRecord {
            channel: channel.to_string(),
            category: category.to_string(),
            content,
            post_type,
            timestamp,
            reactions,
            links,
        }
    }

    pub fn extract_links(&self, text: &str) -> Vec<String> {
        self.link_re
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}
