use regex::Regex;

/// Follower-count extraction from the channel info panel text.
///
/// WhatsApp renders the count as a thousands-separated integer followed by a
/// locale-dependent unit keyword ("1,234,567 followers", "12,345 सदस्य").
/// Each entry pairs a pattern with the multiplier to apply to its captured
/// number; patterns are tried in order and the first hit wins.
pub struct MetricParser {
    patterns: Vec<(Regex, u64)>,
}

impl MetricParser {
    pub fn new() -> Self {
        let table = [
            // "2.5K followers" style compact counts
            (r"(\d+(?:\.\d+)?)\s*K\s*(?:followers|सदस्य)", 1_000),
            // plain thousands-separated counts, English and Hindi units
            (r"(\d{1,3}(?:,\d{3})*|\d+)\s*(?:followers|सदस्य)", 1),
        ];

        let patterns = table
            .iter()
            .map(|(pattern, multiplier)| {
                // the table is static, a bad pattern is a programming error
                (Regex::new(pattern).expect("invalid metric pattern"), *multiplier)
            })
            .collect();

        Self { patterns }
    }

    /// Parse a follower count out of raw panel text. `None` means the text did
    /// not contain a recognizable count; callers degrade to a sentinel.
    pub fn parse_followers(&self, text: &str) -> Option<u64> {
        for (pattern, multiplier) in &self.patterns {
            if let Some(caps) = pattern.captures(text) {
                let number = caps.get(1)?.as_str().replace(',', "");
                if let Ok(value) = number.parse::<f64>() {
                    return Some((value * *multiplier as f64).round() as u64);
                }
            }
        }
        None
    }
}

impl Default for MetricParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Reaction-count extraction from a reactions button accessibility label.
///
/// Labels come in several shapes ("1,234 in total", "2.5K in total"); the
/// alternatives are tried in order. Unparseable labels count as zero, never as
/// an error.
pub struct ReactionParser {
    patterns: Vec<(Regex, u64)>,
}

impl ReactionParser {
    pub fn new() -> Self {
        let table = [
            (r"(\d+(?:\.\d+)?)\s*K\s+in total", 1_000),
            (r"(\d{1,3}(?:,\d{3})*|\d+)\s+in total", 1),
            (r"(\d+)\s+reaction", 1),
        ];

        let patterns = table
            .iter()
            .map(|(pattern, multiplier)| {
                (Regex::new(pattern).expect("invalid reaction pattern"), *multiplier)
            })
            .collect();

        Self { patterns }
    }

    pub fn parse(&self, label: &str) -> u64 {
        for (pattern, multiplier) in &self.patterns {
            if let Some(caps) = pattern.captures(label) {
                let number = caps
                    .get(1)
                    .map(|m| m.as_str().replace(',', ""))
                    .unwrap_or_default();
                if let Ok(value) = number.parse::<f64>() {
                    return (value * *multiplier as f64).round() as u64;
                }
            }
        }
        0
    }
}

impl Default for ReactionParser {
    fn default() -> Self {
        Self::new()
    }
}
