use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{Result, ScrapeError};

/// One channel to process, as loaded from the tracking sheet. Immutable for
/// the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChannelTarget {
    #[serde(rename = "GroupName")]
    pub group: String,
    #[serde(rename = "Channel Name")]
    pub name: String,
    #[serde(rename = "Link/URL")]
    pub link: String,
    /// Require an exact-title search match instead of the first fuzzy hit.
    /// Set for channels whose names collide with unrelated search results.
    #[serde(
        rename = "Exact Match",
        default,
        deserialize_with = "deserialize_flag"
    )]
    pub exact_match: bool,
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_lowercase().as_str() {
        "" | "0" | "no" | "false" => Ok(false),
        "1" | "yes" | "true" => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "invalid Exact Match flag '{}'",
            other
        ))),
    }
}

/// Read the target list once at startup. Row order defines the index space
/// used for partitioning and for final report assembly.
pub fn load_targets(path: &Path) -> Result<Vec<ChannelTarget>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ScrapeError::Targets(format!("Failed to open {:?}: {}", path, e)))?;

    let mut targets = Vec::new();
    for (row, record) in reader.deserialize::<ChannelTarget>().enumerate() {
        let target: ChannelTarget =
            record.map_err(|e| ScrapeError::Targets(format!("Row {}: {}", row + 1, e)))?;
        if target.name.trim().is_empty() {
            return Err(
                ScrapeError::Targets(format!("Row {}: empty channel name", row + 1)).into(),
            );
        }
        targets.push(target);
    }

    if targets.is_empty() {
        return Err(ScrapeError::Targets(format!("No targets found in {:?}", path)).into());
    }

    info!("Loaded {} targets from {:?}", targets.len(), path);
    Ok(targets)
}
