use std::collections::BTreeMap;
use tracing::warn;

use crate::targets::ChannelTarget;

/// Metric placeholder when extraction produced nothing usable.
pub const NA: &str = "N/A";
/// Name placeholder for targets no worker completed.
pub const NOT_PROCESSED: &str = "Not processed";

/// What one resolved channel yielded: the in-app name (which can differ from
/// the requested one) and the normalized metric string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionResult {
    pub channel_name: String,
    pub metric: String,
}

/// Results keyed by the target's original list index. Keys double as the set
/// of processed indices, so an index can never hold two results and merging
/// partitions can never lose one.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    entries: BTreeMap<usize, CollectionResult>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result for one target index. First write wins; a second
    /// write for the same index indicates overlapping partitions.
    pub fn record(&mut self, index: usize, result: CollectionResult) {
        if self.entries.contains_key(&index) {
            warn!("Duplicate result for index {}, keeping the first", index);
            return;
        }
        self.entries.insert(index, result);
    }

    /// Fold another partition's results in.
    pub fn merge(&mut self, other: ResultSet) {
        for (index, result) in other.entries {
            self.record(index, result);
        }
    }

    pub fn get(&self, index: usize) -> Option<&CollectionResult> {
        self.entries.get(&index)
    }

    pub fn processed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Assemble the final table: exactly one row per input target, in input
    /// order, with sentinels standing in for anything unprocessed.
    pub fn rows(&self, targets: &[ChannelTarget]) -> Vec<ReportRow> {
        targets
            .iter()
            .enumerate()
            .map(|(index, target)| match self.entries.get(&index) {
                Some(result) => ReportRow {
                    group: target.group.clone(),
                    channel_name: result.channel_name.clone(),
                    link: target.link.clone(),
                    metric: result.metric.clone(),
                },
                None => ReportRow {
                    group: target.group.clone(),
                    channel_name: NOT_PROCESSED.to_string(),
                    link: target.link.clone(),
                    metric: NA.to_string(),
                },
            })
            .collect()
    }
}

/// One line of the followers report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub group: String,
    pub channel_name: String,
    pub link: String,
    pub metric: String,
}
