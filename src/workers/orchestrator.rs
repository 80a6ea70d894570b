use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::collector::filter_before;
use crate::config::Config;
use crate::error::Result;
use crate::parser::PostRecord;
use crate::targets::ChannelTarget;
use crate::workers::results::ResultSet;
use crate::workers::worker::{partition_targets, Worker};

/// Fans the target list out over staggered workers and folds their partial
/// results back together. A crashed worker forfeits only its own partition.
pub struct Orchestrator {
    config: Arc<Config>,
    targets: Arc<Vec<ChannelTarget>>,
}

impl Orchestrator {
    pub fn new(config: Config, targets: Vec<ChannelTarget>) -> Self {
        Self {
            config: Arc::new(config),
            targets: Arc::new(targets),
        }
    }

    /// Run the followers mode end to end and return the merged result set.
    /// Targets no worker completed simply stay absent; the report layer fills
    /// their rows with sentinels.
    pub async fn run_followers(&self) -> Result<ResultSet> {
        let ranges = partition_targets(self.targets.len(), self.config.workers.count);
        info!(
            "Dispatching {} targets across {} workers",
            self.targets.len(),
            ranges.len()
        );

        let stagger = Duration::from_millis(self.config.workers.stagger_delay_ms);
        let mut handles = Vec::with_capacity(ranges.len());
        for (id, range) in ranges.into_iter().enumerate() {
            if id > 0 {
                // staggered so parallel logins don't race on the auth state
                sleep(stagger).await;
            }
            let worker = Worker::new(id, self.config.clone());
            let targets = self.targets.clone();
            handles.push((id, tokio::spawn(worker.run_followers(targets, range))));
        }

        let mut merged = ResultSet::new();
        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(set)) => merged.merge(set),
                Ok(Err(e)) => error!("Worker {} failed: {}", id, e),
                Err(e) => error!("Worker {} panicked: {}", id, e),
            }
        }

        info!(
            "Run complete: {}/{} channels resolved",
            merged.len(),
            self.targets.len()
        );
        Ok(merged)
    }

    /// Run the posts mode end to end. Collected records are filtered against
    /// the upper date bound once, after all workers have reported.
    pub async fn run_posts(&self) -> Result<Vec<PostRecord>> {
        let ranges = partition_targets(self.targets.len(), self.config.workers.count);
        info!(
            "Dispatching {} channels across {} workers",
            self.targets.len(),
            ranges.len()
        );

        let stagger = Duration::from_millis(self.config.workers.stagger_delay_ms);
        let mut handles = Vec::with_capacity(ranges.len());
        for (id, range) in ranges.into_iter().enumerate() {
            if id > 0 {
                sleep(stagger).await;
            }
            let worker = Worker::new(id, self.config.clone());
            let targets = self.targets.clone();
            handles.push((id, tokio::spawn(worker.run_posts(targets, range))));
        }

        let mut records = Vec::new();
        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(mut posts)) => records.append(&mut posts),
                Ok(Err(e)) => error!("Worker {} failed: {}", id, e),
                Err(e) => error!("Worker {} panicked: {}", id, e),
            }
        }

        let records = filter_before(records, self.config.collect.to_date()?);
        info!("Run complete: {} posts after date filtering", records.len());
        Ok(records)
    }

    pub fn targets(&self) -> &[ChannelTarget] {
        &self.targets
    }
}
