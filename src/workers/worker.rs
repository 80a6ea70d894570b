use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::browser::SessionManager;
use crate::collector::{ChannelResolver, HistoryCollector};
use crate::config::Config;
use crate::error::Result;
use crate::parser::PostRecord;
use crate::targets::ChannelTarget;
use crate::workers::results::ResultSet;

/// Split `total` targets into at most `slots` contiguous, disjoint ranges.
/// Earlier ranges absorb the remainder, so sizes differ by at most one.
pub fn partition_targets(total: usize, slots: usize) -> Vec<Range<usize>> {
    if total == 0 || slots == 0 {
        return Vec::new();
    }
    let slots = slots.min(total);
    let base = total / slots;
    let remainder = total % slots;

    let mut ranges = Vec::with_capacity(slots);
    let mut start = 0;
    for slot in 0..slots {
        let len = base + usize::from(slot < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// One worker: owns a browser session for the duration of its partition and
/// returns everything it collected. Nothing is shared with other workers
/// while it runs.
pub struct Worker {
    id: usize,
    config: Arc<Config>,
}

impl Worker {
    pub fn new(id: usize, config: Arc<Config>) -> Self {
        Self { id, config }
    }

    /// Resolve follower counts for every target in `range`, in index order.
    /// A channel that cannot be resolved is skipped; its index stays absent
    /// from the returned set. Session-level failures abort the whole worker.
    pub async fn run_followers(
        self,
        targets: Arc<Vec<ChannelTarget>>,
        range: Range<usize>,
    ) -> Result<ResultSet> {
        info!(
            "Worker {}: starting followers run for targets {}..{}",
            self.id, range.start, range.end
        );

        let manager = SessionManager::new(self.config.session.clone());
        let session = manager.launch().await?;
        if let Err(e) = session.bootstrap(&self.config.locators).await {
            session.shutdown().await;
            return Err(e);
        }

        let step_timeout = Duration::from_millis(self.config.session.ui_step_timeout_ms);
        let mut set = ResultSet::new();
        let mut failure = None;
        {
            let resolver = ChannelResolver::new(
                &session,
                &self.config.locators,
                &self.config.workers,
                step_timeout,
            );
            for index in range {
                let target = &targets[index];
                match resolver.resolve(target).await {
                    Ok(Some(result)) => {
                        info!(
                            "Worker {}: [{}] '{}' -> {}",
                            self.id, index, result.channel_name, result.metric
                        );
                        set.record(index, result);
                    }
                    Ok(None) => {
                        warn!("Worker {}: [{}] '{}' unresolved", self.id, index, target.name)
                    }
                    Err(e) => {
                        warn!(
                            "Worker {}: session failed at [{}] '{}': {}",
                            self.id, index, target.name, e
                        );
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        session.shutdown().await;
        if let Some(e) = failure {
            return Err(e);
        }
        info!("Worker {}: resolved {} channels", self.id, set.len());
        Ok(set)
    }

    /// Collect post history for every target in `range`. Channels that cannot
    /// be opened contribute nothing. Session-level failures abort the worker.
    pub async fn run_posts(
        self,
        targets: Arc<Vec<ChannelTarget>>,
        range: Range<usize>,
    ) -> Result<Vec<PostRecord>> {
        info!(
            "Worker {}: starting posts run for targets {}..{}",
            self.id, range.start, range.end
        );

        let manager = SessionManager::new(self.config.session.clone());
        let session = manager.launch().await?;
        if let Err(e) = session.bootstrap(&self.config.locators).await {
            session.shutdown().await;
            return Err(e);
        }

        let step_timeout = Duration::from_millis(self.config.session.ui_step_timeout_ms);
        let mut records = Vec::new();
        let mut failure = None;
        {
            let resolver = ChannelResolver::new(
                &session,
                &self.config.locators,
                &self.config.workers,
                step_timeout,
            );
            let collector =
                HistoryCollector::new(&session, &self.config.locators, &self.config.collect)?;

            for index in range {
                let target = &targets[index];
                match resolver.open(target).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!("Worker {}: [{}] '{}' not opened", self.id, index, target.name);
                        continue;
                    }
                    Err(e) => {
                        warn!(
                            "Worker {}: session failed at [{}] '{}': {}",
                            self.id, index, target.name, e
                        );
                        failure = Some(e);
                        break;
                    }
                }
                match collector.collect(&target.name, &target.group).await {
                    Ok(mut posts) => {
                        info!(
                            "Worker {}: [{}] '{}' -> {} posts",
                            self.id,
                            index,
                            target.name,
                            posts.len()
                        );
                        records.append(&mut posts);
                    }
                    Err(e) => {
                        warn!(
                            "Worker {}: [{}] '{}' history failed: {}",
                            self.id, index, target.name, e
                        );
                    }
                }
            }
        }

        session.shutdown().await;
        if let Some(e) = failure {
            return Err(e);
        }
        info!("Worker {}: collected {} posts", self.id, records.len());
        Ok(records)
    }
}
