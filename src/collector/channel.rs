use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::browser::UiSession;
use crate::config::{LocatorConfig, WorkerConfig};
use crate::error::{Disposition, Result, ScrapeError};
use crate::parser::MetricParser;
use crate::targets::ChannelTarget;
use crate::workers::results::{CollectionResult, NA};

/// Where the resolver currently is in the search-select-read-clear sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    Idle,
    Searching,
    Selecting,
    InfoOpen,
    MetricExtracted,
    Cleared,
    Failed,
}

/// Outcome of one resolution attempt.
enum Attempt {
    Resolved(CollectionResult),
    NotFound,
}

/// Drives the search UI to resolve one channel and read its follower count.
pub struct ChannelResolver<'a> {
    session: &'a dyn UiSession,
    locators: &'a LocatorConfig,
    workers: &'a WorkerConfig,
    step_timeout: Duration,
    metrics: MetricParser,
}

impl<'a> ChannelResolver<'a> {
    pub fn new(
        session: &'a dyn UiSession,
        locators: &'a LocatorConfig,
        workers: &'a WorkerConfig,
        step_timeout: Duration,
    ) -> Self {
        Self {
            session,
            locators,
            workers,
            step_timeout,
            metrics: MetricParser::new(),
        }
    }

    /// Resolve one target, retrying transient UI failures up to `max_retries`
    /// within the per-channel wall-clock budget. `Ok(None)` means the target
    /// is given up on; `Err` means the session itself is no longer usable and
    /// the worker should stop.
    pub async fn resolve(&self, target: &ChannelTarget) -> Result<Option<CollectionResult>> {
        let budget = Duration::from_millis(self.workers.channel_timeout_ms);
        let backoff = Duration::from_millis(self.workers.retry_backoff_ms);
        let started = Instant::now();

        let mut attempt = 0;
        while attempt < self.workers.max_retries {
            attempt += 1;
            debug!("Attempt {} for '{}'", attempt, target.name);

            match self.run_attempt(target).await {
                Ok(Attempt::Resolved(result)) => return Ok(Some(result)),
                Ok(Attempt::NotFound) => {
                    warn!("Channel not found: '{}'", target.name);
                    return Ok(None);
                }
                Err(e) => match Self::disposition_of(e.as_ref()) {
                    Disposition::AbandonWorker => {
                        warn!("Session failure for '{}': {}", target.name, e);
                        return Err(e);
                    }
                    Disposition::RetryWithBackoff => {
                        warn!("Attempt {} failed for '{}': {}", attempt, target.name, e);
                        if started.elapsed() >= budget {
                            warn!("Budget exhausted for '{}', abandoning retries", target.name);
                            return Ok(None);
                        }
                        sleep(backoff + Self::jitter(backoff)).await;
                    }
                    Disposition::SkipTarget | Disposition::LogAndContinue => {
                        warn!("Skipping '{}': {}", target.name, e);
                        return Ok(None);
                    }
                },
            }
        }

        warn!("All {} attempts failed for '{}'", self.workers.max_retries, target.name);
        Ok(None)
    }

    /// Search for a channel and open its conversation, without touching the
    /// info panel. Retries and budget behave as in [`resolve`](Self::resolve);
    /// `Ok(false)` means the channel could not be opened.
    pub async fn open(&self, target: &ChannelTarget) -> Result<bool> {
        let budget = Duration::from_millis(self.workers.channel_timeout_ms);
        let backoff = Duration::from_millis(self.workers.retry_backoff_ms);
        let started = Instant::now();

        let mut attempt = 0;
        while attempt < self.workers.max_retries {
            attempt += 1;
            match self.search_and_select(target).await {
                Ok(true) => return Ok(true),
                Ok(false) => {
                    warn!("Channel not found: '{}'", target.name);
                    return Ok(false);
                }
                Err(e) => match Self::disposition_of(e.as_ref()) {
                    Disposition::AbandonWorker => {
                        warn!("Session failure for '{}': {}", target.name, e);
                        return Err(e);
                    }
                    Disposition::RetryWithBackoff => {
                        warn!("Open attempt {} failed for '{}': {}", attempt, target.name, e);
                        if started.elapsed() >= budget {
                            warn!("Budget exhausted for '{}', abandoning retries", target.name);
                            return Ok(false);
                        }
                        sleep(backoff + Self::jitter(backoff)).await;
                    }
                    Disposition::SkipTarget | Disposition::LogAndContinue => {
                        warn!("Skipping '{}': {}", target.name, e);
                        return Ok(false);
                    }
                },
            }
        }
        Ok(false)
    }

    fn disposition_of(error: &(dyn std::error::Error + Send + Sync + 'static)) -> Disposition {
        error
            .downcast_ref::<ScrapeError>()
            .map(ScrapeError::disposition)
            .unwrap_or(Disposition::RetryWithBackoff)
    }

    /// Random slice of the backoff, so retrying workers don't hammer the UI
    /// in lockstep.
    fn jitter(backoff: Duration) -> Duration {
        let quarter = (backoff.as_millis() as u64) / 4;
        Duration::from_millis(rand::thread_rng().gen_range(0..=quarter))
    }

    /// One pass of the state machine, starting from a clean search UI.
    async fn run_attempt(&self, target: &ChannelTarget) -> Result<Attempt> {
        let settle = Duration::from_millis(self.workers.ui_settle_ms);

        if !self.search_and_select(target).await? {
            return Ok(Attempt::NotFound);
        }

        let mut state = ResolveState::InfoOpen;
        debug!(?state, channel = %target.name);
        self.session.click(&self.locators.channel_header).await?;
        self.session
            .wait_for(&self.locators.info_followers, self.step_timeout)
            .await?;
        sleep(settle).await;

        state = ResolveState::MetricExtracted;
        debug!(?state, channel = %target.name);
        let raw = self.session.text_of(&self.locators.info_followers).await?;
        // unparseable metric text degrades to the sentinel, the state machine
        // still advances
        let metric = self
            .metrics
            .parse_followers(&raw)
            .map(|count| count.to_string())
            .unwrap_or_else(|| NA.to_string());

        // the in-app name can differ from the requested one
        let channel_name = self
            .session
            .text_of(&self.locators.info_name)
            .await
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| target.name.clone());

        state = ResolveState::Cleared;
        debug!(?state, channel = %target.name);
        // best effort, a failed clear must not invalidate the metric
        if let Err(e) = self.session.click(&self.locators.clear_search).await {
            debug!("Clear search failed for '{}': {}", target.name, e);
        }

        Ok(Attempt::Resolved(CollectionResult {
            channel_name,
            metric,
        }))
    }

    /// Type the channel name into the search box and click the matching
    /// result. Returns Ok(false) when no result matched within the step
    /// timeout; zero matches is terminal for the target, not transient.
    async fn search_and_select(&self, target: &ChannelTarget) -> Result<bool> {
        let settle = Duration::from_millis(self.workers.ui_settle_ms);
        let mut state = ResolveState::Idle;
        debug!(?state, channel = %target.name);

        state = ResolveState::Searching;
        debug!(?state, channel = %target.name);
        self.session.click(&self.locators.search_box).await?;
        self.session.clear_input(&self.locators.search_box).await?;
        self.session
            .type_text(&self.locators.search_box, &target.name)
            .await?;
        sleep(settle).await;

        state = ResolveState::Selecting;
        debug!(?state, channel = %target.name);
        let result_locator = if target.exact_match {
            self.locators.result_exact(&target.name)
        } else {
            self.locators.result_fuzzy.clone()
        };
        if self
            .session
            .wait_for(&result_locator, self.step_timeout)
            .await
            .is_err()
        {
            state = ResolveState::Failed;
            debug!(?state, channel = %target.name, "no search match");
            return Ok(false);
        }
        self.session.click(&result_locator).await?;
        sleep(settle).await;

        Ok(true)
    }
}
