use chrono::NaiveDate;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::browser::UiSession;
use crate::config::{CollectConfig, LocatorConfig};
use crate::error::Result;
use crate::parser::{HistoryParser, PostRecord};

/// Pixels scrolled backwards per pass.
const SCROLL_STEP: i64 = 1_000;

/// Walks a channel's history backwards, extracting every rendered post on
/// each pass until a stop condition fires.
pub struct HistoryCollector<'a> {
    session: &'a dyn UiSession,
    locators: &'a LocatorConfig,
    collect: &'a CollectConfig,
    parser: HistoryParser,
}

impl<'a> HistoryCollector<'a> {
    pub fn new(
        session: &'a dyn UiSession,
        locators: &'a LocatorConfig,
        collect: &'a CollectConfig,
    ) -> Result<Self> {
        Ok(Self {
            session,
            locators,
            collect,
            parser: HistoryParser::new()?,
        })
    }

    /// Collect posts for one opened channel. Stops after `scroll_passes`
    /// passes, or immediately when a post dated on or before `from_date`
    /// appears (that post is discarded). The seen-set lives and dies with
    /// this call.
    pub async fn collect(&self, channel: &str, category: &str) -> Result<Vec<PostRecord>> {
        let from_date = self.collect.from_date()?;
        let pause = Duration::from_millis(self.collect.scroll_pause_ms);

        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::new();

        'passes: for pass in 0..self.collect.scroll_passes {
            let html = self.session.html().await?;

            for record in self.parser.parse_history(&html, channel, category) {
                if let (Some(bound), Some(date)) = (from_date, record.parsed_date()) {
                    if date <= bound {
                        debug!(
                            "[{}] Reached {} (bound {}), halting scroll",
                            channel, date, bound
                        );
                        break 'passes;
                    }
                }

                let key = record.dedup_key(self.collect.content_prefix_len);
                if seen.insert(key) {
                    records.push(record);
                }
            }

            self.session
                .scroll_up(&self.locators.history_container, SCROLL_STEP)
                .await?;
            sleep(pause).await;
            debug!(
                "[{}] Scroll {}/{} -> {} posts",
                channel,
                pass + 1,
                self.collect.scroll_passes,
                records.len()
            );
        }

        info!("[{}] Collected {} posts", channel, records.len());
        Ok(records)
    }
}

/// Drop records dated on or after `to_date`. Records whose timestamp does not
/// parse are dropped too; an unverifiable date cannot be shown to satisfy the
/// bound.
pub fn filter_before(records: Vec<PostRecord>, to_date: Option<NaiveDate>) -> Vec<PostRecord> {
    match to_date {
        None => records,
        Some(bound) => records
            .into_iter()
            .filter(|record| match record.parsed_date() {
                Some(date) => date < bound,
                None => false,
            })
            .collect(),
    }
}
