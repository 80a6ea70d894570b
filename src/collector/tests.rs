use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::browser::UiSession;
use crate::collector::channel::ChannelResolver;
use crate::collector::history::{filter_before, HistoryCollector};
use crate::config::{Config, WorkerConfig};
use crate::error::{Result, ScrapeError};
use crate::parser::{PostRecord, PostType};
use crate::targets::ChannelTarget;
use crate::workers::results::NA;

/// Scripted stand-in for a live browser session. Selectors listed in
/// `present` match immediately; everything else times out. `pages` is a
/// strip of HTML snapshots advanced by each scroll. Clicks on a
/// `fail_clicks` selector fail the given number of times with a transient
/// error; clicks on a `fatal_clicks` selector always fail with a session
/// error.
#[derive(Default)]
struct MockSession {
    texts: HashMap<String, String>,
    present: HashSet<String>,
    pages: Mutex<(Vec<String>, usize)>,
    actions: Mutex<Vec<String>>,
    fail_clicks: Mutex<HashMap<String, u32>>,
    fatal_clicks: HashSet<String>,
}

impl MockSession {
    fn new() -> Self {
        Self::default()
    }

    fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    fn with_present(mut self, selector: &str) -> Self {
        self.present.insert(selector.to_string());
        self
    }

    fn with_pages(self, pages: Vec<String>) -> Self {
        *self.pages.lock().unwrap() = (pages, 0);
        self
    }

    fn failing_clicks(self, selector: &str, failures: u32) -> Self {
        self.fail_clicks
            .lock()
            .unwrap()
            .insert(selector.to_string(), failures);
        self
    }

    fn fatal_clicks(mut self, selector: &str) -> Self {
        self.fatal_clicks.insert(selector.to_string());
        self
    }

    fn action_count(&self, action: &str) -> usize {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.as_str() == action)
            .count()
    }
}

#[async_trait]
impl UiSession for MockSession {
    async fn click(&self, selector: &str) -> Result<()> {
        self.actions
            .lock()
            .unwrap()
            .push(format!("click:{}", selector));
        if self.fatal_clicks.contains(selector) {
            return Err(ScrapeError::Session(format!("target crashed: {}", selector)).into());
        }
        let mut failures = self.fail_clicks.lock().unwrap();
        if let Some(remaining) = failures.get_mut(selector) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ScrapeError::Browser(format!("node detached: {}", selector)).into());
            }
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.actions
            .lock()
            .unwrap()
            .push(format!("type:{}:{}", selector, text));
        Ok(())
    }

    async fn clear_input(&self, selector: &str) -> Result<()> {
        self.actions
            .lock()
            .unwrap()
            .push(format!("clear:{}", selector));
        Ok(())
    }

    async fn text_of(&self, selector: &str) -> Result<String> {
        self.texts
            .get(selector)
            .cloned()
            .ok_or_else(|| ScrapeError::Browser(format!("no text node: {}", selector)).into())
    }

    async fn exists(&self, selector: &str) -> bool {
        self.present.contains(selector)
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<()> {
        if self.present.contains(selector) {
            Ok(())
        } else {
            Err(ScrapeError::Timeout(format!("selector never matched: {}", selector)).into())
        }
    }

    async fn scroll_up(&self, selector: &str, _pixels: i64) -> Result<()> {
        self.actions
            .lock()
            .unwrap()
            .push(format!("scroll:{}", selector));
        let mut pages = self.pages.lock().unwrap();
        if pages.1 + 1 < pages.0.len() {
            pages.1 += 1;
        }
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        let pages = self.pages.lock().unwrap();
        pages
            .0
            .get(pages.1)
            .cloned()
            .ok_or_else(|| ScrapeError::Session("no page loaded".to_string()).into())
    }
}

fn fast_workers() -> WorkerConfig {
    WorkerConfig {
        count: 1,
        stagger_delay_ms: 0,
        max_retries: 2,
        retry_backoff_ms: 1,
        channel_timeout_ms: 5_000,
        ui_settle_ms: 1,
    }
}

fn target(name: &str, exact: bool) -> ChannelTarget {
    ChannelTarget {
        group: "News".to_string(),
        name: name.to_string(),
        link: "https://whatsapp.com/channel/x".to_string(),
        exact_match: exact,
    }
}

const STEP_TIMEOUT: Duration = Duration::from_millis(10);

#[tokio::test]
async fn test_resolver_happy_path() {
    let locators = Config::default().locators;
    let workers = fast_workers();
    let session = MockSession::new()
        .with_present(&locators.result_fuzzy)
        .with_present(&locators.info_followers)
        .with_text(&locators.info_followers, "12,345 followers")
        .with_text(&locators.info_name, " Aaj Tak ");

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    let result = resolver
        .resolve(&target("Aaj Tak", false))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.channel_name, "Aaj Tak");
    assert_eq!(result.metric, "12345");
    assert_eq!(session.action_count(&format!("clear:{}", locators.search_box)), 1);
    assert_eq!(
        session.action_count(&format!("type:{}:Aaj Tak", locators.search_box)),
        1
    );
}

#[tokio::test]
async fn test_resolver_exact_match_selector() {
    let locators = Config::default().locators;
    let workers = fast_workers();
    let exact_locator = locators.result_exact("Aaj Tak");
    // only the exact-title locator is present; fuzzy matching would time out
    let session = MockSession::new()
        .with_present(&exact_locator)
        .with_present(&locators.info_followers)
        .with_text(&locators.info_followers, "500 followers")
        .with_text(&locators.info_name, "Aaj Tak");

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    let result = resolver
        .resolve(&target("Aaj Tak", true))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.metric, "500");
    assert_eq!(session.action_count(&format!("click:{}", exact_locator)), 1);
}

#[tokio::test]
async fn test_resolver_not_found_is_terminal() {
    let locators = Config::default().locators;
    let workers = fast_workers();
    // no search result selector present at all
    let session = MockSession::new();

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    assert!(resolver
        .resolve(&target("XYZUnknown", false))
        .await
        .unwrap()
        .is_none());

    // a missing channel must not burn retries
    assert_eq!(session.action_count(&format!("click:{}", locators.search_box)), 1);
}

#[tokio::test]
async fn test_resolver_unparseable_metric_degrades_to_sentinel() {
    let locators = Config::default().locators;
    let workers = fast_workers();
    let session = MockSession::new()
        .with_present(&locators.result_fuzzy)
        .with_present(&locators.info_followers)
        .with_text(&locators.info_followers, "loading...")
        .with_text(&locators.info_name, "Aaj Tak");

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    let result = resolver
        .resolve(&target("Aaj Tak", false))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.metric, NA);
    assert_eq!(result.channel_name, "Aaj Tak");
}

#[tokio::test]
async fn test_resolver_falls_back_to_requested_name() {
    let locators = Config::default().locators;
    let workers = fast_workers();
    // info panel has no name node
    let session = MockSession::new()
        .with_present(&locators.result_fuzzy)
        .with_present(&locators.info_followers)
        .with_text(&locators.info_followers, "42 followers");

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    let result = resolver
        .resolve(&target("Mint", false))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.channel_name, "Mint");
    assert_eq!(result.metric, "42");
}

#[tokio::test]
async fn test_resolver_retries_transient_failure() {
    let locators = Config::default().locators;
    let workers = fast_workers();
    let session = MockSession::new()
        .with_present(&locators.result_fuzzy)
        .with_present(&locators.info_followers)
        .with_text(&locators.info_followers, "1,000 followers")
        .with_text(&locators.info_name, "Aaj Tak")
        .failing_clicks(&locators.channel_header, 1);

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    let result = resolver
        .resolve(&target("Aaj Tak", false))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.metric, "1000");
    assert_eq!(
        session.action_count(&format!("click:{}", locators.channel_header)),
        2
    );
}

#[tokio::test]
async fn test_resolver_gives_up_after_max_retries() {
    let locators = Config::default().locators;
    let workers = fast_workers();
    let session = MockSession::new()
        .with_present(&locators.result_fuzzy)
        .with_present(&locators.info_followers)
        .with_text(&locators.info_followers, "1,000 followers")
        .failing_clicks(&locators.channel_header, 10);

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    assert!(resolver
        .resolve(&target("Aaj Tak", false))
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        session.action_count(&format!("click:{}", locators.channel_header)),
        workers.max_retries as usize
    );
}

#[tokio::test]
async fn test_resolver_stops_within_channel_budget() {
    let locators = Config::default().locators;
    // generous retry counter, but the wall-clock budget is already spent after
    // the first failed attempt
    let mut workers = fast_workers();
    workers.max_retries = 10;
    workers.channel_timeout_ms = 1;

    let session = MockSession::new()
        .with_present(&locators.result_fuzzy)
        .with_present(&locators.info_followers)
        .failing_clicks(&locators.channel_header, u32::MAX);

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    assert!(resolver
        .resolve(&target("Aaj Tak", false))
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        session.action_count(&format!("click:{}", locators.channel_header)),
        1
    );
}

#[tokio::test]
async fn test_resolver_session_error_stops_retrying() {
    let locators = Config::default().locators;
    let mut workers = fast_workers();
    workers.max_retries = 5;

    let session = MockSession::new()
        .with_present(&locators.result_fuzzy)
        .with_present(&locators.info_followers)
        .fatal_clicks(&locators.channel_header);

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    // a dead session is not worth retrying; the error escapes to the worker
    assert!(resolver.resolve(&target("Aaj Tak", false)).await.is_err());
    assert_eq!(
        session.action_count(&format!("click:{}", locators.channel_header)),
        1
    );
}

#[tokio::test]
async fn test_open_selects_without_info_panel() {
    let locators = Config::default().locators;
    let workers = fast_workers();
    let session = MockSession::new().with_present(&locators.result_fuzzy);

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    assert!(resolver.open(&target("Aaj Tak", false)).await.unwrap());
    assert_eq!(
        session.action_count(&format!("click:{}", locators.channel_header)),
        0
    );
}

#[tokio::test]
async fn test_open_stops_within_channel_budget() {
    let locators = Config::default().locators;
    let mut workers = fast_workers();
    workers.max_retries = 10;
    workers.channel_timeout_ms = 1;

    let session = MockSession::new()
        .with_present(&locators.result_fuzzy)
        .failing_clicks(&locators.result_fuzzy, u32::MAX);

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    assert!(!resolver.open(&target("Aaj Tak", false)).await.unwrap());
    assert_eq!(
        session.action_count(&format!("click:{}", locators.result_fuzzy)),
        1
    );
}

#[tokio::test]
async fn test_open_session_error_escapes() {
    let locators = Config::default().locators;
    let workers = fast_workers();
    let session = MockSession::new()
        .with_present(&locators.result_fuzzy)
        .fatal_clicks(&locators.search_box);

    let resolver = ChannelResolver::new(&session, &locators, &workers, STEP_TIMEOUT);
    assert!(resolver.open(&target("Aaj Tak", false)).await.is_err());
    assert_eq!(
        session.action_count(&format!("click:{}", locators.search_box)),
        1
    );
}

fn post_html(text: &str, timestamp: &str) -> String {
    format!(
        r#"<div class="message-in">
          <div class="copyable-text" data-pre-plain-text="[{}] Aaj Tak: ">{}</div>
        </div>"#,
        timestamp, text
    )
}

#[tokio::test]
async fn test_history_dedup_across_scroll_passes() {
    let config = Config::default();
    let mut collect = config.collect.clone();
    collect.scroll_passes = 2;
    collect.scroll_pause_ms = 1;

    let page_one = format!(
        "<div id=\"main\">{}{}</div>",
        post_html("newest post", "10:00, 20/08/2025"),
        post_html("middle post", "09:00, 20/08/2025"),
    );
    // scrolling back keeps the middle post rendered and reveals an older one
    let page_two = format!(
        "<div id=\"main\">{}{}</div>",
        post_html("middle post", "09:00, 20/08/2025"),
        post_html("older post", "18:00, 19/08/2025"),
    );

    let session = MockSession::new().with_pages(vec![page_one, page_two]);
    let collector = HistoryCollector::new(&session, &config.locators, &collect).unwrap();
    let records = collector.collect("Aaj Tak", "News").await.unwrap();

    let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["newest post", "middle post", "older post"]);
    assert_eq!(
        session.action_count(&format!("scroll:{}", config.locators.history_container)),
        2
    );
}

#[tokio::test]
async fn test_history_halts_at_lower_date_bound() {
    let config = Config::default();
    let mut collect = config.collect.clone();
    collect.scroll_passes = 5;
    collect.scroll_pause_ms = 1;
    collect.from_date = Some("19/08/2025".to_string());

    let page = format!(
        "<div id=\"main\">{}{}{}</div>",
        post_html("in range", "10:00, 20/08/2025"),
        post_html("on the bound", "10:00, 19/08/2025"),
        post_html("past the bound", "10:00, 18/08/2025"),
    );

    let session = MockSession::new().with_pages(vec![page]);
    let collector = HistoryCollector::new(&session, &config.locators, &collect).unwrap();
    let records = collector.collect("Aaj Tak", "News").await.unwrap();

    // the bound post itself is discarded and nothing older is kept
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content, "in range");
    assert_eq!(
        session.action_count(&format!("scroll:{}", config.locators.history_container)),
        0
    );
}

#[tokio::test]
async fn test_history_undated_posts_survive_date_bound() {
    let config = Config::default();
    let mut collect = config.collect.clone();
    collect.scroll_passes = 1;
    collect.scroll_pause_ms = 1;
    collect.from_date = Some("19/08/2025".to_string());

    let page = r#"<div id="main">
      <div class="message-in"><video src="blob:x"></video></div>
    </div>"#
        .to_string();

    let session = MockSession::new().with_pages(vec![page]);
    let collector = HistoryCollector::new(&session, &config.locators, &collect).unwrap();
    let records = collector.collect("Aaj Tak", "News").await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].post_type, PostType::Video);
}

fn record(content: &str, timestamp: Option<&str>) -> PostRecord {
    PostRecord {
        channel: "Aaj Tak".to_string(),
        category: "News".to_string(),
        content: content.to_string(),
        post_type: PostType::Text,
        timestamp: timestamp.map(str::to_string),
        reactions: 0,
        links: Vec::new(),
    }
}

#[test]
fn test_filter_before_no_bound_keeps_all() {
    let records = vec![
        record("a", Some("10:00, 20/08/2025")),
        record("b", None),
    ];
    assert_eq!(filter_before(records, None).len(), 2);
}

#[test]
fn test_filter_before_drops_bound_day_and_later() {
    let bound = chrono::NaiveDate::from_ymd_opt(2025, 8, 20).unwrap();
    let records = vec![
        record("older", Some("10:00, 19/08/2025")),
        record("on the day", Some("10:00, 20/08/2025")),
        record("newer", Some("10:00, 21/08/2025")),
        record("undated", None),
    ];

    let kept = filter_before(records, Some(bound));
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].content, "older");
}
