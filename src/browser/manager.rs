use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::browser::session::UiSession;
use crate::config::{LocatorConfig, SessionConfig};
use crate::error::{Result, ScrapeError};

const WHATSAPP_URL: &str = "https://web.whatsapp.com/";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Cookie subset persisted between runs. Kept as our own struct so the state
/// file format does not follow CDP type changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    secure: bool,
    http_only: bool,
}

/// Launches one dedicated Chrome per worker. Sessions are never shared.
pub struct SessionManager {
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Launch a browser and open a page on WhatsApp Web. Does not log in;
    /// call [`ChannelSession::bootstrap`] next.
    pub async fn launch(&self) -> Result<ChannelSession> {
        let session_id = Uuid::new_v4();

        // unique user data dir so parallel sessions don't fight over the
        // profile singleton lock
        let user_data_dir = std::env::temp_dir().join(format!(
            "wa-channel-scraper-{}-{}",
            std::process::id(),
            session_id
        ));
        std::fs::create_dir_all(&user_data_dir)
            .map_err(|e| ScrapeError::Browser(format!("Failed to create user data dir: {}", e)))?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .args(vec![
                &format!("--user-data-dir={}", user_data_dir.display()),
                "--no-sandbox",
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--disable-extensions",
                "--disable-plugins",
                "--mute-audio",
                "--no-first-run",
                "--disable-default-apps",
                "--disable-sync",
                "--disable-background-networking",
                "--remote-debugging-port=0",
                "--disable-background-timer-throttling",
                "--disable-renderer-backgrounding",
                "--disable-backgrounding-occluded-windows",
                "--disable-blink-features=AutomationControlled",
                "--disable-logging",
                "--log-level=3",
            ]);
        if self.config.headless {
            builder = builder.args(vec!["--headless=new"]);
        } else {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::Browser(format!("Failed to create browser config: {}", e)))?;

        // Retry browser launch up to 3 times
        let mut last_error = None;
        for attempt in 1..=3 {
            match Browser::launch(browser_config.clone()).await {
                Ok((browser, mut handler)) => {
                    info!("Browser launched for session {} on attempt {}", session_id, attempt);

                    let handler_task = tokio::spawn(async move {
                        while let Some(event) = handler.next().await {
                            if let Err(e) = event {
                                // filter out common websocket deserialization errors
                                let message = e.to_string();
                                if message.contains("data did not match any variant")
                                    || message.contains("untagged enum Message")
                                {
                                    debug!("Ignoring WebSocket deserialization error: {}", e);
                                } else {
                                    warn!("Browser handler error: {}", e);
                                }
                            }
                        }
                        debug!("Browser handler task ended");
                    });

                    let page = browser
                        .new_page(WHATSAPP_URL)
                        .await
                        .map_err(|e| ScrapeError::Browser(format!("Failed to open page: {}", e)))?;

                    return Ok(ChannelSession {
                        id: session_id,
                        browser,
                        page,
                        handler_task,
                        config: self.config.clone(),
                    });
                }
                Err(e) => {
                    error!("Browser launch attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < 3 {
                        sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        }

        Err(ScrapeError::Browser(format!(
            "Failed to launch browser after 3 attempts: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        ))
        .into())
    }
}

/// One exclusive browser session driving WhatsApp Web.
pub struct ChannelSession {
    pub id: Uuid,
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
    config: SessionConfig,
}

impl ChannelSession {
    /// Get the session to a logged-in Channels view.
    ///
    /// Reuses the persisted auth state when one exists; otherwise blocks until
    /// the user completes the QR login, bounded by `login_wait_secs`, and
    /// persists the new state for future runs.
    pub async fn bootstrap(&self, locators: &LocatorConfig) -> Result<()> {
        if self.config.state_path.exists() {
            match self.restore_auth_state(&self.config.state_path).await {
                Ok(count) => {
                    info!("Session {}: restored {} cookies, reloading", self.id, count);
                    self.page
                        .reload()
                        .await
                        .map_err(|e| ScrapeError::Session(format!("Reload failed: {}", e)))?;
                }
                Err(e) => warn!("Session {}: could not restore auth state: {}", self.id, e),
            }
        }

        // interstitial shown on some cold starts
        if self.exists(&locators.continue_button).await {
            debug!("Session {}: dismissing continue dialog", self.id);
            let _ = self.click(&locators.continue_button).await;
            sleep(Duration::from_secs(3)).await;
        }

        let step_timeout = Duration::from_millis(self.config.ui_step_timeout_ms);
        if self.wait_for(&locators.chat_list, step_timeout).await.is_err() {
            if !self.exists(&locators.login_screen).await {
                return Err(ScrapeError::Session(
                    "Neither chat list nor login screen appeared".to_string(),
                )
                .into());
            }

            info!("Session {}: waiting for interactive login...", self.id);
            let login_timeout = Duration::from_secs(self.config.login_wait_secs);
            self.wait_for(&locators.chat_list, login_timeout)
                .await
                .map_err(|_| {
                    ScrapeError::Session(format!(
                        "Login not completed within {}s",
                        self.config.login_wait_secs
                    ))
                })?;

            self.save_auth_state(&self.config.state_path).await?;
            info!("Session {}: logged in and saved auth state", self.id);
        }

        // switch to the channels view
        self.click(&locators.channels_tab).await?;
        sleep(Duration::from_secs(5)).await;

        Ok(())
    }

    async fn save_auth_state(&self, path: &Path) -> Result<()> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| ScrapeError::Session(format!("Failed to read cookies: {}", e)))?;

        let stored: Vec<StoredCookie> = cookies
            .into_iter()
            .map(|c| StoredCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect();

        let blob = serde_json::to_string_pretty(&stored)
            .map_err(|e| ScrapeError::Session(format!("Failed to serialize auth state: {}", e)))?;
        std::fs::write(path, blob)
            .map_err(|e| ScrapeError::Session(format!("Failed to write auth state: {}", e)))?;

        debug!("Session {}: persisted {} cookies to {:?}", self.id, stored.len(), path);
        Ok(())
    }

    async fn restore_auth_state(&self, path: &Path) -> Result<usize> {
        let blob = std::fs::read_to_string(path)
            .map_err(|e| ScrapeError::Session(format!("Failed to read auth state: {}", e)))?;
        let stored: Vec<StoredCookie> = serde_json::from_str(&blob)
            .map_err(|e| ScrapeError::Session(format!("Corrupt auth state file: {}", e)))?;

        let mut params = Vec::with_capacity(stored.len());
        for cookie in &stored {
            let param = CookieParam::builder()
                .name(&cookie.name)
                .value(&cookie.value)
                .domain(&cookie.domain)
                .path(&cookie.path)
                .secure(cookie.secure)
                .http_only(cookie.http_only)
                .build()
                .map_err(|e| ScrapeError::Session(format!("Invalid stored cookie: {}", e)))?;
            params.push(param);
        }

        let count = params.len();
        self.page
            .set_cookies(params)
            .await
            .map_err(|e| ScrapeError::Session(format!("Failed to set cookies: {}", e)))?;
        Ok(count)
    }

    /// Close the page and the browser process.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.page.close().await {
            debug!("Session {}: page close failed: {}", self.id, e);
        }
        if let Err(e) = self.browser.close().await {
            warn!("Session {}: browser close failed: {}", self.id, e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        info!("Session {} shut down", self.id);
    }

    /// Embed a selector into generated JavaScript as a quoted string literal.
    fn js_quote(selector: &str) -> String {
        serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
    }
}

#[async_trait]
impl UiSession for ChannelSession {
    async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ScrapeError::Browser(format!("'{}' not found: {}", selector, e)))?;
        element
            .click()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Click on '{}' failed: {}", selector, e)))?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ScrapeError::Browser(format!("'{}' not found: {}", selector, e)))?;
        element
            .click()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Focus on '{}' failed: {}", selector, e)))?;
        element
            .type_str(text)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Typing into '{}' failed: {}", selector, e)))?;
        Ok(())
    }

    async fn clear_input(&self, selector: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (el) {{ \
             el.focus(); document.execCommand('selectAll', false, null); \
             document.execCommand('delete', false, null); }} }})()",
            sel = Self::js_quote(selector)
        );
        self.page
            .evaluate(script)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Clearing '{}' failed: {}", selector, e)))?;
        Ok(())
    }

    async fn text_of(&self, selector: &str) -> Result<String> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ScrapeError::Browser(format!("'{}' not found: {}", selector, e)))?;
        let text = element
            .inner_text()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Reading '{}' failed: {}", selector, e)))?;
        Ok(text.unwrap_or_default())
    }

    async fn exists(&self, selector: &str) -> bool {
        self.page.find_element(selector).await.is_ok()
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::Timeout(selector.to_string()).into());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn scroll_up(&self, selector: &str, pixels: i64) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (el) \
             el.scrollBy(0, -{pixels}); }})()",
            sel = Self::js_quote(selector),
            pixels = pixels
        );
        self.page
            .evaluate(script)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Scroll on '{}' failed: {}", selector, e)))?;
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to get page content: {}", e)).into())
    }
}
