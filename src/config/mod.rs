use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};

pub const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Followers,
    Posts,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub mode: RunMode,
    pub targets_file: PathBuf,
    pub output_dir: PathBuf,
    pub workers: WorkerConfig,
    pub session: SessionConfig,
    pub collect: CollectConfig,
    pub locators: LocatorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Number of partitions, one browser session each.
    pub count: usize,
    /// Delay between consecutive worker launches, to avoid login contention.
    pub stagger_delay_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Wall-clock budget for one channel, across all retries.
    pub channel_timeout_ms: u64,
    /// Fixed pause after UI steps that need the page to settle.
    pub ui_settle_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    pub headless: bool,
    /// Serialized cookie blob reused across runs to skip the QR login.
    pub state_path: PathBuf,
    pub login_wait_secs: u64,
    pub ui_step_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectConfig {
    pub scroll_passes: u32,
    pub scroll_pause_ms: u64,
    /// Lower date bound (dd/mm/yyyy): halt the scroll loop at the first post
    /// dated on or before this day.
    pub from_date: Option<String>,
    /// Upper date bound (dd/mm/yyyy): drop collected posts dated on or after
    /// this day before the report is written.
    pub to_date: Option<String>,
    pub content_prefix_len: usize,
}

/// Logical UI role -> CSS locator. Injected so a WhatsApp Web DOM change is a
/// config edit, not a code change.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocatorConfig {
    pub search_box: String,
    pub clear_search: String,
    pub channels_tab: String,
    pub channel_header: String,
    pub info_name: String,
    pub info_followers: String,
    /// Landmark that only exists after login has completed.
    pub chat_list: String,
    pub login_screen: String,
    pub continue_button: String,
    /// First-fuzzy-match search result.
    pub result_fuzzy: String,
    /// Template for exact-title matching; `{title}` is substituted.
    pub result_exact_template: String,
    pub history_container: String,
}

impl LocatorConfig {
    /// Resolve the exact-title result locator for one channel name.
    pub fn result_exact(&self, title: &str) -> String {
        let escaped = title.replace('\\', "\\\\").replace('"', "\\\"");
        self.result_exact_template.replace("{title}", &escaped)
    }
}

impl CollectConfig {
    pub fn from_date(&self) -> Result<Option<NaiveDate>> {
        Self::parse_bound(self.from_date.as_deref())
    }

    pub fn to_date(&self) -> Result<Option<NaiveDate>> {
        Self::parse_bound(self.to_date.as_deref())
    }

    fn parse_bound(raw: Option<&str>) -> Result<Option<NaiveDate>> {
        match raw {
            None => Ok(None),
            Some(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map(Some)
                .map_err(|e| {
                    ScrapeError::Config(format!("Invalid date bound '{}': {}", s, e)).into()
                }),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RunMode::Followers,
            targets_file: PathBuf::from("targets.csv"),
            output_dir: PathBuf::from("./reports"),
            workers: WorkerConfig {
                count: 2,
                stagger_delay_ms: 10_000,
                max_retries: 2,
                retry_backoff_ms: 2_000,
                channel_timeout_ms: 120_000,
                ui_settle_ms: 2_000,
            },
            session: SessionConfig {
                headless: true,
                state_path: PathBuf::from("whatsapp_auth_state.json"),
                login_wait_secs: 90,
                ui_step_timeout_ms: 5_000,
            },
            collect: CollectConfig {
                scroll_passes: 120,
                scroll_pause_ms: 1_000,
                from_date: None,
                to_date: None,
                content_prefix_len: 30,
            },
            locators: LocatorConfig {
                search_box: r#"div[contenteditable="true"][data-tab="3"]"#.to_string(),
                clear_search: r#"button[aria-label="Cancel search"]"#.to_string(),
                channels_tab: r#"button[aria-label="Channels"]"#.to_string(),
                channel_header: "#main header".to_string(),
                info_name: r#"section div[role="heading"] span[dir="auto"]"#.to_string(),
                info_followers: r#"section div[data-testid="channel-followers"]"#.to_string(),
                chat_list: r#"div[data-testid="conversation-list"]"#.to_string(),
                login_screen: r#"div[data-testid="qrcode"]"#.to_string(),
                continue_button: r#"div[role="dialog"] button"#.to_string(),
                result_fuzzy: "span.matched-text".to_string(),
                result_exact_template: r#"span[title="{title}"]"#.to_string(),
                history_container: r#"div[data-testid="conversation-panel-messages"]"#
                    .to_string(),
            },
        }
    }
}

#[async_trait::async_trait]
pub trait ConfigManager {
    async fn load_config(&self) -> Result<Config>;
    async fn save_config(&self, config: &Config) -> Result<()>;
    fn validate_config(&self, config: &Config) -> Result<()>;
}

pub struct FileConfigManager {
    config_path: PathBuf,
}

impl FileConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

#[async_trait::async_trait]
impl ConfigManager for FileConfigManager {
    async fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {:?}", self.config_path);

        // check if config file exists, create default if not
        if !self.config_path.exists() {
            warn!(
                "Configuration file not found, creating default config at {:?}",
                self.config_path
            );
            self.create_default_config().await?;
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| ScrapeError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&config_content)
            .map_err(|e| ScrapeError::Config(format!("Failed to parse TOML config: {}", e)))?;

        self.validate_config(&config)?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    async fn save_config(&self, config: &Config) -> Result<()> {
        info!("Saving configuration to {:?}", self.config_path);

        let toml_content = toml::to_string_pretty(config)
            .map_err(|e| ScrapeError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ScrapeError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Configuration saved successfully");
        Ok(())
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        debug!("Validating configuration");

        // checking worker config
        if config.workers.count == 0 {
            return Err(ScrapeError::Config("workers.count must be greater than 0".to_string()).into());
        }
        if config.workers.count > 8 {
            return Err(ScrapeError::Config(
                "workers.count cannot exceed 8, each worker owns a Chrome process".to_string(),
            )
            .into());
        }
        if config.workers.max_retries > 10 {
            return Err(ScrapeError::Config("workers.max_retries cannot exceed 10".to_string()).into());
        }
        if config.workers.channel_timeout_ms == 0 {
            return Err(ScrapeError::Config(
                "workers.channel_timeout_ms must be greater than 0".to_string(),
            )
            .into());
        }

        // checking session config
        if config.session.login_wait_secs == 0 {
            return Err(ScrapeError::Config(
                "session.login_wait_secs must be greater than 0".to_string(),
            )
            .into());
        }
        if config.session.ui_step_timeout_ms == 0 {
            return Err(ScrapeError::Config(
                "session.ui_step_timeout_ms must be greater than 0".to_string(),
            )
            .into());
        }

        // checking collect config
        if config.collect.scroll_passes == 0 {
            return Err(ScrapeError::Config(
                "collect.scroll_passes must be greater than 0".to_string(),
            )
            .into());
        }
        if config.collect.content_prefix_len == 0 {
            return Err(ScrapeError::Config(
                "collect.content_prefix_len must be greater than 0".to_string(),
            )
            .into());
        }
        // date bounds must parse up front, not mid-run
        config.collect.from_date()?;
        config.collect.to_date()?;

        // checking locators
        let locators = [
            ("search_box", &config.locators.search_box),
            ("clear_search", &config.locators.clear_search),
            ("channels_tab", &config.locators.channels_tab),
            ("channel_header", &config.locators.channel_header),
            ("info_name", &config.locators.info_name),
            ("info_followers", &config.locators.info_followers),
            ("chat_list", &config.locators.chat_list),
            ("login_screen", &config.locators.login_screen),
            ("result_fuzzy", &config.locators.result_fuzzy),
            ("history_container", &config.locators.history_container),
        ];
        for (role, locator) in locators {
            if locator.trim().is_empty() {
                return Err(
                    ScrapeError::Config(format!("locators.{} cannot be empty", role)).into(),
                );
            }
        }
        if !config.locators.result_exact_template.contains("{title}") {
            return Err(ScrapeError::Config(
                "locators.result_exact_template must contain a {title} placeholder".to_string(),
            )
            .into());
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

impl FileConfigManager {
    /// Create a default configuration file
    async fn create_default_config(&self) -> Result<()> {
        let default_config = Config::default();
        let toml_content = toml::to_string_pretty(&default_config)
            .map_err(|e| ScrapeError::Config(format!("Failed to serialize default config: {}", e)))?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ScrapeError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ScrapeError::Config(format!("Failed to write default config: {}", e)))?;

        info!("Default configuration file created at {:?}", self.config_path);
        Ok(())
    }
}
