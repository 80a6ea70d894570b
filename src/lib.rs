pub mod browser;
pub mod collector;
pub mod config;
pub mod error;
pub mod parser;
pub mod report;
pub mod targets;
pub mod workers;

pub use config::{Config, ConfigManager, FileConfigManager, RunMode};
pub use error::{Result, ScrapeError};
pub use workers::Orchestrator;
