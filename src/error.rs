use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Target list error: {0}")]
    Targets(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

/// What the channel-processing loop should do when an error surfaces.
#[derive(Debug, PartialEq, Eq)]
pub enum Disposition {
    RetryWithBackoff,
    SkipTarget,
    AbandonWorker,
    LogAndContinue,
}

impl ScrapeError {
    pub fn disposition(&self) -> Disposition {
        match self {
            ScrapeError::Browser(_) => Disposition::RetryWithBackoff,
            ScrapeError::Timeout(_) => Disposition::RetryWithBackoff,
            ScrapeError::Session(_) => Disposition::AbandonWorker,
            ScrapeError::Parse(_) => Disposition::LogAndContinue,
            ScrapeError::Targets(_) => Disposition::SkipTarget,
            ScrapeError::Config(_) => Disposition::AbandonWorker,
            ScrapeError::Report(_) => Disposition::AbandonWorker,
            ScrapeError::Worker(_) => Disposition::AbandonWorker,
        }
    }
}

// Conversion implementations for common error types
impl From<std::io::Error> for ScrapeError {
    fn from(err: std::io::Error) -> Self {
        ScrapeError::Report(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Session(err.to_string())
    }
}

impl From<toml::de::Error> for ScrapeError {
    fn from(err: toml::de::Error) -> Self {
        ScrapeError::Config(err.to_string())
    }
}

impl From<csv::Error> for ScrapeError {
    fn from(err: csv::Error) -> Self {
        ScrapeError::Targets(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::Browser(err.to_string())
    }
}
