use statute_browser::BrowserError;
use statute_core::StatuteError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// Network hiccup, timeout, throttling or a 5xx; worth retrying
    #[error("transient fetch failure for {url}: {reason}")]
    TransientFetch { url: String, reason: String },

    #[error("fetch of {url} failed with HTTP {status}")]
    Fetch { url: String, status: u16 },

    /// Neither the challenge nor the expected content showed up in time
    #[error("challenge not resolved: {0}")]
    ChallengeTimeout(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("persistence error at {path}: {reason}")]
    Persistence { path: String, reason: String },

    #[error("handler for {url} exceeded {timeout:?}")]
    HandlerTimeout { url: String, timeout: Duration },

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("invalid selector {selector}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("captcha solving failed: {0}")]
    Captcha(String),

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
}

impl CrawlError {
    /// Whether the orchestrator should retry the job.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientFetch { .. }
                | Self::Browser(BrowserError::Timeout(_) | BrowserError::NavigationError(_))
        )
    }

    pub(crate) fn persistence(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::Persistence {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<StatuteError> for CrawlError {
    fn from(err: StatuteError) -> Self {
        match err {
            StatuteError::Persistence { path, reason } => Self::Persistence { path, reason },
            other => Self::Validation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
