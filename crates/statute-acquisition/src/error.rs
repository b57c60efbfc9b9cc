use statute_browser::BrowserError;
use statute_core::{Category, ConfigError, StatuteError};
use statute_crawler::CrawlError;
use statute_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The driver has no source for this category
    #[error("{jurisdiction} does not provide {category}")]
    Unsupported {
        jurisdiction: String,
        category: Category,
    },

    /// A crawl run finished with failed jobs
    #[error("{category} run for {jurisdiction} finished with {failed} failed job(s)")]
    Incomplete {
        jurisdiction: String,
        category: Category,
        failed: usize,
    },

    #[error("crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Statute(#[from] StatuteError),
}

impl AcquisitionError {
    /// Whether the error only says the category has no source.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

pub type Result<T> = std::result::Result<T, AcquisitionError>;
