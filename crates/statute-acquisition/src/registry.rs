//! Remote jurisdiction registry.

use serde::Deserialize;
use statute_crawler::HttpFetcher;
use std::sync::Arc;

/// One entry of the registry listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteJurisdiction {
    /// Registry-side id; numeric or string depending on the registry
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub name: String,
}

/// Reads the JSON array of jurisdictions a registry publishes.
#[derive(Clone)]
pub struct RegistryClient {
    fetcher: Arc<dyn HttpFetcher>,
    url: String,
}

impl RegistryClient {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The registry listing, or `None` if it could not be fetched or parsed.
    pub async fn fetch(&self) -> Option<Vec<RemoteJurisdiction>> {
        let body = match self.fetcher.fetch(&self.url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(url = %self.url, "Failed to fetch jurisdiction registry: {}", e);
                return None;
            }
        };

        match serde_json::from_slice::<Vec<RemoteJurisdiction>>(&body) {
            Ok(jurisdictions) => {
                tracing::debug!(url = %self.url, count = jurisdictions.len(), "Fetched jurisdiction registry");
                Some(jurisdictions)
            }
            Err(e) => {
                tracing::error!(url = %self.url, "Malformed jurisdiction registry: {}", e);
                None
            }
        }
    }
}
