use super::FetchEngine;
use crate::error::Result;
use crate::job::EngineKind;
use async_trait::async_trait;
use statute_browser::{BrowserEngine, BrowserPage};
use std::sync::Arc;

/// Full browser automation; every job gets a fresh tab.
#[derive(Clone)]
pub struct BrowserFetchEngine {
    browser: Arc<BrowserEngine>,
}

impl BrowserFetchEngine {
    pub fn new(browser: Arc<BrowserEngine>) -> Self {
        Self { browser }
    }

    pub fn browser(&self) -> &Arc<BrowserEngine> {
        &self.browser
    }
}

#[async_trait]
impl FetchEngine for BrowserFetchEngine {
    type Page = BrowserPage;

    fn kind(&self) -> EngineKind {
        EngineKind::Browser
    }

    async fn open(&self, url: &str) -> Result<BrowserPage> {
        Ok(self.browser.new_page(url).await?)
    }

    async fn release(&self, page: BrowserPage) {
        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close browser tab: {}", e);
        }
    }
}
