//! A single automated tab.

use crate::actions::{extract_domain, js_string, BrowserActions};
use crate::download::DownloadedFile;
use crate::engine::DomainThrottle;
use crate::error::{BrowserError, Result};
use chromiumoxide::cdp::browser_protocol::browser::{
    DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A browser tab bound to the engine's navigation throttle.
pub struct BrowserPage {
    page: Page,
    throttle: Arc<DomainThrottle>,
    navigation_timeout: Duration,
}

impl BrowserPage {
    pub(crate) fn new(page: Page, throttle: Arc<DomainThrottle>, navigation_timeout: Duration) -> Self {
        Self {
            page,
            throttle,
            navigation_timeout,
        }
    }

    async fn element(&self, selector: &str) -> Result<Element> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))
    }

    /// Click `selector` and wait for the download it triggers to finish.
    ///
    /// The file is written into `dir` under a generated name; the returned
    /// handle carries the name the site suggested.
    pub async fn download_by_clicking(
        &self,
        selector: &str,
        dir: &Path,
        timeout: Duration,
    ) -> Result<DownloadedFile> {
        tokio::fs::create_dir_all(dir).await?;

        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::AllowAndName)
            .download_path(dir.display().to_string())
            .events_enabled(true)
            .build()
            .map_err(BrowserError::Download)?;
        self.page.execute(params).await?;

        let mut begins = self.page.event_listener::<EventDownloadWillBegin>().await?;
        let mut progress = self.page.event_listener::<EventDownloadProgress>().await?;

        self.click(selector).await?;

        let wait = async {
            let begin = begins
                .next()
                .await
                .ok_or_else(|| BrowserError::Download("event stream closed".to_string()))?;
            tracing::debug!(url = %begin.url, name = %begin.suggested_filename, "Download started");

            while let Some(event) = progress.next().await {
                if event.guid != begin.guid {
                    continue;
                }
                match event.state {
                    DownloadProgressState::Completed => {
                        return Ok(DownloadedFile::new(
                            dir.join(&begin.guid),
                            begin.suggested_filename.clone(),
                        ));
                    }
                    DownloadProgressState::Canceled => {
                        return Err(BrowserError::Download(format!(
                            "download of {} was canceled",
                            begin.url
                        )));
                    }
                    DownloadProgressState::InProgress => {}
                }
            }
            Err(BrowserError::Download("event stream closed".to_string()))
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| BrowserError::Timeout(format!("download from {selector}")))?
    }

    /// Close the tab.
    pub async fn close(self) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserActions for BrowserPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        if let Ok(domain) = extract_domain(url) {
            self.throttle.wait(&domain).await;
        }

        tracing::debug!(%url, "Navigating");
        tokio::time::timeout(self.navigation_timeout, self.page.goto(url))
            .await
            .map_err(|_| BrowserError::Timeout(format!("navigation to {url}")))?
            .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        self.page.evaluate("window.history.back()").await?;
        // Same-document history entries never fire a navigation event.
        if tokio::time::timeout(self.navigation_timeout, self.page.wait_for_navigation())
            .await
            .is_err()
        {
            tracing::debug!("No navigation observed after history.back()");
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        self.element(selector)
            .await?
            .click()
            .await?
            .type_str(value)
            .await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.element(selector).await?.click().await?;
        Ok(())
    }

    async fn click_at_offset(&self, selector: &str, dx: f64, dy: f64) -> Result<()> {
        let bounds = self.element(selector).await?.bounding_box().await?;
        self.page
            .click(Point {
                x: bounds.x + dx,
                y: bounds.y + dy,
            })
            .await?;
        Ok(())
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.exists(selector).await? {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!("waiting for {selector}")));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn extract_text(&self, selector: &str) -> Result<String> {
        Ok(self
            .element(selector)
            .await?
            .inner_text()
            .await?
            .unwrap_or_default())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        Ok(self.element(selector).await?.attribute(name).await?)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>> {
        Ok(self
            .element(selector)
            .await?
            .screenshot(CaptureScreenshotFormat::Png)
            .await?)
    }
}
