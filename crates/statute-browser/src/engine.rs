use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::page::BrowserPage;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use futures::StreamExt;
use statute_core::BrowserConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Per-domain navigation spacing.
///
/// Callers are delayed until the domain's slot comes up instead of being
/// rejected; concurrent callers for one domain are spaced `min_delay` apart.
#[derive(Debug)]
pub(crate) struct DomainThrottle {
    next_slot: Mutex<HashMap<String, Instant>>,
    min_delay: Duration,
}

impl DomainThrottle {
    pub(crate) fn new(min_delay_ms: u64) -> Self {
        Self {
            next_slot: Mutex::new(HashMap::new()),
            min_delay: Duration::from_millis(min_delay_ms),
        }
    }

    /// Reserve the next slot for `domain` and sleep until it arrives.
    pub(crate) async fn wait(&self, domain: &str) {
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(domain).map_or(now, |next| (*next).max(now));
            slots.insert(domain.to_string(), slot + self.min_delay);
            slot
        };

        let now = Instant::now();
        if slot > now {
            tracing::trace!(domain, wait_ms = (slot - now).as_millis(), "Throttling navigation");
            tokio::time::sleep(slot - now).await;
        }
    }
}

/// Browser automation engine
pub struct BrowserEngine {
    browser: Browser,
    handler_task: JoinHandle<()>,
    fingerprint: FingerprintConfig,
    throttle: Arc<DomainThrottle>,
    navigation_timeout: Duration,
}

impl BrowserEngine {
    /// Launch with default settings
    pub async fn new() -> Result<Self> {
        Self::launch(&BrowserConfig::default()).await
    }

    /// Launch with the given settings and a randomized fingerprint
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        Self::with_fingerprint(config, FingerprintConfig::for_config(config)).await
    }

    /// Launch with a specific fingerprint
    pub async fn with_fingerprint(
        config: &BrowserConfig,
        fingerprint: FingerprintConfig,
    ) -> Result<Self> {
        let mut builder = LaunchConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .request_timeout(Duration::from_secs(config.navigation_timeout_secs))
            .arg(format!("--user-agent={}", fingerprint.user_agent))
            .arg("--disable-dev-shm-usage");
        if !config.headless {
            builder = builder.with_head();
        }
        let launch = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(launch).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!(
            headless = config.headless,
            user_agent = %fingerprint.user_agent,
            "Browser launched"
        );

        Ok(Self {
            browser,
            handler_task,
            fingerprint,
            throttle: Arc::new(DomainThrottle::new(config.min_domain_delay_ms)),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
        })
    }

    /// Fingerprint the browser was launched with
    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }

    /// Open a blank page and navigate it to `url`.
    pub async fn new_page(&self, url: &str) -> Result<BrowserPage> {
        let page = self.browser.new_page("about:blank").await?;
        let page = BrowserPage::new(page, Arc::clone(&self.throttle), self.navigation_timeout);
        crate::BrowserActions::navigate(&page, url).await?;
        Ok(page)
    }

    /// Close the browser and stop the event loop.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        self.handler_task.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_throttle_spaces_same_domain() {
        let throttle = DomainThrottle::new(100);

        let start = Instant::now();
        throttle.wait("advance.lexis.com").await;
        assert!(start.elapsed() < Duration::from_millis(50));

        throttle.wait("advance.lexis.com").await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_throttle_different_domains() {
        let throttle = DomainThrottle::new(200);

        let start = Instant::now();
        throttle.wait("example.com").await;
        throttle.wait("other.com").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
