use crate::error::{BrowserError, Result};

/// Browser actions for automation.
///
/// Implemented by [`crate::BrowserPage`]; traversal code and the challenge
/// handler only depend on this trait so they can run against a fake page.
#[async_trait::async_trait]
pub trait BrowserActions: Send + Sync {
    /// Navigate to a URL and wait for the load event
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Navigate one step back in history
    async fn go_back(&self) -> Result<()>;

    /// URL currently displayed
    async fn current_url(&self) -> Result<String>;

    /// Fill a form field by selector
    async fn fill_field(&self, selector: &str, value: &str) -> Result<()>;

    /// Click an element by selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Click at an offset from the top-left corner of an element.
    ///
    /// Used for widgets rendered inside cross-origin frames, where the inner
    /// document cannot be queried.
    async fn click_at_offset(&self, selector: &str, dx: f64, dy: f64) -> Result<()>;

    /// Whether at least one element matches right now
    async fn exists(&self, selector: &str) -> Result<bool>;

    /// Wait for a selector to appear
    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()>;

    /// Extract text from an element
    async fn extract_text(&self, selector: &str) -> Result<String>;

    /// Read an attribute of the first matching element
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// Evaluate a script and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Serialized document
    async fn content(&self) -> Result<String>;

    /// PNG screenshot of the first matching element
    async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>>;
}

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {e}")))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(ToString::to_string)
}

/// Quote a value as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
