//! Interstitial challenge detection and resolution.
//!
//! After every navigation a page is either showing the expected content or a
//! challenge. [`ChallengeHandler::detect`] polls for either marker with a
//! bound; [`ChallengeHandler::solve`] clears a challenge interactively or via
//! a [`CaptchaSolver`]; [`ChallengeHandler::pass`] combines both and
//! re-verifies the content.

use crate::captcha::CaptchaSolver;
use crate::error::{CrawlError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use statute_browser::{js_string, BrowserActions};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL: Duration = Duration::from_millis(100);

/// What a page is showing after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    /// The challenge marker is present
    ChallengeDetected,
    /// The content marker is present
    ContentReady,
}

/// Selectors telling challenge, content and index pages apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMarkers {
    /// Present only while a challenge is shown
    pub challenge: String,
    /// Present once the expected content is shown
    pub content: String,
    /// Present on the index page `back_to_index` returns to
    pub index: String,
}

/// The challenge widget and how to operate it.
#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeWidget {
    /// Checkbox challenge rendered in a cross-origin frame
    Interactive {
        /// The checkbox frame
        anchor_frame: String,
        /// Where the checkbox sits inside the frame
        checkbox_offset: (f64, f64),
        /// Element carrying the site key
        site_key: String,
        /// Hidden field receiving the response token
        response_field: String,
        /// Form submit button
        submit: String,
    },
    /// Distorted-text image
    Image {
        /// The image element
        image: String,
        /// Text input receiving the answer
        answer_field: String,
        /// Form submit button
        submit: String,
    },
}

impl ChallengeWidget {
    /// The standard reCAPTCHA v2 checkbox.
    pub fn recaptcha() -> Self {
        Self::Interactive {
            anchor_frame: "iframe[src*='recaptcha/api2/anchor']".to_string(),
            checkbox_offset: (28.0, 30.0),
            site_key: "[data-sitekey]".to_string(),
            response_field: "#g-recaptcha-response".to_string(),
            submit: "input[type=\"submit\"]".to_string(),
        }
    }
}

/// Detects and clears challenges on a browser page.
#[derive(Clone)]
pub struct ChallengeHandler {
    markers: ChallengeMarkers,
    widget: ChallengeWidget,
    solver: Option<Arc<dyn CaptchaSolver>>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ChallengeHandler {
    /// Handler with the default 30 s bound and 100 ms polling.
    pub fn new(markers: ChallengeMarkers, widget: ChallengeWidget) -> Self {
        Self {
            markers,
            widget,
            solver: None,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL,
        }
    }

    /// reCAPTCHA v2 challenge in front of `content`, returning to `index`.
    pub fn recaptcha(content: impl Into<String>, index: impl Into<String>) -> Self {
        Self::new(
            ChallengeMarkers {
                challenge: "iframe[src*='recaptcha/api2']".to_string(),
                content: content.into(),
                index: index.into(),
            },
            ChallengeWidget::recaptcha(),
        )
    }

    /// Use a solving service instead of the interactive path.
    #[must_use]
    pub fn with_solver(mut self, solver: Option<Arc<dyn CaptchaSolver>>) -> Self {
        self.solver = solver;
        self
    }

    /// Override the wait bound and poll interval.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Selectors in use.
    pub fn markers(&self) -> &ChallengeMarkers {
        &self.markers
    }

    /// Wait until the page shows either the challenge or the content.
    pub async fn detect<B: BrowserActions + ?Sized>(&self, page: &B) -> Result<ChallengeState> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if page.exists(&self.markers.challenge).await? {
                tracing::debug!("Challenge detected");
                return Ok(ChallengeState::ChallengeDetected);
            }
            if page.exists(&self.markers.content).await? {
                return Ok(ChallengeState::ContentReady);
            }
            if Instant::now() >= deadline {
                return Err(CrawlError::ChallengeTimeout(format!(
                    "neither {} nor {} appeared within {:?}",
                    self.markers.challenge, self.markers.content, self.timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Clear the challenge currently shown and submit.
    pub async fn solve<B: BrowserActions + ?Sized>(&self, page: &B) -> Result<()> {
        match (&self.widget, &self.solver) {
            (
                ChallengeWidget::Interactive {
                    anchor_frame,
                    checkbox_offset,
                    response_field,
                    submit,
                    ..
                },
                None,
            ) => {
                tracing::info!("Solving challenge interactively");
                page.wait_for_selector(anchor_frame, millis(self.timeout))
                    .await?;
                page.click_at_offset(anchor_frame, checkbox_offset.0, checkbox_offset.1)
                    .await?;
                self.wait_for_token(page, response_field).await?;
                page.click(submit).await?;
            }
            (
                ChallengeWidget::Interactive {
                    site_key,
                    response_field,
                    submit,
                    ..
                },
                Some(solver),
            ) => {
                let key = page
                    .attribute(site_key, "data-sitekey")
                    .await?
                    .ok_or_else(|| CrawlError::Captcha("challenge has no site key".to_string()))?;
                let url = page.current_url().await?;
                tracing::info!(%url, "Solving challenge via service");

                let token = solver.solve_interactive_challenge(&key, &url).await?;
                let script = format!(
                    "(() => {{ const f = document.querySelector({}); if (!f) return false; \
                     f.style.display = 'block'; f.value = {}; return true; }})()",
                    js_string(response_field),
                    js_string(&token)
                );
                if page.evaluate(&script).await?.as_bool() != Some(true) {
                    return Err(CrawlError::Captcha(format!(
                        "response field {response_field} missing"
                    )));
                }
                page.click(submit).await?;
            }
            (
                ChallengeWidget::Image {
                    image,
                    answer_field,
                    submit,
                },
                Some(solver),
            ) => {
                let png = page.screenshot_element(image).await?;
                let answer = solver.solve_image(&BASE64.encode(png)).await?;
                page.fill_field(answer_field, &answer).await?;
                page.click(submit).await?;
            }
            (ChallengeWidget::Image { .. }, None) => {
                return Err(CrawlError::Captcha(
                    "image challenges need a solving service".to_string(),
                ));
            }
        }
        Ok(())
    }

    async fn wait_for_token<B: BrowserActions + ?Sized>(
        &self,
        page: &B,
        response_field: &str,
    ) -> Result<()> {
        let script = format!(
            "(() => {{ const f = document.querySelector({}); return !!f && f.value.length > 0; }})()",
            js_string(response_field)
        );
        let deadline = Instant::now() + self.timeout;
        loop {
            if page.evaluate(&script).await?.as_bool() == Some(true) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CrawlError::ChallengeTimeout(
                    "checkbox was not accepted".to_string(),
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Make sure the content is showing, clearing one challenge if needed.
    ///
    /// Callers typically retry this step on [`CrawlError::ChallengeTimeout`].
    pub async fn pass<B: BrowserActions + ?Sized>(&self, page: &B) -> Result<()> {
        if self.detect(page).await? == ChallengeState::ContentReady {
            return Ok(());
        }
        self.solve(page).await?;
        match self.detect(page).await? {
            ChallengeState::ContentReady => Ok(()),
            ChallengeState::ChallengeDetected => Err(CrawlError::ChallengeTimeout(
                "challenge reappeared after submission".to_string(),
            )),
        }
    }

    /// Navigate back to the index page, stepping over reappearing challenges.
    pub async fn back_to_index<B: BrowserActions + ?Sized>(&self, page: &B) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        page.go_back().await?;
        loop {
            if page.exists(&self.markers.index).await? {
                return Ok(());
            }
            if page.exists(&self.markers.challenge).await? {
                tracing::debug!("Challenge on the way back, stepping back again");
                page.go_back().await?;
            }
            if Instant::now() >= deadline {
                return Err(CrawlError::ChallengeTimeout(format!(
                    "index {} not reached within {:?}",
                    self.markers.index, self.timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use statute_browser::BrowserError;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// A page as a set of present selectors plus a history of pages.
    #[derive(Default)]
    struct FakePage {
        present: Mutex<HashSet<String>>,
        history: Mutex<Vec<Vec<&'static str>>>,
        clicks: Mutex<Vec<String>>,
        scripts: Mutex<Vec<String>>,
        token_ready: Mutex<bool>,
        /// Selectors appearing once the submit button is clicked
        after_submit: Vec<&'static str>,
    }

    impl FakePage {
        fn showing(selectors: &[&'static str]) -> Self {
            let page = Self::default();
            page.show(selectors);
            page
        }

        fn show(&self, selectors: &[&'static str]) {
            let mut present = self.present.lock().unwrap();
            present.clear();
            present.extend(selectors.iter().map(|s| (*s).to_string()));
        }
    }

    #[async_trait]
    impl BrowserActions for FakePage {
        async fn navigate(&self, _url: &str) -> statute_browser::Result<()> {
            Ok(())
        }
        async fn go_back(&self) -> statute_browser::Result<()> {
            let previous = self.history.lock().unwrap().pop().unwrap_or_default();
            self.show(&previous);
            Ok(())
        }
        async fn current_url(&self) -> statute_browser::Result<String> {
            Ok("https://advance.lexis.com/toc".to_string())
        }
        async fn fill_field(&self, selector: &str, value: &str) -> statute_browser::Result<()> {
            self.clicks.lock().unwrap().push(format!("fill {selector}={value}"));
            Ok(())
        }
        async fn click(&self, selector: &str) -> statute_browser::Result<()> {
            self.clicks.lock().unwrap().push(selector.to_string());
            if selector.contains("submit") {
                self.show(&self.after_submit);
            }
            Ok(())
        }
        async fn click_at_offset(&self, selector: &str, _dx: f64, _dy: f64) -> statute_browser::Result<()> {
            self.clicks.lock().unwrap().push(format!("offset {selector}"));
            *self.token_ready.lock().unwrap() = true;
            Ok(())
        }
        async fn exists(&self, selector: &str) -> statute_browser::Result<bool> {
            Ok(self.present.lock().unwrap().contains(selector))
        }
        async fn wait_for_selector(&self, selector: &str, _timeout_ms: u64) -> statute_browser::Result<()> {
            if self.present.lock().unwrap().contains(selector) {
                Ok(())
            } else {
                Err(BrowserError::Timeout(selector.to_string()))
            }
        }
        async fn extract_text(&self, _selector: &str) -> statute_browser::Result<String> {
            Ok(String::new())
        }
        async fn attribute(&self, _selector: &str, name: &str) -> statute_browser::Result<Option<String>> {
            Ok((name == "data-sitekey").then(|| "site-key".to_string()))
        }
        async fn evaluate(&self, script: &str) -> statute_browser::Result<serde_json::Value> {
            self.scripts.lock().unwrap().push(script.to_string());
            if script.contains("f.value = ") {
                return Ok(serde_json::Value::Bool(true));
            }
            Ok(serde_json::Value::Bool(*self.token_ready.lock().unwrap()))
        }
        async fn content(&self) -> statute_browser::Result<String> {
            Ok(String::new())
        }
        async fn screenshot_element(&self, _selector: &str) -> statute_browser::Result<Vec<u8>> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    struct StubSolver;

    #[async_trait]
    impl CaptchaSolver for StubSolver {
        async fn solve_image(&self, base64_image: &str) -> Result<String> {
            Ok(format!("text-for-{base64_image}"))
        }
        async fn solve_interactive_challenge(&self, site_key: &str, _page_url: &str) -> Result<String> {
            Ok(format!("token-for-{site_key}"))
        }
    }

    const CHALLENGE: &str = "iframe[src*='recaptcha/api2']";
    const ANCHOR: &str = "iframe[src*='recaptcha/api2/anchor']";
    const CONTENT: &str = "#TOCTrail li a";
    const INDEX: &str = ".tocContainer";

    fn handler() -> ChallengeHandler {
        ChallengeHandler::recaptcha(CONTENT, INDEX)
            .with_timeout(Duration::from_millis(200), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_detect_content() {
        let page = FakePage::showing(&[CONTENT]);
        assert_eq!(handler().detect(&page).await.unwrap(), ChallengeState::ContentReady);
    }

    #[tokio::test]
    async fn test_detect_challenge() {
        let page = FakePage::showing(&[CHALLENGE, ANCHOR]);
        assert_eq!(
            handler().detect(&page).await.unwrap(),
            ChallengeState::ChallengeDetected
        );
    }

    #[tokio::test]
    async fn test_detect_times_out() {
        let page = FakePage::showing(&["body"]);
        let err = handler().detect(&page).await.unwrap_err();
        assert!(matches!(err, CrawlError::ChallengeTimeout(_)));
    }

    #[tokio::test]
    async fn test_pass_interactive() {
        let page = FakePage {
            after_submit: vec![CONTENT],
            ..FakePage::default()
        };
        page.show(&[CHALLENGE, ANCHOR]);

        handler().pass(&page).await.unwrap();

        let clicks = page.clicks.lock().unwrap();
        assert_eq!(clicks[0], format!("offset {ANCHOR}"));
        assert_eq!(clicks[1], "input[type=\"submit\"]");
    }

    #[tokio::test]
    async fn test_pass_with_solver_injects_token() {
        let page = FakePage {
            after_submit: vec![CONTENT],
            ..FakePage::default()
        };
        page.show(&[CHALLENGE, ANCHOR]);

        handler()
            .with_solver(Some(Arc::new(StubSolver)))
            .pass(&page)
            .await
            .unwrap();

        let scripts = page.scripts.lock().unwrap();
        assert!(scripts.iter().any(|s| s.contains("\"token-for-site-key\"")));
        assert!(page
            .clicks
            .lock()
            .unwrap()
            .iter()
            .all(|c| !c.starts_with("offset")));
    }

    #[tokio::test]
    async fn test_pass_fails_when_challenge_persists() {
        let page = FakePage {
            after_submit: vec![CHALLENGE],
            ..FakePage::default()
        };
        page.show(&[CHALLENGE, ANCHOR]);

        let err = handler().pass(&page).await.unwrap_err();
        assert!(matches!(err, CrawlError::ChallengeTimeout(_)));
    }

    #[tokio::test]
    async fn test_image_challenge() {
        let handler = ChallengeHandler::new(
            ChallengeMarkers {
                challenge: "#captcha".to_string(),
                content: "#results".to_string(),
                index: "#search".to_string(),
            },
            ChallengeWidget::Image {
                image: "#captcha img".to_string(),
                answer_field: "#answer".to_string(),
                submit: "#submit".to_string(),
            },
        )
        .with_timeout(Duration::from_millis(200), Duration::from_millis(5));

        let page = FakePage {
            after_submit: vec!["#results"],
            ..FakePage::default()
        };
        page.show(&["#captcha"]);

        assert!(handler.pass(&page).await.is_err());

        page.show(&["#captcha"]);
        handler
            .with_solver(Some(Arc::new(StubSolver)))
            .pass(&page)
            .await
            .unwrap();
        let clicks = page.clicks.lock().unwrap();
        assert!(clicks.iter().any(|c| c == "fill #answer=text-for-iVBORw=="));
    }

    #[tokio::test]
    async fn test_back_to_index_steps_over_challenge() {
        let page = FakePage::showing(&[CONTENT]);
        *page.history.lock().unwrap() = vec![vec![INDEX], vec![CHALLENGE]];

        handler().back_to_index(&page).await.unwrap();
        assert!(page.exists(INDEX).await.unwrap());
    }

    #[tokio::test]
    async fn test_back_to_index_times_out() {
        let page = FakePage::showing(&[CONTENT]);
        *page.history.lock().unwrap() = vec![vec!["#elsewhere"]];

        let err = handler().back_to_index(&page).await.unwrap_err();
        assert!(matches!(err, CrawlError::ChallengeTimeout(_)));
    }
}
