//! CAPTCHA solving services.

use crate::error::{CrawlError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use statute_core::CaptchaConfig;
use std::time::Duration;

/// Third-party CAPTCHA solver.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Solve an image CAPTCHA given as base64; returns the recognized text.
    async fn solve_image(&self, base64_image: &str) -> Result<String>;

    /// Solve an interactive (checkbox) challenge; returns the response token.
    async fn solve_interactive_challenge(&self, site_key: &str, page_url: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ServiceReply {
    status: u8,
    request: String,
}

const NOT_READY: &str = "CAPCHA_NOT_READY";

/// Client for 2Captcha-compatible services (`in.php` submit, `res.php` poll).
#[derive(Debug, Clone)]
pub struct TwoCaptchaSolver {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl TwoCaptchaSolver {
    /// Solver for `api_key` with the service settings from `config`.
    pub fn new(api_key: impl Into<String>, config: &CaptchaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: config.service_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Solver for the configured key, if there is one.
    pub fn from_config(config: &CaptchaConfig) -> Option<Self> {
        config
            .api_key
            .as_ref()
            .map(|key| Self::new(key.clone(), config))
    }

    /// Override the result poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn submit(&self, params: &[(&str, &str)]) -> Result<String> {
        let mut form = vec![("key", self.api_key.as_str()), ("json", "1")];
        form.extend_from_slice(params);

        let reply: ServiceReply = self
            .client
            .post(format!("{}/in.php", self.base_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| CrawlError::Captcha(format!("submit failed: {e}")))?
            .json()
            .await
            .map_err(|e| CrawlError::Captcha(format!("unreadable submit reply: {e}")))?;

        if reply.status == 1 {
            Ok(reply.request)
        } else {
            Err(CrawlError::Captcha(format!("submit rejected: {}", reply.request)))
        }
    }

    async fn poll(&self, task_id: &str) -> Result<String> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let reply: ServiceReply = self
                .client
                .get(format!("{}/res.php", self.base_url))
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("action", "get"),
                    ("id", task_id),
                    ("json", "1"),
                ])
                .send()
                .await
                .map_err(|e| CrawlError::Captcha(format!("poll failed: {e}")))?
                .json()
                .await
                .map_err(|e| CrawlError::Captcha(format!("unreadable poll reply: {e}")))?;

            match (reply.status, reply.request.as_str()) {
                (1, _) => return Ok(reply.request),
                (_, NOT_READY) => {}
                (_, other) => {
                    return Err(CrawlError::Captcha(format!("task {task_id} failed: {other}")))
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(CrawlError::Captcha(format!(
                    "task {task_id} not solved within {:?}",
                    self.timeout
                )));
            }
        }
    }
}

#[async_trait]
impl CaptchaSolver for TwoCaptchaSolver {
    async fn solve_image(&self, base64_image: &str) -> Result<String> {
        let task = self
            .submit(&[("method", "base64"), ("body", base64_image)])
            .await?;
        tracing::debug!(task = %task, "Image captcha submitted");
        self.poll(&task).await
    }

    async fn solve_interactive_challenge(&self, site_key: &str, page_url: &str) -> Result<String> {
        let task = self
            .submit(&[
                ("method", "userrecaptcha"),
                ("googlekey", site_key),
                ("pageurl", page_url),
            ])
            .await?;
        tracing::debug!(task = %task, %page_url, "Interactive challenge submitted");
        self.poll(&task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn solver(server: &MockServer) -> TwoCaptchaSolver {
        let config = CaptchaConfig {
            api_key: Some("k".to_string()),
            service_url: server.uri(),
            poll_interval_secs: 1,
            timeout_secs: 5,
        };
        TwoCaptchaSolver::from_config(&config)
            .expect("key configured")
            .with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_no_key_no_solver() {
        assert!(TwoCaptchaSolver::from_config(&CaptchaConfig::default()).is_none());
    }

    #[tokio::test]
    async fn test_interactive_challenge_polls_until_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/in.php"))
            .and(body_string_contains("googlekey=site-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 1, "request": "42"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .and(query_param("id", "42"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 0, "request": NOT_READY})),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 1, "request": "token-abc"})),
            )
            .mount(&server)
            .await;

        let token = solver(&server)
            .solve_interactive_challenge("site-key", "https://advance.lexis.com/x")
            .await
            .unwrap();
        assert_eq!(token, "token-abc");
    }

    #[tokio::test]
    async fn test_rejected_submission() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/in.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 0, "request": "ERROR_WRONG_USER_KEY"})),
            )
            .mount(&server)
            .await;

        let err = solver(&server).solve_image("aGVsbG8=").await.unwrap_err();
        assert!(err.to_string().contains("ERROR_WRONG_USER_KEY"));
    }

    #[tokio::test]
    async fn test_unsolvable_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/in.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 1, "request": "7"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 0, "request": "ERROR_CAPTCHA_UNSOLVABLE"})),
            )
            .mount(&server)
            .await;

        let err = solver(&server).solve_image("aGVsbG8=").await.unwrap_err();
        assert!(matches!(err, CrawlError::Captcha(_)));
    }
}
