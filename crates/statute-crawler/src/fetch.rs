//! Plain HTTP fetching.

use crate::error::{CrawlError, Result};
use async_trait::async_trait;
use statute_core::CrawlerConfig;
use std::time::Duration;

/// Fetches a URL body. The seam tests replace with a counting double.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url` and return the body.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// GET `url` and decode the body as UTF-8, replacing invalid sequences.
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let body = self.fetch(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a client with the configured user agent and timeout.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CrawlError::Validation(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(url: &str, err: &reqwest::Error) -> CrawlError {
    if let Some(status) = err.status() {
        return status_error(url, status);
    }
    CrawlError::TransientFetch {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

fn status_error(url: &str, status: reqwest::StatusCode) -> CrawlError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        CrawlError::TransientFetch {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        }
    } else {
        CrawlError::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
        }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        tracing::trace!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(url, status));
        }

        let body = response.bytes().await.map_err(|e| classify(url, &e))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> ReqwestFetcher {
        ReqwestFetcher::new(&CrawlerConfig::default()).expect("client")
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .mount(&server)
            .await;

        let body = fetcher()
            .fetch(&format!("{}/doc.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"%PDF");
    }

    #[tokio::test]
    async fn test_server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/throttled"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let f = fetcher();
        let err = f.fetch(&format!("{}/busy", server.uri())).await.unwrap_err();
        assert!(err.is_transient());
        let err = f
            .fetch(&format!("{}/throttled", server.uri()))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_not_found_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Fetch { status: 404, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_text_is_lossy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'o', b'k', 0xFF]))
            .mount(&server)
            .await;

        let text = fetcher().fetch_text(&server.uri()).await.unwrap();
        assert!(text.starts_with("ok"));
    }
}
