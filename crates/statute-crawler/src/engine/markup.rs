use super::FetchEngine;
use crate::error::{CrawlError, Result};
use crate::fetch::HttpFetcher;
use crate::job::EngineKind;
use crate::url::complete_url;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;

/// HTTP fetch plus markup parsing.
#[derive(Clone)]
pub struct MarkupEngine {
    fetcher: Arc<dyn HttpFetcher>,
}

impl MarkupEngine {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl FetchEngine for MarkupEngine {
    type Page = MarkupPage;

    fn kind(&self) -> EngineKind {
        EngineKind::Markup
    }

    async fn open(&self, url: &str) -> Result<MarkupPage> {
        let body = self.fetcher.fetch_text(url).await?;
        Ok(MarkupPage::new(url, body))
    }

    async fn release(&self, _page: MarkupPage) {}
}

/// A fetched document.
///
/// The parsed tree is not `Send`, so every query parses on the spot and
/// returns owned [`MarkupNode`]s that can be held across awaits.
#[derive(Debug, Clone)]
pub struct MarkupPage {
    url: String,
    body: String,
}

/// An element lifted out of a [`MarkupPage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupNode {
    /// Whitespace-trimmed text content
    pub text: String,
    /// Element attributes
    pub attributes: HashMap<String, String>,
    /// Serialized element including its own tag
    pub html: String,
}

impl MarkupNode {
    fn from_element(element: ElementRef<'_>) -> Self {
        Self {
            text: element.text().collect::<String>().trim().to_string(),
            attributes: element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            html: element.html(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| CrawlError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

impl MarkupPage {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// All elements matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> Result<Vec<MarkupNode>> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.body);
        Ok(document
            .select(&selector)
            .map(MarkupNode::from_element)
            .collect())
    }

    pub fn select_first(&self, selector: &str) -> Result<Option<MarkupNode>> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.body);
        Ok(document
            .select(&selector)
            .next()
            .map(MarkupNode::from_element))
    }

    pub fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.select_first(selector)?.is_some())
    }

    /// Serialized HTML of the first match.
    pub fn outer_html(&self, selector: &str) -> Result<Option<String>> {
        Ok(self.select_first(selector)?.map(|node| node.html))
    }

    /// `href`s of matching anchors, resolved against the page URL.
    ///
    /// Anchors without `href` and unresolvable links are skipped.
    pub fn links(&self, selector: &str) -> Result<Vec<(String, MarkupNode)>> {
        Ok(self
            .select(selector)?
            .into_iter()
            .filter_map(|node| {
                let href = node.attr("href")?;
                let absolute = complete_url(href, &self.url).ok()?;
                Some((absolute, node))
            })
            .collect())
    }
}
