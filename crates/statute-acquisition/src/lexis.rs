//! Table-of-contents traversal for codes published on Lexis Advance.
//!
//! The table of contents is a lazily expanded tree. Each round expands a few
//! collapsed nodes, waits for the tree to settle, then opens the next batch of
//! document links one by one: click, clear any challenge, capture the
//! document, and go back to the index. Rounds continue until no collapsed
//! node is left and every link has been visited.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use statute_browser::{js_string, BrowserActions, BrowserError};
use statute_core::{Category, StorablePath};
use statute_crawler::{
    ChallengeHandler, CrawlError, CrawlHandler, HandlerContext, RequestLabel, Result,
    ScopedArtifacts,
};
use statute_store::{StatuteEvent, StatuteEventKind, StatuteRecord, StatuteStore};
use std::sync::Arc;
use std::time::Duration;

/// Present while the table of contents is showing
pub const INDEX_READY: &str = ".tocContainer";
/// Present once a document has rendered
pub const DOCUMENT_READY: &str = "#TOCTrail li a";
/// Collapsed tree nodes that can still be expanded
pub const EXPANDABLE: &str =
    r#".tocContainer li[aria-expanded="false"] .toc-tree__expansion-menu:not([disabled]) button"#;
/// Links to documents
pub const DOCUMENT_LINK: &str = r#"a[data-action="toclink"]"#;

const TRAIL: &str = "#TOCTrail li a";
const TITLE: &str = "h2.SS_Banner";
const BODY: &str = ".SS_LeftAlign";
const TERMS_BUTTON: &str = "#btnagreeterms";

const INDEX_WAIT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexisLabel {
    TableOfContents,
}

impl RequestLabel for LexisLabel {
    fn start() -> Self {
        Self::TableOfContents
    }
}

fn accept_terms_script() -> String {
    format!(
        "(() => {{ const b = document.querySelector({}); if (b) {{ b.click(); return true; }} return false; }})()",
        js_string(TERMS_BUTTON)
    )
}

fn expand_script(limit: usize) -> String {
    format!(
        "(() => {{ const buttons = Array.from(document.querySelectorAll({})).slice(0, {limit}); buttons.forEach(b => b.click()); return buttons.length; }})()",
        js_string(EXPANDABLE)
    )
}

fn count_script(selector: &str) -> String {
    format!("document.querySelectorAll({}).length", js_string(selector))
}

fn open_script(index: usize) -> String {
    format!(
        "(() => {{ const link = document.querySelectorAll({})[{index}]; if (!link) return false; link.click(); return true; }})()",
        js_string(DOCUMENT_LINK)
    )
}

fn document_script() -> String {
    format!(
        "(() => {{ const title = document.querySelector({title}); return {{ trail: Array.from(document.querySelectorAll({trail})).map(a => a.textContent.trim()), title: title ? title.textContent.trim() : null, content: Array.from(document.querySelectorAll({body})).map(e => e.innerHTML).join('') }}; }})()",
        title = js_string(TITLE),
        trail = js_string(TRAIL),
        body = js_string(BODY),
    )
}

#[derive(Debug, Deserialize)]
struct LexisDocument {
    #[serde(default)]
    trail: Vec<String>,
    title: Option<String>,
    #[serde(default)]
    content: String,
}

/// Storage path of a document: its breadcrumb trail plus `<title>.html`.
///
/// Untitled documents are named after their position in the index.
pub fn document_path(trail: &[String], title: Option<&str>, index: usize) -> Vec<String> {
    let mut path: Vec<String> = trail
        .iter()
        .map(|segment| segment.trim())
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect();

    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map_or_else(|| format!("no_title_{index}"), String::from);
    if title.ends_with('.') {
        path.push(format!("{title}html"));
    } else {
        path.push(format!("{title}.html"));
    }
    path
}

/// Statute id for a captured document: the jurisdiction followed by the
/// document's path without the file extension.
pub fn statute_id(jurisdiction: &str, path: &[String]) -> String {
    let mut id = String::from(jurisdiction);
    for segment in path {
        id.push_str(" / ");
        id.push_str(segment.strip_suffix(".html").unwrap_or(segment));
    }
    id
}

/// What capturing one document changed in the event store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Captured {
    Enacted,
    Amended,
    Unchanged,
}

/// Counters for one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalSummary {
    /// Documents seen for the first time (or again after a repeal)
    pub enacted: usize,
    /// Documents whose text changed since the last capture
    pub amended: usize,
    pub unchanged: usize,
    /// Documents given up on after retries
    pub skipped: usize,
}

fn retryable(err: &CrawlError) -> bool {
    matches!(
        err,
        CrawlError::ChallengeTimeout(_) | CrawlError::Browser(BrowserError::Timeout(_))
    )
}

/// Walks a Lexis table of contents and stores every document it links to.
pub struct LexisTableOfContents {
    jurisdiction: String,
    category: Category,
    artifacts: ScopedArtifacts,
    store: Arc<StatuteStore>,
    challenge: ChallengeHandler,
    settle: Duration,
    click_pause: Duration,
    expansions_per_round: usize,
    documents_per_round: usize,
    max_retries: u32,
}

impl LexisTableOfContents {
    /// `challenge` must use [`DOCUMENT_READY`] as its content marker and
    /// [`INDEX_READY`] as its index marker.
    pub fn new(
        jurisdiction: impl Into<String>,
        category: Category,
        artifacts: ScopedArtifacts,
        store: Arc<StatuteStore>,
        challenge: ChallengeHandler,
    ) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            category,
            artifacts,
            store,
            challenge,
            settle: Duration::from_secs(10),
            click_pause: Duration::from_millis(500),
            expansions_per_round: 5,
            documents_per_round: 20,
            max_retries: 3,
        }
    }

    /// Override the wait after expanding nodes and the pause per click.
    #[must_use]
    pub fn with_pacing(mut self, settle: Duration, click_pause: Duration) -> Self {
        self.settle = settle;
        self.click_pause = click_pause;
        self
    }

    /// Walk the whole table of contents on `page`.
    pub async fn traverse<B: BrowserActions + ?Sized>(&self, page: &B) -> Result<TraversalSummary> {
        page.wait_for_selector(INDEX_READY, INDEX_WAIT_MS).await?;
        if page.evaluate(&accept_terms_script()).await?.as_bool() == Some(true) {
            tracing::debug!("Accepted terms of use");
        }

        let mut summary = TraversalSummary::default();
        let mut cursor = 0usize;
        loop {
            let expanded = self.expand(page).await?;
            tokio::time::sleep(self.settle).await;
            let total = count(page, DOCUMENT_LINK).await?;

            let mut visited = 0usize;
            let mut retries = 0u32;
            while cursor < total && visited < self.documents_per_round {
                match self.capture(page, cursor).await {
                    Ok(Captured::Enacted) => summary.enacted += 1,
                    Ok(Captured::Amended) => summary.amended += 1,
                    Ok(Captured::Unchanged) => summary.unchanged += 1,
                    Err(e) if retryable(&e) && retries < self.max_retries => {
                        retries += 1;
                        tracing::warn!(index = cursor, retries, "Document did not load: {}", e);
                        self.recover(page).await?;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(index = cursor, "Skipping document: {}", e);
                        summary.skipped += 1;
                    }
                }
                self.recover(page).await?;
                retries = 0;
                cursor += 1;
                visited += 1;
            }

            let collapsed = count(page, EXPANDABLE).await?;
            tracing::debug!(cursor, total, expanded, collapsed, "Table of contents round done");
            if collapsed == 0 && cursor >= total {
                break;
            }
            if expanded == 0 && visited == 0 {
                tracing::warn!(collapsed, "Table of contents stopped growing");
                break;
            }
        }

        tracing::info!(
            jurisdiction = %self.jurisdiction,
            category = %self.category,
            enacted = summary.enacted,
            amended = summary.amended,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            "Table of contents traversed"
        );
        Ok(summary)
    }

    async fn expand<B: BrowserActions + ?Sized>(&self, page: &B) -> Result<usize> {
        let clicked = page
            .evaluate(&expand_script(self.expansions_per_round))
            .await?
            .as_u64()
            .unwrap_or(0);
        let clicked = usize::try_from(clicked).unwrap_or(usize::MAX);
        for _ in 0..clicked {
            tokio::time::sleep(self.click_pause).await;
        }
        Ok(clicked)
    }

    async fn capture<B: BrowserActions + ?Sized>(&self, page: &B, index: usize) -> Result<Captured> {
        if page.evaluate(&open_script(index)).await?.as_bool() != Some(true) {
            return Err(BrowserError::SelectorNotFound(format!("{DOCUMENT_LINK} #{index}")).into());
        }
        self.challenge.pass(page).await?;

        let document: LexisDocument = serde_json::from_value(page.evaluate(&document_script()).await?)
            .map_err(|e| CrawlError::Handler(format!("unreadable document #{index}: {e}")))?;
        let path = document_path(&document.trail, document.title.as_deref(), index);

        self.artifacts
            .store_in(self.category, &document.content, StorablePath::new(path.clone()))
            .await?;

        let url = page.current_url().await.ok();
        self.record(&path, document, url).await
    }

    /// Enact a new document, or amend one whose text changed.
    async fn record(
        &self,
        path: &[String],
        document: LexisDocument,
        url: Option<String>,
    ) -> Result<Captured> {
        let id = statute_id(&self.jurisdiction, path);
        let (kind, captured) = match self.store.statute(&id) {
            Some(current) if current.is_active() => {
                if current.record.content.as_deref() == Some(document.content.as_str()) {
                    return Ok(Captured::Unchanged);
                }
                (StatuteEventKind::Amendment, Captured::Amended)
            }
            _ => (StatuteEventKind::Enactment, Captured::Enacted),
        };

        let title = document
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| path.last().cloned())
            .unwrap_or_default();
        let mut record =
            StatuteRecord::new(id, &self.jurisdiction, title).with_content(document.content);
        if let Some(url) = url {
            record = record.with_source_url(url);
        }

        self.store
            .register_statute_event(StatuteEvent::new(kind, record, Utc::now()))
            .await
            .map_err(|e| CrawlError::Handler(format!("failed to register {kind}: {e}")))?;
        Ok(captured)
    }

    /// Return to the index unless the page is already there.
    async fn recover<B: BrowserActions + ?Sized>(&self, page: &B) -> Result<()> {
        if page.exists(INDEX_READY).await? {
            return Ok(());
        }
        self.challenge.back_to_index(page).await
    }
}

async fn count<B: BrowserActions + ?Sized>(page: &B, selector: &str) -> Result<usize> {
    let n = page.evaluate(&count_script(selector)).await?.as_u64().unwrap_or(0);
    Ok(usize::try_from(n).unwrap_or(usize::MAX))
}

#[async_trait]
impl<P: BrowserActions> CrawlHandler<LexisLabel, P> for LexisTableOfContents {
    async fn handle(&self, ctx: &HandlerContext<'_, LexisLabel, P>) -> Result<()> {
        match ctx.request.label {
            LexisLabel::TableOfContents => {
                self.traverse(ctx.page).await?;
                Ok(())
            }
        }
    }
}
