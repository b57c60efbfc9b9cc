//! Colorado.
//!
//! - Constitution: Secretary of State law index (markup)
//! - Statutes: Lexis Advance table of contents (browser, serialized)
//! - Rules of court: Supreme Court rule change archive (markup)
//! - Administrative codes: Code of Colorado Regulations, agency listings in
//!   markup with one isolated browser run per rule page

use crate::driver::{finish_run, DriverContext, JurisdictionDriver};
use crate::error::Result as AcquisitionResult;
use crate::lexis::{self, LexisTableOfContents};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use statute_browser::{js_string, BrowserActions, BrowserPage};
use statute_core::{Category, StorablePath};
use statute_crawler::{
    complete_url, CrawlError, CrawlHandler, CrawlJob, HandlerContext, MarkupPage, RequestLabel,
    Result, ScopedArtifacts, SessionLock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const NAME: &str = "Colorado";

pub const CONSTITUTION_INDEX: &str = "https://www.sos.state.co.us/pubs/info_center/laws/index.html";
pub const RULE_CHANGES: &str = "https://www.courts.state.co.us/Courts/Supreme_Court/Rule_Changes.cfm";
pub const STATUTES_TOC: &str = "https://advance.lexis.com/container?config=0345494EJAA5ZjE0MDIyYy1kNzZkLTRkNzktYTkxMS04YmJhNjBlNWUwYzYKAFBvZENhdGFsb2e4CaPI4cak6laXLCWyLBO9&crid=ceb0105a-8d1e-422a-9700-02f9463ee294";
pub const CCR_DEPARTMENTS: &str = "https://www.sos.state.co.us/CCR/NumericalDeptList.do";

const RULE_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ColoradoDriver {
    ctx: Arc<DriverContext>,
    session: SessionLock,
}

impl ColoradoDriver {
    pub fn new(ctx: Arc<DriverContext>) -> Self {
        Self {
            ctx,
            session: SessionLock::new(),
        }
    }

    fn artifacts(&self) -> ScopedArtifacts {
        self.ctx.scoped(self.scope())
    }
}

#[async_trait]
impl JurisdictionDriver for ColoradoDriver {
    fn name(&self) -> &str {
        NAME
    }

    async fn constitution(&self) -> AcquisitionResult<()> {
        let recipe = ConstitutionRecipe::new(self.artifacts());
        let summary = self
            .ctx
            .orchestrator()
            .run(
                &self.ctx.markup_engine(),
                &recipe,
                CONSTITUTION_INDEX,
                self.ctx.markup_options(),
            )
            .await;
        finish_run(NAME, Category::Constitution, &summary)
    }

    async fn statutes(&self) -> AcquisitionResult<()> {
        let engine = self.ctx.browser_engine().await?;
        let toc = LexisTableOfContents::new(
            NAME,
            Category::Statutes,
            self.artifacts(),
            Arc::clone(self.ctx.store()),
            self.ctx.recaptcha(lexis::DOCUMENT_READY, lexis::INDEX_READY),
        );
        let options = self
            .ctx
            .browser_options()
            .with_max_concurrency(1)
            .with_session(self.session.clone());

        let summary = self
            .ctx
            .orchestrator()
            .run(&engine, &toc, STATUTES_TOC, options)
            .await;
        finish_run(NAME, Category::Statutes, &summary)
    }

    async fn rules_of_court(&self) -> AcquisitionResult<()> {
        let recipe = CourtRulesRecipe::new(self.artifacts());
        let summary = self
            .ctx
            .orchestrator()
            .run(
                &self.ctx.markup_engine(),
                &recipe,
                RULE_CHANGES,
                self.ctx.markup_options(),
            )
            .await;
        finish_run(NAME, Category::RulesOfCourt, &summary)
    }

    async fn administrative_codes(&self) -> AcquisitionResult<()> {
        let recipe = CodesRecipe {
            ctx: Arc::clone(&self.ctx),
            artifacts: self.artifacts(),
        };
        let summary = self
            .ctx
            .orchestrator()
            .run(
                &self.ctx.markup_engine(),
                &recipe,
                CCR_DEPARTMENTS,
                self.ctx.markup_options(),
            )
            .await;
        finish_run(NAME, Category::AdministrativeCodes, &summary)
    }
}

// ---------------------------------------------------------------------------
// Markup helpers
// ---------------------------------------------------------------------------

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CrawlError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn is_law_list(element: &ElementRef<'_>) -> bool {
    element.value().name() == "ul" && element.value().classes().any(|c| c == "w3-ul")
}

/// The `ul.w3-ul` an anchor belongs to.
fn enclosing_list(anchor: ElementRef<'_>) -> Option<ElementRef<'_>> {
    anchor.ancestors().filter_map(ElementRef::wrap).find(is_law_list)
}

/// Text of the element right before a list; the index uses it as a heading.
fn heading(list: ElementRef<'_>) -> String {
    list.prev_siblings()
        .find_map(ElementRef::wrap)
        .map(text_of)
        .unwrap_or_default()
}

/// Label of the list item a nested list hangs from, if the anchor is nested.
fn group_label(anchor: ElementRef<'_>, list: ElementRef<'_>) -> Option<String> {
    let items: Vec<ElementRef<'_>> = anchor
        .ancestors()
        .take_while(|node| node.id() != list.id())
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "li")
        .collect();
    let outer = items.get(1)?;

    let own_text: String = outer
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect();
    let label = collapse_whitespace(&own_text);
    (!label.is_empty()).then_some(label)
}

fn same_site(url: &str, base: &str) -> bool {
    match (Url::parse(url), Url::parse(base)) {
        (Ok(url), Ok(base)) => url.host_str() == base.host_str(),
        _ => false,
    }
}

/// Links of `page` matching `css`, restricted to the page's own host.
fn site_links(page: &MarkupPage, css: &str) -> Result<Vec<(String, String)>> {
    Ok(page
        .links(css)?
        .into_iter()
        .filter(|(url, _)| same_site(url, page.url()))
        .map(|(url, node)| (url, node.text))
        .collect())
}

// ---------------------------------------------------------------------------
// Constitution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstitutionLabel {
    Index,
    Article,
}

impl RequestLabel for ConstitutionLabel {
    fn start() -> Self {
        Self::Index
    }
}

/// What the constitution index links to.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConstitutionIndex {
    /// PDFs downloaded as-is: `(url, path)`
    pub documents: Vec<(String, Vec<String>)>,
    /// HTML articles fetched and stored: `(url, path)`
    pub articles: Vec<(String, Vec<String>)>,
}

/// Read the index page. Paths start with the heading of the list a link
/// sits in; links in nested lists add the parent item's label.
pub fn constitution_index(body: &str, base: &str) -> Result<ConstitutionIndex> {
    let document = Html::parse_document(body);
    let pdfs = selector(r#"a[href$=".pdf"]"#)?;
    let pages = selector(r#"ul.w3-ul a[href$=".html"]"#)?;

    let mut index = ConstitutionIndex::default();
    for anchor in document.select(&pdfs) {
        let (Some(list), Some(href)) = (enclosing_list(anchor), anchor.value().attr("href")) else {
            continue;
        };
        let Ok(url) = complete_url(href, base) else {
            continue;
        };
        index
            .documents
            .push((url, vec![heading(list), format!("{}.pdf", text_of(anchor))]));
    }

    for anchor in document.select(&pages) {
        let (Some(list), Some(href)) = (enclosing_list(anchor), anchor.value().attr("href")) else {
            continue;
        };
        let Ok(url) = complete_url(href, base) else {
            continue;
        };
        let mut path = vec![heading(list)];
        path.extend(group_label(anchor, list));
        path.push(format!("{}.html", text_of(anchor)));
        index.articles.push((url, path));
    }

    Ok(index)
}

/// The article body, without the paragraphs that point back at the full
/// PDF or at the commercial publisher.
pub fn constitution_article(body: &str) -> Result<Option<String>> {
    let document = Html::parse_document(body);
    let main = selector(".mainContent")?;
    let promotional = selector(r#"a[href*="ColoradoConstitution.pdf"], a[href*="lexisnexis.com"]"#)?;

    let Some(content) = document.select(&main).next() else {
        return Ok(None);
    };

    let mut html = String::from(r#"<div class="mainContent">"#);
    for child in content.children() {
        if let Some(element) = ElementRef::wrap(child) {
            let is_promotion =
                element.value().name() == "p" && element.select(&promotional).next().is_some();
            if !is_promotion {
                html.push_str(&element.html());
            }
        } else if let Some(text) = child.value().as_text() {
            html.push_str(text);
        }
    }
    html.push_str("</div>");
    Ok(Some(html))
}

pub struct ConstitutionRecipe {
    artifacts: ScopedArtifacts,
}

impl ConstitutionRecipe {
    pub fn new(artifacts: ScopedArtifacts) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl CrawlHandler<ConstitutionLabel, MarkupPage> for ConstitutionRecipe {
    async fn handle(&self, ctx: &HandlerContext<'_, ConstitutionLabel, MarkupPage>) -> Result<()> {
        match ctx.request.label {
            ConstitutionLabel::Index => {
                let index = constitution_index(ctx.page.body(), ctx.page.url())?;
                tracing::debug!(
                    documents = index.documents.len(),
                    articles = index.articles.len(),
                    "Constitution index read"
                );

                for (url, path) in index.documents {
                    self.artifacts
                        .download_constitution(&url, StorablePath::new(path))
                        .await?;
                }
                ctx.enqueue(
                    index
                        .articles
                        .into_iter()
                        .filter(|(url, _)| same_site(url, ctx.page.url()))
                        .map(|(url, path)| {
                            CrawlJob::new(url, ConstitutionLabel::Article).with_path(path)
                        }),
                );
            }
            ConstitutionLabel::Article => {
                let article = constitution_article(ctx.page.body())?.ok_or_else(|| {
                    CrawlError::Handler(format!("no article content at {}", ctx.page.url()))
                })?;
                self.artifacts
                    .store_constitution(
                        article,
                        StorablePath::new(ctx.request.user_data.path.clone()),
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rules of court
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourtRulesLabel {
    Changes,
    MoreYears,
    Year,
}

impl RequestLabel for CourtRulesLabel {
    fn start() -> Self {
        Self::Changes
    }
}

pub struct CourtRulesRecipe {
    artifacts: ScopedArtifacts,
}

impl CourtRulesRecipe {
    pub fn new(artifacts: ScopedArtifacts) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl CrawlHandler<CourtRulesLabel, MarkupPage> for CourtRulesRecipe {
    async fn handle(&self, ctx: &HandlerContext<'_, CourtRulesLabel, MarkupPage>) -> Result<()> {
        let page = ctx.page;
        match ctx.request.label {
            CourtRulesLabel::Changes => {
                let archives = site_links(page, ".center-content table tr:nth-child(3) td a")?;
                let years = site_links(page, ".center-content table tr:nth-child(2) td a")?;
                ctx.enqueue(
                    archives
                        .into_iter()
                        .map(|(url, _)| CrawlJob::new(url, CourtRulesLabel::MoreYears)),
                );
                ctx.enqueue(
                    years
                        .into_iter()
                        .map(|(url, _)| CrawlJob::new(url, CourtRulesLabel::Year)),
                );
            }
            CourtRulesLabel::MoreYears => {
                let years = site_links(page, ".center-content table tr td a")?;
                ctx.enqueue(
                    years
                        .into_iter()
                        .map(|(url, _)| CrawlJob::new(url, CourtRulesLabel::Year)),
                );
            }
            CourtRulesLabel::Year => {
                let title = page
                    .select("span.Title")?
                    .into_iter()
                    .map(|node| node.text)
                    .collect::<Vec<_>>()
                    .join(" ");
                for (url, node) in page.links(r#".center-content a[href$=".pdf"]"#)? {
                    let path = StorablePath::new([title.clone(), format!("{}.pdf", node.text)]);
                    self.artifacts.download_rules_of_court(&url, path).await?;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Administrative codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodesLabel {
    Departments,
    Agency,
}

impl RequestLabel for CodesLabel {
    fn start() -> Self {
        Self::Departments
    }
}

/// Walks the department and agency listings, then opens every rule page in
/// its own browser run.
pub struct CodesRecipe {
    ctx: Arc<DriverContext>,
    artifacts: ScopedArtifacts,
}

#[async_trait]
impl CrawlHandler<CodesLabel, MarkupPage> for CodesRecipe {
    async fn handle(&self, ctx: &HandlerContext<'_, CodesLabel, MarkupPage>) -> Result<()> {
        match ctx.request.label {
            CodesLabel::Departments => {
                let agencies = site_links(ctx.page, "table table tr:nth-child(6) table a[href]")?;
                ctx.enqueue(
                    agencies
                        .into_iter()
                        .map(|(url, _)| CrawlJob::new(url, CodesLabel::Agency)),
                );
            }
            CodesLabel::Agency => {
                let rules = ctx
                    .page
                    .links("table table tr:nth-child(2) table:nth-child(3) a[href]")?;
                if rules.is_empty() {
                    return Ok(());
                }

                let engine = self
                    .ctx
                    .browser_engine()
                    .await
                    .map_err(|e| CrawlError::Handler(format!("browser unavailable: {e}")))?;
                let pages = RulePages {
                    artifacts: self.artifacts.clone(),
                    scratch_dir: self.ctx.scratch_dir().to_path_buf(),
                };

                let mut failed = 0;
                for (url, _) in rules {
                    let summary = self
                        .ctx
                        .orchestrator()
                        .run(
                            &engine,
                            &pages,
                            &url,
                            self.ctx.browser_options().with_random_queue(),
                        )
                        .await;
                    failed += summary.failed;
                }
                if failed > 0 {
                    return Err(CrawlError::Handler(format!(
                        "{failed} rule page(s) under {} failed",
                        ctx.page.url()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleLabel {
    Rule,
}

impl RequestLabel for RuleLabel {
    fn start() -> Self {
        Self::Rule
    }
}

#[derive(Debug, Deserialize)]
struct RuleListing {
    #[serde(default)]
    trail: Vec<String>,
    #[serde(default)]
    documents: Vec<RuleLink>,
}

#[derive(Debug, Deserialize)]
struct RuleLink {
    id: String,
    name: String,
    href: Option<String>,
}

const RULE_TRAIL: &str = r#"table table p[align="left"] a"#;
const RULE_DOCUMENTS: &str = "table table table:nth-child(9) tr td:nth-child(1) a";

/// Tags every rule document link with an id and lists them with the page's
/// breadcrumb (minus its two leading entries).
fn rule_listing_script() -> String {
    format!(
        "(() => {{ const trail = Array.from(document.querySelectorAll({trail})).slice(2).map(a => a.textContent.trim()); const documents = Array.from(document.querySelectorAll({docs})).map((a, i) => {{ if (!a.id) a.id = `statute-rule-${{i}}`; return {{ id: a.id, name: a.textContent.trim(), href: a.getAttribute('href') }}; }}); return {{ trail, documents }}; }})()",
        trail = js_string(RULE_TRAIL),
        docs = js_string(RULE_DOCUMENTS),
    )
}

/// Storage path of a rule document; slashes in its name become dots.
pub fn rule_document_path(trail: &[String], name: &str) -> Vec<String> {
    let mut path: Vec<String> = trail.iter().map(|s| collapse_whitespace(s)).collect();
    path.push(format!("{}.pdf", collapse_whitespace(name).replace('/', ".")));
    path
}

/// Where a rule link can be fetched without the browser, if anywhere.
fn direct_url(href: Option<&str>, base: &str) -> Option<String> {
    let href = href?.trim();
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    complete_url(href, base).ok()
}

/// Stores every document linked from one rule page.
struct RulePages {
    artifacts: ScopedArtifacts,
    scratch_dir: PathBuf,
}

#[async_trait]
impl CrawlHandler<RuleLabel, BrowserPage> for RulePages {
    async fn handle(&self, ctx: &HandlerContext<'_, RuleLabel, BrowserPage>) -> Result<()> {
        let RuleLabel::Rule = ctx.request.label;
        let page = ctx.page;

        let listing: RuleListing = serde_json::from_value(page.evaluate(&rule_listing_script()).await?)
            .map_err(|e| CrawlError::Handler(format!("unreadable rule listing: {e}")))?;
        if listing.documents.is_empty() {
            tracing::debug!(url = %ctx.request.url, "Rule page lists no documents");
            return Ok(());
        }

        for link in listing.documents {
            let path = StorablePath::new(rule_document_path(&listing.trail, &link.name));
            match direct_url(link.href.as_deref(), &ctx.request.url) {
                Some(url) => {
                    self.artifacts
                        .download_in(Category::AdministrativeCodes, &url, path)
                        .await?;
                }
                None => {
                    let file = page
                        .download_by_clicking(
                            &format!("#{}", link.id),
                            &self.scratch_dir,
                            RULE_DOWNLOAD_TIMEOUT,
                        )
                        .await?;
                    self.artifacts
                        .move_download_in(Category::AdministrativeCodes, &file, path)
                        .await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAW_INDEX: &str = r#"
        <html><body>
          <h3>Colorado Constitution</h3>
          <ul class="w3-ul">
            <li><a href="ColoradoConstitution.pdf">Colorado Constitution</a></li>
            <li><a href="preamble.html">Preamble</a></li>
            <li>Article II
              <ul>
                <li><a href="article2-1.html">Section 1</a></li>
              </ul>
            </li>
          </ul>
          <h3> Election Laws </h3>
          <ul class="w3-ul">
            <li><a href="/docs/title1.pdf">Title 1</a></li>
          </ul>
          <p><a href="stray.pdf">Outside any list</a></p>
        </body></html>
    "#;

    #[test]
    fn test_constitution_index() {
        let index =
            constitution_index(LAW_INDEX, "https://www.sos.state.co.us/pubs/info_center/laws/index.html")
                .unwrap();

        assert_eq!(
            index.documents,
            vec![
                (
                    "https://www.sos.state.co.us/pubs/info_center/laws/ColoradoConstitution.pdf"
                        .to_string(),
                    vec![
                        "Colorado Constitution".to_string(),
                        "Colorado Constitution.pdf".to_string()
                    ]
                ),
                (
                    "https://www.sos.state.co.us/docs/title1.pdf".to_string(),
                    vec!["Election Laws".to_string(), "Title 1.pdf".to_string()]
                ),
            ]
        );
        assert_eq!(
            index.articles,
            vec![
                (
                    "https://www.sos.state.co.us/pubs/info_center/laws/preamble.html".to_string(),
                    vec![
                        "Colorado Constitution".to_string(),
                        "Preamble.html".to_string()
                    ]
                ),
                (
                    "https://www.sos.state.co.us/pubs/info_center/laws/article2-1.html".to_string(),
                    vec![
                        "Colorado Constitution".to_string(),
                        "Article II".to_string(),
                        "Section 1.html".to_string()
                    ]
                ),
            ]
        );
    }

    #[test]
    fn test_constitution_article_drops_promotions() {
        let body = r#"
            <html><body><div class="mainContent">
              <h2>Article II</h2>
              <p>Section 1. All political power is vested in the people.</p>
              <p><a href="ColoradoConstitution.pdf">Download the full text</a></p>
              <p>Published by <a href="http://www.lexisnexis.com/hottopics/colorado">LexisNexis</a></p>
            </div></body></html>
        "#;

        let article = constitution_article(body).unwrap().unwrap();
        assert!(article.starts_with(r#"<div class="mainContent">"#));
        assert!(article.contains("<h2>Article II</h2>"));
        assert!(article.contains("All political power"));
        assert!(!article.contains("ColoradoConstitution.pdf"));
        assert!(!article.contains("LexisNexis"));
    }

    #[test]
    fn test_constitution_article_missing_content() {
        assert_eq!(constitution_article("<html><body></body></html>").unwrap(), None);
    }

    #[test]
    fn test_rule_document_path() {
        let trail = vec!["Department of Revenue".to_string(), " Taxation  Division".to_string()];
        assert_eq!(
            rule_document_path(&trail, "1 CCR 201-2/3"),
            vec!["Department of Revenue", "Taxation Division", "1 CCR 201-2.3.pdf"]
        );
    }

    #[test]
    fn test_direct_url() {
        let base = "https://www.sos.state.co.us/CCR/DisplayRule.do?ruleId=1";
        assert_eq!(
            direct_url(Some("GenerateRulePdf.do?ruleVersionId=7"), base).as_deref(),
            Some("https://www.sos.state.co.us/CCR/GenerateRulePdf.do?ruleVersionId=7")
        );
        assert_eq!(direct_url(Some("javascript:openPdf(7)"), base), None);
        assert_eq!(direct_url(Some("#"), base), None);
        assert_eq!(direct_url(None, base), None);
    }

    #[test]
    fn test_same_site() {
        assert!(same_site("https://www.courts.state.co.us/a.pdf", RULE_CHANGES));
        assert!(!same_site("https://www.coloradojudicial.gov/a.pdf", RULE_CHANGES));
        assert!(!same_site("not a url", RULE_CHANGES));
    }
}
