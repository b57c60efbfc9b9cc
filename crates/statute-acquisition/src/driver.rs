//! The jurisdiction driver seam and the resources drivers share.
//!
//! A driver knows where one jurisdiction publishes its law and how to walk
//! those sites. Everything else (fetching, queues, artifact storage, the
//! event store, the browser) comes from a [`DriverContext`].

use crate::error::{AcquisitionError, Result};
use async_trait::async_trait;
use statute_browser::BrowserEngine;
use statute_core::{AppConfig, Category, CorpusScope};
use statute_crawler::{
    ArtifactStore, BrowserFetchEngine, CaptchaSolver, ChallengeHandler, HttpFetcher, MarkupEngine,
    Orchestrator, ReqwestFetcher, RunOptions, RunSummary, ScopedArtifacts, TwoCaptchaSolver,
};
use statute_store::StatuteStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Acquires the corpus of one jurisdiction.
///
/// Every category defaults to [`AcquisitionError::Unsupported`]; drivers
/// override the ones their jurisdiction publishes.
#[async_trait]
pub trait JurisdictionDriver: Send + Sync {
    /// Jurisdiction name as stored in the event store
    fn name(&self) -> &str;

    /// Where the driver's artifacts live on disk
    fn scope(&self) -> CorpusScope {
        CorpusScope::State(self.name().to_string())
    }

    async fn constitution(&self) -> Result<()> {
        Err(unsupported(self.name(), Category::Constitution))
    }

    async fn statutes(&self) -> Result<()> {
        Err(unsupported(self.name(), Category::Statutes))
    }

    async fn rules_of_court(&self) -> Result<()> {
        Err(unsupported(self.name(), Category::RulesOfCourt))
    }

    async fn administrative_codes(&self) -> Result<()> {
        Err(unsupported(self.name(), Category::AdministrativeCodes))
    }
}

fn unsupported(jurisdiction: &str, category: Category) -> AcquisitionError {
    AcquisitionError::Unsupported {
        jurisdiction: jurisdiction.to_string(),
        category,
    }
}

/// Run the driver operation for `category`.
pub async fn acquire(driver: &dyn JurisdictionDriver, category: Category) -> Result<()> {
    match category {
        Category::Constitution => driver.constitution().await,
        Category::Statutes => driver.statutes().await,
        Category::RulesOfCourt => driver.rules_of_court().await,
        Category::AdministrativeCodes => driver.administrative_codes().await,
        other => Err(unsupported(driver.name(), other)),
    }
}

/// Log a drained run and turn failed jobs into an error.
///
/// Artifacts written by the jobs that did succeed stay on disk.
pub fn finish_run(jurisdiction: &str, category: Category, summary: &RunSummary) -> Result<()> {
    tracing::info!(
        jurisdiction,
        %category,
        queue = summary.queue.id(),
        handled = summary.handled,
        failed = summary.failed,
        retried = summary.retried,
        "Crawl run drained"
    );

    if summary.failed > 0 {
        return Err(AcquisitionError::Incomplete {
            jurisdiction: jurisdiction.to_string(),
            category,
            failed: summary.failed,
        });
    }
    Ok(())
}

/// Shared resources handed to every driver.
pub struct DriverContext {
    config: AppConfig,
    fetcher: Arc<dyn HttpFetcher>,
    artifacts: ArtifactStore,
    store: Arc<StatuteStore>,
    orchestrator: Arc<Orchestrator>,
    solver: Option<Arc<dyn CaptchaSolver>>,
    scratch_dir: PathBuf,
    browser: Mutex<Option<Arc<BrowserEngine>>>,
}

impl DriverContext {
    /// Context over explicit collaborators. The CAPTCHA solver comes from
    /// `config.captcha`; browser downloads land in a `downloads` directory
    /// next to the artifact root, never inside it.
    pub fn new(
        config: AppConfig,
        fetcher: Arc<dyn HttpFetcher>,
        artifacts: ArtifactStore,
        store: Arc<StatuteStore>,
    ) -> Self {
        let solver = TwoCaptchaSolver::from_config(&config.captcha)
            .map(|solver| Arc::new(solver) as Arc<dyn CaptchaSolver>);
        let scratch_dir = artifacts.root().with_file_name("downloads");

        Self {
            config,
            fetcher,
            artifacts,
            store,
            orchestrator: Arc::new(Orchestrator::new()),
            solver,
            scratch_dir,
            browser: Mutex::new(None),
        }
    }

    /// Build the HTTP client, artifact store and event store from `config`.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let corpus_root = config.corpus_root()?;
        let database_path = config.database_path()?;

        let fetcher: Arc<dyn HttpFetcher> = Arc::new(ReqwestFetcher::new(&config.crawler)?);
        let artifacts = ArtifactStore::under_corpus(&corpus_root, Arc::clone(&fetcher));
        let store = Arc::new(StatuteStore::open(&database_path).await?);

        tracing::info!(
            corpus = %corpus_root.display(),
            database = %database_path.display(),
            "Driver context ready"
        );

        Ok(Self::new(config, fetcher, artifacts, store))
    }

    #[must_use]
    pub fn with_solver(mut self, solver: Option<Arc<dyn CaptchaSolver>>) -> Self {
        self.solver = solver;
        self
    }

    /// Directory browser downloads land in before they are moved.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &Arc<dyn HttpFetcher> {
        &self.fetcher
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn scoped(&self, scope: CorpusScope) -> ScopedArtifacts {
        self.artifacts.scoped(scope)
    }

    pub fn store(&self) -> &Arc<StatuteStore> {
        &self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn markup_engine(&self) -> MarkupEngine {
        MarkupEngine::new(Arc::clone(&self.fetcher))
    }

    pub fn markup_options(&self) -> RunOptions {
        RunOptions::markup(&self.config.crawler)
    }

    pub fn browser_options(&self) -> RunOptions {
        RunOptions::browser(&self.config.crawler)
    }

    /// reCAPTCHA handler wired to the configured solver.
    pub fn recaptcha(&self, content: &str, index: &str) -> ChallengeHandler {
        ChallengeHandler::recaptcha(content, index).with_solver(self.solver.clone())
    }

    /// The shared browser, launched on first use.
    pub async fn browser(&self) -> Result<Arc<BrowserEngine>> {
        let mut slot = self.browser.lock().await;
        if let Some(browser) = slot.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let browser = Arc::new(BrowserEngine::launch(&self.config.browser).await?);
        *slot = Some(Arc::clone(&browser));
        Ok(browser)
    }

    pub async fn browser_engine(&self) -> Result<BrowserFetchEngine> {
        Ok(BrowserFetchEngine::new(self.browser().await?))
    }

    /// Close the browser if one was launched.
    pub async fn shutdown(&self) {
        let Some(browser) = self.browser.lock().await.take() else {
            return;
        };

        match Arc::try_unwrap(browser) {
            Ok(browser) => {
                if let Err(e) = browser.close().await {
                    tracing::warn!("Failed to close browser: {}", e);
                }
            }
            Err(_) => tracing::warn!("Browser still referenced at shutdown; dropping it"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statute_crawler::{EngineKind, QueueHandle};

    struct Bare;

    #[async_trait]
    impl JurisdictionDriver for Bare {
        fn name(&self) -> &str {
            "Wyoming"
        }
    }

    #[tokio::test]
    async fn test_default_operations_are_unsupported() {
        for category in Category::STATE {
            let err = acquire(&Bare, category).await.unwrap_err();
            assert!(err.is_unsupported(), "{category} should be unsupported");
        }
        assert!(acquire(&Bare, Category::UnitedStatesCode)
            .await
            .unwrap_err()
            .is_unsupported());
    }

    #[test]
    fn test_default_scope_is_state() {
        assert_eq!(Bare.scope(), CorpusScope::State("Wyoming".to_string()));
    }

    struct Offline;

    #[async_trait]
    impl HttpFetcher for Offline {
        async fn fetch(&self, url: &str) -> statute_crawler::Result<Vec<u8>> {
            Err(statute_crawler::CrawlError::Fetch {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    #[tokio::test]
    async fn test_scratch_dir_sits_beside_the_corpus_data() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fetcher: Arc<dyn HttpFetcher> = Arc::new(Offline);
        let artifacts = ArtifactStore::under_corpus(tmp.path(), Arc::clone(&fetcher));
        let store = Arc::new(StatuteStore::in_memory().await.unwrap());

        let ctx = DriverContext::new(AppConfig::default(), fetcher, artifacts, store);

        assert_eq!(ctx.scratch_dir(), tmp.path().join("downloads"));
        assert!(!ctx.scratch_dir().starts_with(ctx.artifacts().root()));
    }

    #[test]
    fn test_finish_run_reports_failed_jobs() {
        let mut summary = RunSummary {
            queue: QueueHandle::shared(EngineKind::Markup),
            handled: 3,
            failed: 0,
            retried: 1,
        };
        assert!(finish_run("Wyoming", Category::Constitution, &summary).is_ok());

        summary.failed = 2;
        let err = finish_run("Wyoming", Category::Constitution, &summary).unwrap_err();
        assert!(matches!(err, AcquisitionError::Incomplete { failed: 2, .. }));
    }
}
