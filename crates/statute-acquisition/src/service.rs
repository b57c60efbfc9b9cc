//! Acquisition service: runs every enabled category for every configured
//! jurisdiction.
//!
//! Work is category-major (every constitution first, then statutes, and so
//! on). A failing driver call is logged and recorded in the [`SyncReport`];
//! it never stops the calls after it.

use crate::driver::{acquire, JurisdictionDriver};
use crate::registry::RegistryClient;
use serde::Serialize;
use statute_core::Category;
use statute_store::{Jurisdiction, StatuteStore};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Order categories are synced in.
const SYNC_ORDER: [Category; 4] = [
    Category::Constitution,
    Category::Statutes,
    Category::AdministrativeCodes,
    Category::RulesOfCourt,
];

/// Result of one driver call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum CategoryOutcome {
    Completed,
    /// The driver has no source for the category
    Unsupported,
    /// No driver is registered for the jurisdiction
    NoDriver,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEntry {
    pub jurisdiction: String,
    pub category: Category,
    #[serde(flatten)]
    pub outcome: CategoryOutcome,
}

/// Per-jurisdiction, per-category outcomes of a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub entries: Vec<SyncEntry>,
}

impl SyncReport {
    fn record(&mut self, jurisdiction: &str, category: Category, outcome: CategoryOutcome) {
        self.entries.push(SyncEntry {
            jurisdiction: jurisdiction.to_string(),
            category,
            outcome,
        });
    }

    pub fn outcome(&self, jurisdiction: &str, category: Category) -> Option<&CategoryOutcome> {
        self.entries
            .iter()
            .find(|e| e.jurisdiction == jurisdiction && e.category == category)
            .map(|e| &e.outcome)
    }

    pub fn completed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == CategoryOutcome::Completed)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SyncEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, CategoryOutcome::Failed(_)))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

pub struct AcquisitionService {
    store: Arc<StatuteStore>,
    drivers: BTreeMap<String, Arc<dyn JurisdictionDriver>>,
    jurisdictions: Vec<String>,
    categories: Vec<Category>,
    registry: Option<RegistryClient>,
}

impl AcquisitionService {
    /// Service syncing only constitutions, with no jurisdictions configured.
    pub fn new(store: Arc<StatuteStore>) -> Self {
        Self {
            store,
            drivers: BTreeMap::new(),
            jurisdictions: Vec::new(),
            categories: vec![Category::Constitution],
            registry: None,
        }
    }

    /// Register the driver for `driver.name()`, replacing any previous one.
    #[must_use]
    pub fn with_driver(mut self, driver: Arc<dyn JurisdictionDriver>) -> Self {
        self.drivers.insert(driver.name().to_string(), driver);
        self
    }

    #[must_use]
    pub fn with_jurisdictions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jurisdictions = names
            .into_iter()
            .map(|n| n.into().trim().to_string())
            .collect();
        self
    }

    /// Categories synced besides the constitution, which always is.
    #[must_use]
    pub fn with_categories<I>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = Category>,
    {
        let requested: Vec<Category> = categories.into_iter().collect();
        self.categories = SYNC_ORDER
            .into_iter()
            .filter(|c| *c == Category::Constitution || requested.contains(c))
            .collect();
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: RegistryClient) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn store(&self) -> &Arc<StatuteStore> {
        &self.store
    }

    pub fn jurisdictions(&self) -> &[String] {
        &self.jurisdictions
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Create the configured jurisdictions, then sync.
    pub async fn start(&self) -> SyncReport {
        for name in &self.jurisdictions {
            if let Err(e) = self.store.create_jurisdiction(name).await {
                tracing::error!(jurisdiction = %name, "Failed to create jurisdiction: {}", e);
            }
        }
        self.sync().await
    }

    /// Refresh the registry (if any) and run every enabled category for
    /// every configured jurisdiction.
    pub async fn sync(&self) -> SyncReport {
        if self.registry.is_some() {
            self.sync_jurisdictions().await;
        }

        let mut report = SyncReport::default();
        let mut ready = Vec::with_capacity(self.jurisdictions.len());
        for name in &self.jurisdictions {
            match self.resolve(name).await {
                Ok(jurisdiction) => ready.push(jurisdiction.name),
                Err(e) => {
                    tracing::error!(jurisdiction = %name, "Cannot sync jurisdiction: {}", e);
                    for category in &self.categories {
                        report.record(name, *category, CategoryOutcome::Failed(e.to_string()));
                    }
                }
            }
        }

        for category in &self.categories {
            for name in &ready {
                let outcome = self.sync_category(name, *category).await;
                report.record(name, *category, outcome);
            }
        }

        tracing::info!(
            completed = report.completed(),
            failed = report.failures().count(),
            "Sync finished"
        );
        report
    }

    /// Every enabled category for one jurisdiction.
    pub async fn sync_jurisdiction(&self, name: &str) -> SyncReport {
        let mut report = SyncReport::default();
        if let Err(e) = self.resolve(name).await {
            tracing::error!(jurisdiction = %name, "Cannot sync jurisdiction: {}", e);
            for category in &self.categories {
                report.record(name, *category, CategoryOutcome::Failed(e.to_string()));
            }
            return report;
        }

        for category in &self.categories {
            let outcome = self.sync_category(name, *category).await;
            report.record(name, *category, outcome);
        }
        report
    }

    /// Run one category for one jurisdiction, recording instead of failing.
    pub async fn sync_category(&self, name: &str, category: Category) -> CategoryOutcome {
        let Some(driver) = self.drivers.get(name) else {
            tracing::warn!(jurisdiction = %name, %category, "No driver registered");
            return CategoryOutcome::NoDriver;
        };

        tracing::info!(jurisdiction = %name, %category, "Syncing");
        match acquire(driver.as_ref(), category).await {
            Ok(()) => {
                tracing::info!(jurisdiction = %name, %category, "Synced");
                CategoryOutcome::Completed
            }
            Err(e) if e.is_unsupported() => {
                tracing::debug!(jurisdiction = %name, %category, "Category not provided");
                CategoryOutcome::Unsupported
            }
            Err(e) => {
                tracing::error!(jurisdiction = %name, %category, "Sync failed: {}", e);
                CategoryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Create a jurisdiction for every registry entry.
    ///
    /// Returns `None` when there is no registry or it could not be read.
    pub async fn sync_jurisdictions(&self) -> Option<Vec<Jurisdiction>> {
        let listing = self.registry.as_ref()?.fetch().await?;

        let mut created = Vec::with_capacity(listing.len());
        for remote in listing {
            match self.store.create_jurisdiction(&remote.name).await {
                Ok(jurisdiction) => created.push(jurisdiction),
                Err(e) => {
                    tracing::warn!(name = %remote.name, "Skipping registry entry: {}", e);
                }
            }
        }
        Some(created)
    }

    /// Sync the registry and return the entry named `name`.
    pub async fn sync_jurisdiction_by_name(&self, name: &str) -> Option<Jurisdiction> {
        let name = name.trim();
        self.sync_jurisdictions()
            .await?
            .into_iter()
            .find(|j| j.name == name)
    }

    async fn resolve(&self, name: &str) -> statute_store::Result<Jurisdiction> {
        match self.store.jurisdiction_by_name(name) {
            Some(jurisdiction) => Ok(jurisdiction),
            None => self.store.create_jurisdiction(name).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use statute_crawler::{CrawlError, HttpFetcher};
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<String>>>;

    struct FakeDriver {
        name: String,
        failing: Vec<Category>,
        calls: Calls,
    }

    impl FakeDriver {
        fn new(name: &str, calls: &Calls) -> Self {
            Self {
                name: name.to_string(),
                failing: Vec::new(),
                calls: Arc::clone(calls),
            }
        }

        fn failing(mut self, category: Category) -> Self {
            self.failing.push(category);
            self
        }

        fn call(&self, category: Category) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, category));
            if self.failing.contains(&category) {
                return Err(CrawlError::Handler("site is down".to_string()).into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl JurisdictionDriver for FakeDriver {
        fn name(&self) -> &str {
            &self.name
        }

        async fn constitution(&self) -> Result<()> {
            self.call(Category::Constitution)
        }

        async fn statutes(&self) -> Result<()> {
            self.call(Category::Statutes)
        }

        async fn administrative_codes(&self) -> Result<()> {
            self.call(Category::AdministrativeCodes)
        }
    }

    struct CannedRegistry(Option<&'static str>);

    #[async_trait]
    impl HttpFetcher for CannedRegistry {
        async fn fetch(&self, url: &str) -> statute_crawler::Result<Vec<u8>> {
            self.0
                .map(|body| body.as_bytes().to_vec())
                .ok_or_else(|| CrawlError::Fetch {
                    url: url.to_string(),
                    status: 503,
                })
        }
    }

    async fn store() -> Arc<StatuteStore> {
        Arc::new(StatuteStore::in_memory().await.unwrap())
    }

    fn calls() -> Calls {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_failing_constitution_does_not_block_next_jurisdiction() {
        let calls = calls();
        let service = AcquisitionService::new(store().await)
            .with_driver(Arc::new(
                FakeDriver::new("Arkansas", &calls).failing(Category::Constitution),
            ))
            .with_driver(Arc::new(FakeDriver::new("Colorado", &calls)))
            .with_jurisdictions(["Arkansas", "Colorado"]);

        let report = service.start().await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["Arkansas:constitution", "Colorado:constitution"]
        );
        assert!(matches!(
            report.outcome("Arkansas", Category::Constitution),
            Some(CategoryOutcome::Failed(_))
        ));
        assert_eq!(
            report.outcome("Colorado", Category::Constitution),
            Some(&CategoryOutcome::Completed)
        );
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_sync_is_category_major() {
        let calls = calls();
        let service = AcquisitionService::new(store().await)
            .with_driver(Arc::new(
                FakeDriver::new("Arkansas", &calls).failing(Category::Statutes),
            ))
            .with_driver(Arc::new(FakeDriver::new("Colorado", &calls)))
            .with_jurisdictions(["Arkansas", "Colorado"])
            .with_categories([Category::AdministrativeCodes, Category::Statutes]);

        let report = service.sync().await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "Arkansas:constitution",
                "Colorado:constitution",
                "Arkansas:statutes",
                "Colorado:statutes",
                "Arkansas:administrativeCodes",
                "Colorado:administrativeCodes",
            ]
        );
        assert_eq!(report.completed(), 5);
        assert_eq!(report.failures().count(), 1);
    }

    #[tokio::test]
    async fn test_constitution_is_always_enabled() {
        let service = AcquisitionService::new(store().await)
            .with_categories([Category::RulesOfCourt, Category::Statutes]);
        assert_eq!(
            service.categories(),
            &[
                Category::Constitution,
                Category::Statutes,
                Category::RulesOfCourt
            ]
        );
    }

    #[tokio::test]
    async fn test_unsupported_and_missing_drivers_are_recorded() {
        let calls = calls();
        let service = AcquisitionService::new(store().await)
            .with_driver(Arc::new(FakeDriver::new("Colorado", &calls)))
            .with_jurisdictions(["Colorado", "Georgia"])
            .with_categories([Category::RulesOfCourt]);

        let report = service.start().await;

        assert_eq!(
            report.outcome("Colorado", Category::RulesOfCourt),
            Some(&CategoryOutcome::Unsupported)
        );
        assert_eq!(
            report.outcome("Georgia", Category::Constitution),
            Some(&CategoryOutcome::NoDriver)
        );
        assert!(report.is_clean());

        let mut names: Vec<String> = service
            .store()
            .enumerate_jurisdictions()
            .into_iter()
            .map(|j| j.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Colorado", "Georgia"]);
    }

    #[tokio::test]
    async fn test_blank_jurisdiction_fails_alone() {
        let calls = calls();
        let service = AcquisitionService::new(store().await)
            .with_driver(Arc::new(FakeDriver::new("Colorado", &calls)))
            .with_jurisdictions(["  ", "Colorado"]);

        let report = service.sync().await;

        assert!(matches!(
            report.outcome("", Category::Constitution),
            Some(CategoryOutcome::Failed(_))
        ));
        assert_eq!(
            report.outcome("Colorado", Category::Constitution),
            Some(&CategoryOutcome::Completed)
        );
    }

    #[tokio::test]
    async fn test_sync_jurisdictions_from_registry() {
        let registry = RegistryClient::new(
            Arc::new(CannedRegistry(Some(
                r#"[{"id": 1, "name": "Colorado"}, {"name": " "}, {"name": "Georgia"}]"#,
            ))),
            "https://registry.test/jurisdictions",
        );
        let service = AcquisitionService::new(store().await).with_registry(registry);

        let created = service.sync_jurisdictions().await.unwrap();
        assert_eq!(created.len(), 2);

        let georgia = service.sync_jurisdiction_by_name("Georgia").await.unwrap();
        assert_eq!(georgia.name, "Georgia");
        assert!(service.sync_jurisdiction_by_name("Ohio").await.is_none());
        assert_eq!(service.store().enumerate_jurisdictions().len(), 2);
    }

    #[tokio::test]
    async fn test_registry_failure_does_not_stop_sync() {
        let calls = calls();
        let registry = RegistryClient::new(
            Arc::new(CannedRegistry(None)),
            "https://registry.test/jurisdictions",
        );
        let service = AcquisitionService::new(store().await)
            .with_registry(registry)
            .with_driver(Arc::new(FakeDriver::new("Colorado", &calls)))
            .with_jurisdictions(["Colorado"]);

        assert!(service.sync_jurisdictions().await.is_none());
        let report = service.sync().await;
        assert_eq!(report.completed(), 1);
    }

    #[tokio::test]
    async fn test_sync_single_jurisdiction() {
        let calls = calls();
        let service = AcquisitionService::new(store().await)
            .with_driver(Arc::new(FakeDriver::new("Colorado", &calls)))
            .with_categories([Category::Statutes]);

        let report = service.sync_jurisdiction("Colorado").await;
        assert_eq!(report.entries.len(), 2);
        assert!(report.is_clean());
        assert!(service.store().jurisdiction_by_name("Colorado").is_some());
    }
}
