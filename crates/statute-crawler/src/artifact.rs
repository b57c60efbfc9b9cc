//! Idempotent artifact persistence.
//!
//! The resolved [`StorablePath`] is the identity of an artifact: downloads and
//! moved browser downloads are skipped when the target already exists, while
//! [`ArtifactStore::store`] always overwrites.

use crate::error::{CrawlError, Result};
use crate::fetch::HttpFetcher;
use statute_browser::CompletedDownload;
use statute_core::{Category, CorpusScope, StorablePath};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The artifact was written
    Written,
    /// The artifact already existed; nothing was fetched or written
    Skipped,
}

/// Filesystem-backed artifact store rooted at `<corpus>/data`.
#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    fetcher: Arc<dyn HttpFetcher>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            root: root.into(),
            fetcher,
        }
    }

    /// Store rooted at `<corpus_root>/data`.
    pub fn under_corpus(corpus_root: &Path, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self::new(corpus_root.join("data"), fetcher)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sanitized absolute location of `path`.
    pub fn resolve(&self, path: &StorablePath) -> Result<PathBuf> {
        Ok(path.resolve_bounded(&self.root)?)
    }

    /// Fetch `url` into `path` unless the artifact already exists.
    pub async fn download(&self, url: &str, path: &StorablePath) -> Result<WriteOutcome> {
        let target = self.resolve(path)?;
        if exists(&target).await {
            tracing::debug!(%url, path = %target.display(), "Artifact exists, skipping download");
            return Ok(WriteOutcome::Skipped);
        }

        ensure_parent(&target).await?;
        let body = self.fetcher.fetch(url).await?;
        write_atomically(&target, &body).await?;

        tracing::info!(%url, path = %target.display(), bytes = body.len(), "Downloaded artifact");
        Ok(WriteOutcome::Written)
    }

    /// Write `content` to `path`, replacing whatever is there.
    pub async fn store(&self, content: impl AsRef<[u8]>, path: &StorablePath) -> Result<WriteOutcome> {
        let target = self.resolve(path)?;
        ensure_parent(&target).await?;
        write_atomically(&target, content.as_ref()).await?;

        tracing::debug!(path = %target.display(), "Stored artifact");
        Ok(WriteOutcome::Written)
    }

    /// Move a finished browser download to `path` unless it already exists.
    pub async fn move_completed_download(
        &self,
        download: &dyn CompletedDownload,
        path: &StorablePath,
    ) -> Result<WriteOutcome> {
        let target = self.resolve(path)?;
        if exists(&target).await {
            tracing::debug!(path = %target.display(), "Artifact exists, discarding download");
            return Ok(WriteOutcome::Skipped);
        }

        ensure_parent(&target).await?;
        download.save_as(&target).await.map_err(|e| CrawlError::Persistence {
            path: target.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            name = download.suggested_name(),
            path = %target.display(),
            "Saved browser download"
        );
        Ok(WriteOutcome::Written)
    }

    /// View of the store that prefixes every path with `scope`.
    pub fn scoped(&self, scope: CorpusScope) -> ScopedArtifacts {
        ScopedArtifacts {
            store: self.clone(),
            scope,
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn ensure_parent(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CrawlError::persistence(parent, &e))?;
    }
    Ok(())
}

/// Write to a sibling temp file and rename, so an interrupted write never
/// leaves a partial artifact that later runs would treat as complete.
///
/// Each writer gets its own temp name; concurrent writes of the same path
/// race only on the final rename, and the last one wins.
async fn write_atomically(target: &Path, body: &[u8]) -> Result<()> {
    let mut partial = target.as_os_str().to_owned();
    partial.push(format!(".{}.part", uuid::Uuid::new_v4().simple()));
    let partial = PathBuf::from(partial);

    if let Err(e) = tokio::fs::write(&partial, body).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(CrawlError::persistence(&partial, &e));
    }
    if let Err(e) = tokio::fs::rename(&partial, target).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(CrawlError::persistence(target, &e));
    }
    Ok(())
}

/// Artifact store view for one jurisdiction (or the federal corpus).
///
/// Paths handed to the plain methods are relative to the scope; the
/// category helpers additionally prefix the category directory.
#[derive(Clone)]
pub struct ScopedArtifacts {
    store: ArtifactStore,
    scope: CorpusScope,
}

impl ScopedArtifacts {
    pub fn scope(&self) -> &CorpusScope {
        &self.scope
    }

    pub fn store_ref(&self) -> &ArtifactStore {
        &self.store
    }

    fn full(&self, path: StorablePath) -> StorablePath {
        path.prefixed(self.scope.segments())
    }

    fn in_category(&self, category: Category, path: StorablePath) -> StorablePath {
        self.full(path.prefixed([category.dir_name()]))
    }

    pub async fn download(&self, url: &str, path: StorablePath) -> Result<WriteOutcome> {
        self.store.download(url, &self.full(path)).await
    }

    pub async fn store(&self, content: impl AsRef<[u8]>, path: StorablePath) -> Result<WriteOutcome> {
        self.store.store(content, &self.full(path)).await
    }

    pub async fn move_completed_download(
        &self,
        download: &dyn CompletedDownload,
        path: StorablePath,
    ) -> Result<WriteOutcome> {
        self.store
            .move_completed_download(download, &self.full(path))
            .await
    }

    /// Download into a category directory.
    pub async fn download_in(
        &self,
        category: Category,
        url: &str,
        path: StorablePath,
    ) -> Result<WriteOutcome> {
        self.store
            .download(url, &self.in_category(category, path))
            .await
    }

    /// Store into a category directory.
    pub async fn store_in(
        &self,
        category: Category,
        content: impl AsRef<[u8]>,
        path: StorablePath,
    ) -> Result<WriteOutcome> {
        self.store
            .store(content, &self.in_category(category, path))
            .await
    }

    /// Move a browser download into a category directory.
    pub async fn move_download_in(
        &self,
        category: Category,
        download: &dyn CompletedDownload,
        path: StorablePath,
    ) -> Result<WriteOutcome> {
        self.store
            .move_completed_download(download, &self.in_category(category, path))
            .await
    }

    pub async fn download_constitution(&self, url: &str, path: StorablePath) -> Result<WriteOutcome> {
        self.download_in(Category::Constitution, url, path).await
    }

    pub async fn store_constitution(
        &self,
        content: impl AsRef<[u8]>,
        path: StorablePath,
    ) -> Result<WriteOutcome> {
        self.store_in(Category::Constitution, content, path).await
    }

    pub async fn download_statutes(&self, url: &str, path: StorablePath) -> Result<WriteOutcome> {
        self.download_in(Category::Statutes, url, path).await
    }

    pub async fn store_statutes(
        &self,
        content: impl AsRef<[u8]>,
        path: StorablePath,
    ) -> Result<WriteOutcome> {
        self.store_in(Category::Statutes, content, path).await
    }

    pub async fn download_rules_of_court(
        &self,
        url: &str,
        path: StorablePath,
    ) -> Result<WriteOutcome> {
        self.download_in(Category::RulesOfCourt, url, path).await
    }

    pub async fn store_rules_of_court(
        &self,
        content: impl AsRef<[u8]>,
        path: StorablePath,
    ) -> Result<WriteOutcome> {
        self.store_in(Category::RulesOfCourt, content, path).await
    }

    pub async fn download_administrative_codes(
        &self,
        url: &str,
        path: StorablePath,
    ) -> Result<WriteOutcome> {
        self.download_in(Category::AdministrativeCodes, url, path)
            .await
    }

    pub async fn store_administrative_codes(
        &self,
        content: impl AsRef<[u8]>,
        path: StorablePath,
    ) -> Result<WriteOutcome> {
        self.store_in(Category::AdministrativeCodes, content, path)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingFetcher {
        calls: AtomicUsize,
        body: Vec<u8>,
    }

    impl CountingFetcher {
        fn new(body: &[u8]) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                body: body.to_vec(),
            })
        }
    }

    #[async_trait]
    impl HttpFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl HttpFetcher for FailingFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Err(CrawlError::Fetch {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    #[tokio::test]
    async fn test_download_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let fetcher = CountingFetcher::new(b"%PDF-1.4 constitution");
        let store = ArtifactStore::new(tmp.path(), fetcher.clone());
        let path = StorablePath::new(["constitution", "doc.pdf"]);

        let first = store.download("https://site/doc.pdf", &path).await.unwrap();
        let second = store.download("https://site/doc.pdf", &path).await.unwrap();

        assert_eq!(first, WriteOutcome::Written);
        assert_eq!(second, WriteOutcome::Skipped);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let on_disk = std::fs::read(tmp.path().join("constitution/doc.pdf")).unwrap();
        assert_eq!(on_disk, b"%PDF-1.4 constitution");
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path(), CountingFetcher::new(b""));
        let path = StorablePath::new(["statutes", "Title 1", "Chapter 1.html"]);

        assert_eq!(store.store("v1", &path).await.unwrap(), WriteOutcome::Written);
        assert_eq!(store.store("v2", &path).await.unwrap(), WriteOutcome::Written);

        let target = store.resolve(&path).unwrap();
        assert_eq!(std::fs::read_to_string(target).unwrap(), "v2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stores_of_one_path_all_succeed() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path(), CountingFetcher::new(b""));
        let path = StorablePath::new(["co", "statutes", "t0.html"]);

        for _ in 0..20 {
            let writers: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    let path = path.clone();
                    tokio::spawn(async move { store.store(vec![7u8; 65536], &path).await })
                })
                .collect();
            for writer in writers {
                assert_eq!(writer.await.unwrap().unwrap(), WriteOutcome::Written);
            }
        }

        let target = store.resolve(&path).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), vec![7u8; 65536]);
        let leftovers = std::fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path(), Arc::new(FailingFetcher));
        let path = StorablePath::new(["constitution", "missing.pdf"]);

        assert!(store.download("https://site/missing.pdf", &path).await.is_err());
        assert!(!store.resolve(&path).unwrap().exists());
    }

    #[tokio::test]
    async fn test_paths_are_sanitized() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path(), CountingFetcher::new(b""));
        let path = StorablePath::new(["..", "Title #5 / Crimes", "§ 1.html"]);

        store.store("x", &path).await.unwrap();
        assert!(tmp.path().join("_").join("Title 5  Crimes").join(" 1.html").exists());
    }

    #[tokio::test]
    async fn test_scoped_helpers_prefix_scope_and_category() {
        let tmp = TempDir::new().unwrap();
        let fetcher = CountingFetcher::new(b"rule");
        let store = ArtifactStore::under_corpus(tmp.path(), fetcher);

        let colorado = store.scoped(CorpusScope::State("Colorado".to_string()));
        colorado
            .download_rules_of_court("https://courts/r.pdf", StorablePath::new(["2024", "r.pdf"]))
            .await
            .unwrap();
        colorado
            .store_constitution("<p>art</p>", StorablePath::new(["Article II.html"]))
            .await
            .unwrap();

        let federal = store.scoped(CorpusScope::Federal);
        federal
            .store_in(
                Category::UnitedStatesCode,
                "usc",
                StorablePath::new(["Title 18.html"]),
            )
            .await
            .unwrap();

        let data = tmp.path().join("data");
        assert!(data.join("states/Colorado/rulesOfCourt/2024/r.pdf").exists());
        assert!(data.join("states/Colorado/constitution/Article II.html").exists());
        assert!(data.join("federal/unitedStatesCode/Title 18.html").exists());
    }
}
