use crate::error::Result;
use std::path::{Path, PathBuf};

/// A download the browser has finished writing to its scratch location.
#[async_trait::async_trait]
pub trait CompletedDownload: Send + Sync {
    /// File name the site suggested
    fn suggested_name(&self) -> &str;

    /// Move the file to `dest`. The parent directory must exist.
    async fn save_as(&self, dest: &Path) -> Result<()>;
}

/// A completed download sitting in the browser's download directory.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    path: PathBuf,
    suggested_name: String,
}

impl DownloadedFile {
    /// Wrap a finished file at `path` and the name the site gave it.
    pub fn new(path: PathBuf, suggested_name: String) -> Self {
        Self {
            path,
            suggested_name,
        }
    }

    /// Where the browser left the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl CompletedDownload for DownloadedFile {
    fn suggested_name(&self) -> &str {
        &self.suggested_name
    }

    async fn save_as(&self, dest: &Path) -> Result<()> {
        if tokio::fs::rename(&self.path, dest).await.is_ok() {
            return Ok(());
        }
        // rename fails across filesystems
        tokio::fs::copy(&self.path, dest).await?;
        tokio::fs::remove_file(&self.path).await?;
        Ok(())
    }
}
