//! Filesystem-safe storage paths.
//!
//! Every logical path segment is sanitized before it touches the filesystem:
//! characters outside the allow-list are dropped, the segment separator is
//! dropped, and the result is truncated to [`MAX_SEGMENT_LEN`] characters.

use crate::error::StatuteError;
use crate::types::{Category, CorpusScope};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Maximum length of a single sanitized segment.
pub const MAX_SEGMENT_LEN: usize = 200;

/// Maximum length of a resolved path, root included.
pub const MAX_PATH_LEN: usize = 4096;

/// Placeholder for segments that sanitize to nothing or to a relative
/// directory reference (`.`/`..`).
const EMPTY_SEGMENT: &str = "_";

/// Sanitize a single path segment.
///
/// Keeps only `[a-zA-Z0-9_. (),:-]`, then truncates to [`MAX_SEGMENT_LEN`].
/// Segments that end up empty or made only of dots become `_` so they can
/// never escape the corpus root.
#[must_use]
pub fn sanitize(segment: &str) -> String {
    static DISALLOWED: OnceLock<Regex> = OnceLock::new();
    let regex = DISALLOWED
        .get_or_init(|| Regex::new(r"[^a-zA-Z0-9_. (),:-]").expect("valid regex"));

    let cleaned = regex.replace_all(segment, "");
    // Only ASCII survives, so byte and char boundaries coincide.
    let truncated: String = cleaned.chars().take(MAX_SEGMENT_LEN).collect();

    if truncated.is_empty() || truncated.chars().all(|c| c == '.') {
        EMPTY_SEGMENT.to_string()
    } else {
        truncated
    }
}

/// Sanitize every segment of a path.
#[must_use]
pub fn sanitize_path<S: AsRef<str>>(segments: &[S]) -> Vec<String> {
    segments.iter().map(|s| sanitize(s.as_ref())).collect()
}

/// An ordered sequence of human-readable path segments.
///
/// Segments are stored as given; sanitization happens in [`StorablePath::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorablePath(Vec<String>);

impl StorablePath {
    /// Create a path from raw segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Create a path under a corpus scope and category.
    pub fn scoped<I, S>(scope: &CorpusScope, category: Category, rest: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments = scope.segments();
        segments.push(category.dir_name().to_string());
        segments.extend(rest.into_iter().map(Into::into));
        Self(segments)
    }

    /// Prepend segments, e.g. a scope in front of a category-relative path.
    #[must_use]
    pub fn prefixed<I, S>(self, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments: Vec<String> = prefix.into_iter().map(Into::into).collect();
        segments.extend(self.0);
        Self(segments)
    }

    /// Append one segment.
    #[must_use]
    pub fn join(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Raw segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Last segment, usually the file name.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Resolve under `root`, sanitizing every segment.
    #[must_use]
    pub fn resolve(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in sanitize_path(&self.0) {
            path.push(segment);
        }
        path
    }

    /// Resolve under `root`, rejecting paths longer than [`MAX_PATH_LEN`].
    ///
    /// # Errors
    /// Returns a persistence error if the resolved path is too long.
    pub fn resolve_bounded(&self, root: &Path) -> Result<PathBuf, StatuteError> {
        let path = self.resolve(root);
        let len = path.as_os_str().len();
        if len > MAX_PATH_LEN {
            return Err(StatuteError::Persistence {
                path: path.display().to_string(),
                reason: format!("resolved path is {len} bytes, limit is {MAX_PATH_LEN}"),
            });
        }
        Ok(path)
    }
}

impl std::fmt::Display for StorablePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}
