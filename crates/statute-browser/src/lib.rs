//! Browser automation for JavaScript-heavy legal publishing sites.
//!
//! Provides a chromiumoxide-backed engine with randomized fingerprints and
//! per-domain navigation spacing, plus the [`BrowserActions`] seam that
//! traversal and challenge code is written against.

pub mod actions;
pub mod download;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod page;

pub use actions::{extract_domain, js_string, BrowserActions};
pub use download::{CompletedDownload, DownloadedFile};
pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use page::BrowserPage;
