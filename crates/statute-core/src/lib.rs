//! Statute Core - Foundation crate for the statute corpus.
//!
//! This crate provides shared types, the filesystem path codec, error handling
//! and configuration management that all other statute crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`JurisdictionId`, `Category`, `CorpusScope`)
//! - [`path`] - Filesystem-safe path segments (`sanitize`, `StorablePath`)
//!
//! # Example
//!
//! ```rust
//! use statute_core::{AppConfig, Category, StorablePath};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert!(config.browser.headless);
//!
//! let path = StorablePath::new(["Title 1", "Chapter 1.html"]);
//! assert_eq!(path.segments().len(), 2);
//! assert_eq!(Category::parse("court")?, Category::RulesOfCourt);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod path;
pub mod types;

// Re-export commonly used types
pub use config::{
    AcquisitionConfig, AppConfig, BrowserConfig, CaptchaConfig, CrawlerConfig, StorageConfig,
};
pub use error::{ConfigError, ConfigResult, Result, StatuteError};
pub use path::{sanitize, sanitize_path, StorablePath, MAX_PATH_LEN, MAX_SEGMENT_LEN};
pub use types::{Category, CorpusScope, JurisdictionId};
