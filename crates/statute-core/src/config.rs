//! Configuration management for the statute corpus.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/statute-corpus/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where artifacts and the event database live
    pub storage: StorageConfig,
    /// Crawl orchestration settings
    pub crawler: CrawlerConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Challenge solving settings
    pub captcha: CaptchaConfig,
    /// Which jurisdictions and categories to acquire
    pub acquisition: AcquisitionConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit file, falling back to defaults.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `STATUTE_DATA_DIR`: Override the corpus root directory
    /// - `STATUTE_HEADLESS`: Override browser headless mode (true/false)
    /// - `STATUTE_MAX_CONCURRENCY`: Override the markup engine concurrency cap
    /// - `STATUTE_CAPTCHA_KEY`: Solving service API key
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Unparseable values are ignored and the configured value is kept.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("STATUTE_DATA_DIR") {
            if !val.trim().is_empty() {
                self.storage.data_dir = Some(PathBuf::from(&val));
                tracing::debug!("Override storage.data_dir from env: {}", val);
            }
        }

        if let Some(val) = lookup("STATUTE_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Some(val) = lookup("STATUTE_MAX_CONCURRENCY") {
            if let Ok(max) = val.parse::<usize>() {
                if max > 0 {
                    self.crawler.max_concurrency = Some(max);
                    tracing::debug!("Override crawler.max_concurrency from env: {}", max);
                }
            }
        }

        if let Some(val) = lookup("STATUTE_CAPTCHA_KEY") {
            if !val.trim().is_empty() {
                self.captcha.api_key = Some(val);
                tracing::debug!("Captcha API key provided via env");
            }
        }
    }

    /// Check values that would make a run impossible.
    ///
    /// # Errors
    /// Returns the first invalid field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.crawler.max_concurrency == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "crawler.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.crawler.handler_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "crawler.handler_timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.captcha.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "captcha.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Corpus root: the configured directory or the XDG data directory.
    pub fn corpus_root(&self) -> ConfigResult<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::data_dir(),
        }
    }

    /// Event database file: the configured path or `events.db` in the corpus root.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(self.corpus_root()?.join("events.db")),
        }
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/statute-corpus/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/statute-corpus`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("org", "statutes", "statute-corpus").ok_or(ConfigError::NoProjectDirs)
}

/// Storage locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Corpus root; artifacts land under `<root>/data/...`
    pub data_dir: Option<PathBuf>,
    /// `SQLite` file for the statute event log
    pub database_path: Option<PathBuf>,
}

/// Crawl orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Concurrent requests for markup runs (unset = no cap)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    /// Requests-per-minute cap for markup runs (0 = unlimited)
    pub max_requests_per_minute: u32,
    /// Upper bound on a single handler invocation
    pub handler_timeout_secs: u64,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Retries for transient fetch failures
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,
    /// User agent string for markup fetches
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            max_requests_per_minute: 0,
            handler_timeout_secs: 3600,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 2000,
            user_agent: "statute-corpus/0.1.0".to_string(),
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Minimum delay between navigations to the same domain
    pub min_domain_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
            min_domain_delay_ms: 1000,
        }
    }
}

/// Challenge solving settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// Solving service API key; `None` selects the interactive path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Solving service base URL
    pub service_url: String,
    /// Seconds between result polls
    pub poll_interval_secs: u64,
    /// Give up on the service after this many seconds
    pub timeout_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            service_url: "https://2captcha.com".to_string(),
            poll_interval_secs: 5,
            timeout_secs: 180,
        }
    }
}

/// Which jurisdictions and categories to acquire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Jurisdiction names created on start
    pub jurisdictions: Vec<String>,
    /// Categories synced besides `constitution`
    pub categories: Vec<String>,
    /// Remote jurisdiction registry endpoint
    pub registry_url: Option<String>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            jurisdictions: vec!["Colorado".to_string()],
            categories: Vec::new(),
            registry_url: Some("https://beta.jeeves.dev/jurisdictions".to_string()),
        }
    }
}
