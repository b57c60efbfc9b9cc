//! Statute Crawler - crawl orchestration for statute acquisition.
//!
//! This crate provides the reusable primitives jurisdiction drivers are
//! written against: labeled job queues drained by a bounded worker pool,
//! idempotent artifact storage, and challenge handling for sites that put
//! a CAPTCHA in front of their content.
//!
//! # Features
//!
//! - Markup and browser fetch engines behind one [`FetchEngine`] seam
//! - Retry with linear backoff for transient fetch failures
//! - Requests-per-minute pacing and per-queue mutual exclusion
//! - Existence-based deduplication of downloaded artifacts
//! - Interactive or service-backed CAPTCHA resolution
//!
//! # Example
//!
//! ```rust,ignore
//! use statute_crawler::{MarkupEngine, Orchestrator, RunOptions};
//!
//! let engine = MarkupEngine::new(fetcher);
//! let summary = Orchestrator::new()
//!     .run(&engine, &handler, "https://leg.colorado.gov/constitution", RunOptions::default())
//!     .await;
//! assert_eq!(summary.failed, 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod artifact;
pub mod captcha;
pub mod challenge;
#[allow(missing_docs)]
pub mod engine;
#[allow(missing_docs)]
pub mod error;
pub mod fetch;
#[allow(missing_docs)]
pub mod job;
#[allow(missing_docs)]
pub mod orchestrator;
mod throttle;
#[allow(missing_docs)]
pub mod url;

// Re-export commonly used types
pub use artifact::{ArtifactStore, ScopedArtifacts, WriteOutcome};
pub use captcha::{CaptchaSolver, TwoCaptchaSolver};
pub use challenge::{ChallengeHandler, ChallengeMarkers, ChallengeState, ChallengeWidget};
pub use engine::{BrowserFetchEngine, FetchEngine, MarkupEngine, MarkupNode, MarkupPage};
pub use error::{CrawlError, Result};
pub use fetch::{HttpFetcher, ReqwestFetcher};
pub use job::{
    CrawlJob, EngineKind, QueueHandle, RequestLabel, SessionGuard, SessionLock, UserData,
};
pub use orchestrator::{
    CrawlHandler, HandlerContext, Orchestrator, RetryPolicy, RunOptions, RunSummary,
};
pub use url::complete_url;
