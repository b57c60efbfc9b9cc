//! Statute Acquisition
//!
//! Jurisdiction drivers and the service that runs them. A driver knows where
//! one jurisdiction publishes its constitution, statutes, rules of court and
//! administrative codes; the [`AcquisitionService`] runs every enabled
//! category for every configured jurisdiction and records what happened.
//!
//! # Example
//!
//! ```rust,ignore
//! use statute_acquisition::{drivers, AcquisitionService, DriverContext};
//! use statute_core::{AppConfig, Category};
//! use std::sync::Arc;
//!
//! let ctx = Arc::new(DriverContext::from_config(AppConfig::load_with_env()?).await?);
//! let mut service = AcquisitionService::new(Arc::clone(ctx.store()))
//!     .with_jurisdictions(["Colorado"])
//!     .with_categories([Category::RulesOfCourt]);
//! for driver in drivers::builtin(&ctx) {
//!     service = service.with_driver(driver);
//! }
//! let report = service.start().await;
//! ctx.shutdown().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod driver;
#[allow(missing_docs)]
pub mod drivers;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod lexis;
#[allow(missing_docs)]
pub mod registry;
#[allow(missing_docs)]
pub mod service;

// Re-export commonly used types
pub use driver::{acquire, finish_run, DriverContext, JurisdictionDriver};
pub use error::{AcquisitionError, Result};
pub use registry::{RegistryClient, RemoteJurisdiction};
pub use service::{AcquisitionService, CategoryOutcome, SyncEntry, SyncReport};
