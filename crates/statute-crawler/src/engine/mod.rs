//! Fetch engines: a lightweight markup fetcher and full browser automation.

mod browser;
mod markup;

pub use browser::BrowserFetchEngine;
pub use markup::{MarkupEngine, MarkupNode, MarkupPage};

use crate::error::Result;
use crate::job::EngineKind;
use async_trait::async_trait;

/// Turns a URL into something a handler can query.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// What handlers receive
    type Page: Send + Sync;

    fn kind(&self) -> EngineKind;

    /// Fetch or navigate to `url`.
    async fn open(&self, url: &str) -> Result<Self::Page>;

    /// Dispose of a page after its handler returned. Must not fail.
    async fn release(&self, page: Self::Page);
}
