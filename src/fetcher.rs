//! Retrieval strategy abstraction.

use async_trait::async_trait;

use crate::{Result, SearchRequest, SearchResult};

/// One way of turning a [`SearchRequest`] into results.
///
/// Implementations may use plain HTTP requests or a headless browser.
/// All configuration (proxies, timeouts, delays) is set at construction time.
/// `Ok(vec![])` means the engine page had no usable results; `Err` means the
/// attempt itself failed. The [`Retriever`](crate::Retriever) falls through to
/// the next strategy in both cases.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Short name used in logs and retrieval reports.
    fn name(&self) -> &'static str;

    /// Fetches results for `request`.
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchResult>>;
}
