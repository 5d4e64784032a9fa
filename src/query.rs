//! Search request representation.

use crate::engine::{self, EngineDescriptor};

/// One retrieval request: the raw dork, the engine to ask, and the URL to fetch.
///
/// The query is passed through verbatim; dork operators are not validated.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// The raw search terms.
    pub query: String,
    /// The engine whose markup rules apply.
    pub engine: &'static EngineDescriptor,
    /// Fully encoded search URL.
    pub url: String,
}

impl SearchRequest {
    /// Creates a request for `query` on the engine called `engine_name`.
    ///
    /// Unknown engine names fall back to the default engine.
    pub fn new(query: impl Into<String>, engine_name: &str) -> Self {
        let query = query.into();
        let engine = engine::resolve(engine_name);
        let url = engine.build_url(&query);
        Self { query, engine, url }
    }

    /// Replaces the fetched URL while keeping the engine's markup rules.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}
