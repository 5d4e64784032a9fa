//! Lightweight retrieval: one HTTP GET and a static HTML parse.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::extract::extract_results;
use crate::fetcher::SearchStrategy;
use crate::identity::{random_user_agent, REQUEST_HEADERS};
use crate::proxy::ProxyPool;
use crate::{Result, SearchError, SearchRequest, SearchResult};

/// Default bound on a single lightweight request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// A strategy that fetches the engine page with reqwest and parses it with scraper.
///
/// Every call builds a fresh client so that the randomized user agent and the
/// chosen proxy apply to exactly one request.
pub struct HttpStrategy {
    proxies: Arc<ProxyPool>,
    timeout: Duration,
}

impl HttpStrategy {
    /// Creates a strategy without proxies and with the default timeout.
    pub fn new() -> Self {
        Self {
            proxies: Arc::new(ProxyPool::new()),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Uses `proxies` for outgoing requests.
    pub fn with_proxies(mut self, proxies: Arc<ProxyPool>) -> Self {
        self.proxies = proxies;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn client(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(random_user_agent())
            .timeout(self.timeout);

        if let Some(proxy) = self.proxies.select() {
            debug!("Using proxy: {}", proxy.endpoint());
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        builder
            .build()
            .map_err(|e| SearchError::Other(format!("Failed to create HTTP client: {}", e)))
    }
}

impl Default for HttpStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStrategy for HttpStrategy {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let client = self.client()?;

        let mut call = client.get(&request.url);
        for (name, value) in REQUEST_HEADERS {
            call = call.header(*name, *value);
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(
                "{} request failed with status code: {}",
                request.engine.name,
                status.as_u16()
            );
            return Err(SearchError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        let results = extract_results(&html, &request.engine.rule)?;
        debug!(
            "{} page yielded {} results over HTTP",
            request.engine.name,
            results.len()
        );
        Ok(results)
    }
}
