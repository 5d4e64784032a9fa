//! Retrieval orchestration.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::fetcher::SearchStrategy;
use crate::fetcher_http::HttpStrategy;
use crate::{Result, SearchRequest, SearchResult};

/// How one strategy attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "lowercase")]
pub enum AttemptOutcome {
    /// The strategy returned this many results.
    Found(usize),
    /// The strategy ran but found nothing.
    Empty,
    /// The strategy failed; the reason is kept for reporting.
    Failed(String),
}

/// One strategy run within a retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    /// Strategy name.
    pub strategy: &'static str,
    /// What happened.
    pub outcome: AttemptOutcome,
}

/// The outcome of a retrieval, with per-strategy detail.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Retrieval {
    /// Results of the first strategy that found any; empty otherwise.
    pub results: Vec<SearchResult>,
    /// Name of the strategy that produced `results`.
    pub strategy: Option<&'static str>,
    /// Every strategy that ran, in order.
    pub attempts: Vec<Attempt>,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

impl Retrieval {
    /// Whether a strategy after the first one had to run.
    pub fn used_fallback(&self) -> bool {
        self.attempts.len() > 1
    }

    /// Whether every strategy that ran reported a failure.
    pub fn all_failed(&self) -> bool {
        !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|attempt| matches!(attempt.outcome, AttemptOutcome::Failed(_)))
    }
}

/// Tries strategies in order and returns the first non-empty result set.
///
/// A later strategy only runs when every earlier one came back empty or
/// failed. There are no retries and no automatic switch to another engine.
pub struct Retriever {
    strategies: Vec<Arc<dyn SearchStrategy>>,
}

impl Retriever {
    /// Creates a retriever with no strategies.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Builds the standard chain from configuration: HTTP first, then the
    /// headless browser when the `headless` feature is enabled.
    pub fn from_config(config: &Config) -> Result<Self> {
        let proxies = Arc::new(config.proxy_pool()?);

        let http = HttpStrategy::new()
            .with_proxies(Arc::clone(&proxies))
            .with_timeout(config.fetch_timeout());

        #[allow(unused_mut)]
        let mut retriever = Self::new().with_strategy(http);

        #[cfg(feature = "headless")]
        {
            let mut browser = crate::browser::BrowserStrategy::new()
                .with_proxies(proxies)
                .with_wait_timeout(config.browser_timeout())
                .with_delay(config.delay_window())
                .with_headless(config.headless);
            if let Some(ref path) = config.chrome_path {
                browser = browser.with_chrome_path(path);
            }
            retriever = retriever.with_strategy(browser);
        }

        Ok(retriever)
    }

    /// Appends a strategy to the chain.
    pub fn with_strategy<S: SearchStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Appends an already shared strategy to the chain.
    pub fn with_shared_strategy(mut self, strategy: Arc<dyn SearchStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Returns the number of strategies in the chain.
    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    /// Retrieves results for `query` on the engine called `engine_name`.
    ///
    /// Never fails: when every strategy is empty or failed the list is empty.
    pub async fn retrieve(&self, query: &str, engine_name: &str) -> Vec<SearchResult> {
        self.retrieve_detailed(&SearchRequest::new(query, engine_name))
            .await
            .results
    }

    /// Retrieves results for `request`, reporting what each strategy did.
    pub async fn retrieve_detailed(&self, request: &SearchRequest) -> Retrieval {
        self.retrieve_observed(request, |_| {}).await
    }

    /// Like [`retrieve_detailed`](Self::retrieve_detailed), calling `observe`
    /// as soon as each attempt finishes and before the next one starts.
    pub async fn retrieve_observed<F>(&self, request: &SearchRequest, mut observe: F) -> Retrieval
    where
        F: FnMut(&Attempt) + Send,
    {
        let start = Instant::now();
        let mut retrieval = Retrieval::default();

        for strategy in &self.strategies {
            let name = strategy.name();
            debug!("Trying {} strategy for {}", name, request.engine.name);

            let outcome = match strategy.fetch(request).await {
                Ok(results) if !results.is_empty() => {
                    info!(
                        "{} strategy returned {} results from {}",
                        name,
                        results.len(),
                        request.engine.name
                    );
                    retrieval.results = results;
                    retrieval.strategy = Some(name);
                    AttemptOutcome::Found(retrieval.results.len())
                }
                Ok(_) => {
                    debug!("{} strategy found no results", name);
                    AttemptOutcome::Empty
                }
                Err(e) => {
                    warn!("{} strategy failed: {}", name, e);
                    AttemptOutcome::Failed(e.to_string())
                }
            };

            let attempt = Attempt {
                strategy: name,
                outcome,
            };
            observe(&attempt);
            retrieval.attempts.push(attempt);

            if retrieval.strategy.is_some() {
                break;
            }
        }

        retrieval.duration_ms = start.elapsed().as_millis() as u64;
        retrieval
    }
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new()
    }
}
