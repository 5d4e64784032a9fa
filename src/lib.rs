//! # dorker
//!
//! A search-dork retrieval engine. A query such as
//! `intitle:"index of" filetype:sql` is turned into an engine-specific search
//! URL, fetched, and the result page is reduced to a list of titled links.
//!
//! Retrieval runs an ordered chain of strategies:
//!
//! - a lightweight HTTP fetch with a rotated browser identity and optional proxy
//! - a headless browser run (feature `headless`, on by default), only when the
//!   HTTP fetch failed or found nothing
//!
//! Google, Bing and DuckDuckGo are supported. Per-user rate limiting, an admin
//! gate and a chat-style command layer sit on top.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dorker::{Config, Retriever};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let retriever = Retriever::from_config(&Config::default())?;
//!
//!     for result in retriever.retrieve("filetype:pdf rust", "bing").await {
//!         println!("{}: {}", result.title, result.link);
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod query;
mod result;

pub mod commands;
pub mod config;
pub mod engine;
pub mod extract;
pub mod fetcher;
pub mod fetcher_http;
pub mod identity;
pub mod proxy;
pub mod ratelimit;
pub mod search;

#[cfg(feature = "headless")]
pub mod browser;
#[cfg(feature = "headless")]
mod browser_setup;

pub use commands::Dispatcher;
pub use config::Config;
pub use engine::{build_url, EngineDescriptor, ExtractionRule, ENGINES};
pub use error::{Result, SearchError};
pub use fetcher::SearchStrategy;
pub use fetcher_http::HttpStrategy;
pub use proxy::{ProxyConfig, ProxyPool, ProxyProtocol};
pub use query::SearchRequest;
pub use ratelimit::{AdminGate, RateDecision, RateLimiter};
pub use result::SearchResult;
pub use search::{Attempt, AttemptOutcome, Retrieval, Retriever};

#[cfg(feature = "headless")]
pub use browser::BrowserStrategy;
