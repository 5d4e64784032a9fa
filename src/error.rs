//! Error types for dork retrieval.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while retrieving search results.
///
/// Strategies report these to the [`Retriever`](crate::Retriever), which logs
/// them and moves on to the next strategy. They never cross `retrieve`.
#[derive(Error, Debug)]
pub enum SearchError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The engine answered with a non-success status.
    #[error("Request failed with status code: {0}")]
    Status(u16),

    /// Failed to parse response markup.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Browser launch, navigation or DOM query failed.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Result markers never appeared in time.
    #[error("Search timeout exceeded")]
    Timeout,

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}
