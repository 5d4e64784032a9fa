//! Search result types.

use serde::{Deserialize, Serialize};

/// A single search hit.
///
/// `link` is an absolute `http(s)` URL and `title` is non-empty display text.
/// Results are kept in the order the engine ranked them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub link: String,
}

impl SearchResult {
    /// Creates a new search result.
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }

    /// Host part of the link, if it parses.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.link)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}
