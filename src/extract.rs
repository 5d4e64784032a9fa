//! Result extraction from engine markup.
//!
//! Both strategies feed candidates through [`accept`], so the filters are the
//! same whether the markup came from a static HTTP response or a live DOM.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::engine::ExtractionRule;
use crate::{Result, SearchError, SearchResult};

/// Turns a raw title/link pair into a result, or rejects it.
///
/// Rejected: empty titles, links not starting with `http`, and links whose
/// host contains the engine's own domain.
pub fn accept(rule: &ExtractionRule, title: &str, link: &str) -> Option<SearchResult> {
    let title = title.trim();
    let link = link.trim();

    if title.is_empty() || !link.starts_with("http") {
        return None;
    }

    if let Some(domain) = rule.self_domain {
        let host = url::Url::parse(link)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))?;
        if host.contains(domain) {
            return None;
        }
    }

    Some(SearchResult::new(title, link))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| SearchError::Parse(format!("Failed to parse selector '{}': {:?}", css, e)))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Extracts results from a static HTML document using `rule`.
///
/// Containers missing a link or title are skipped; results keep document order.
pub fn extract_results(html: &str, rule: &ExtractionRule) -> Result<Vec<SearchResult>> {
    let document = Html::parse_document(html);

    let container_selector = selector(rule.container)?;
    let link_selector = selector(rule.link)?;
    let title_selector = rule.title.map(selector).transpose()?;

    let mut results = Vec::new();

    for container in document.select(&container_selector) {
        let Some(anchor) = container.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        let title = match &title_selector {
            Some(title_selector) => match container.select(title_selector).next() {
                Some(el) => text_of(el),
                None => continue,
            },
            None => text_of(anchor),
        };

        match accept(rule, &title, href) {
            Some(result) => results.push(result),
            None => debug!("Discarding candidate link: {}", href),
        }
    }

    Ok(results)
}
