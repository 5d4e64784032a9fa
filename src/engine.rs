//! Search engine descriptors and their markup rules.
//!
//! Every supported engine is one row of [`ENGINES`]: a name, a URL template
//! with a single `{query}` placeholder, and the [`ExtractionRule`] both
//! retrieval strategies use to pull results out of the engine's markup.
//! Adding an engine means adding a row here.

use serde::Serialize;

/// Placeholder substituted with the encoded query in a URL template.
const QUERY_PLACEHOLDER: &str = "{query}";

/// CSS selectors describing where one engine puts its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionRule {
    /// Selector matching one result container.
    pub container: &'static str,
    /// Selector for the anchor carrying the link, relative to the container.
    pub link: &'static str,
    /// Selector for the title element. `None` means the link anchor's text.
    pub title: Option<&'static str>,
    /// Selector that appears once results have rendered.
    pub wait_for: &'static str,
    /// Links whose host contains this domain are the engine's own pages.
    pub self_domain: Option<&'static str>,
}

/// An immutable description of one search engine.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct EngineDescriptor {
    /// Display name.
    pub name: &'static str,
    /// URL with a single `{query}` placeholder.
    pub url_template: &'static str,
    /// Markup rules for this engine.
    pub rule: ExtractionRule,
}

/// All supported engines. The first entry is the default.
pub static ENGINES: [EngineDescriptor; 3] = [
    EngineDescriptor {
        name: "Google",
        url_template: "https://www.google.com/search?q={query}&num=20",
        rule: ExtractionRule {
            container: "div.g",
            link: "a",
            title: Some("h3"),
            wait_for: "div.g",
            self_domain: Some("google.com"),
        },
    },
    EngineDescriptor {
        name: "Bing",
        url_template: "https://www.bing.com/search?q={query}&count=20",
        rule: ExtractionRule {
            container: "li.b_algo",
            link: "a",
            title: None,
            wait_for: "li.b_algo",
            self_domain: None,
        },
    },
    EngineDescriptor {
        name: "DuckDuckGo",
        url_template: "https://duckduckgo.com/html/?q={query}",
        rule: ExtractionRule {
            container: "div.result",
            link: "a.result__a",
            title: None,
            wait_for: ".result__a",
            self_domain: None,
        },
    },
];

impl EngineDescriptor {
    /// Builds the search URL for `query`, percent-encoding it first.
    pub fn build_url(&self, query: &str) -> String {
        self.url_template
            .replace(QUERY_PLACEHOLDER, &urlencoding::encode(query))
    }

    /// The engine to suggest when this one came back empty.
    pub fn alternate(&self) -> &'static EngineDescriptor {
        let index = ENGINES
            .iter()
            .position(|engine| engine.name == self.name)
            .unwrap_or(0);
        &ENGINES[(index + 1) % ENGINES.len()]
    }
}

/// Returns the default engine (Google).
pub fn default_engine() -> &'static EngineDescriptor {
    &ENGINES[0]
}

/// Finds an engine by name, ignoring case.
pub fn lookup(name: &str) -> Option<&'static EngineDescriptor> {
    let name = name.trim();
    ENGINES
        .iter()
        .find(|engine| engine.name.eq_ignore_ascii_case(name))
}

/// Finds an engine by name, falling back to the default for unknown names.
pub fn resolve(name: &str) -> &'static EngineDescriptor {
    lookup(name).unwrap_or_else(default_engine)
}

/// Builds the search URL for `query` on the engine called `engine_name`.
///
/// Unknown engine names use the default engine; this never fails.
pub fn build_url(engine_name: &str, query: &str) -> String {
    resolve(engine_name).build_url(query)
}

/// Names of all supported engines, in table order.
pub fn engine_names() -> Vec<&'static str> {
    ENGINES.iter().map(|engine| engine.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn query_param(url: &str) -> String {
        let url = Url::parse(url).unwrap();
        url.query_pairs()
            .find(|(key, _)| key == "q")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    #[test]
    fn test_lookup_case_insensitive() {
        assert_eq!(lookup("google").unwrap().name, "Google");
        assert_eq!(lookup("BING").unwrap().name, "Bing");
        assert_eq!(lookup("duckduckgo").unwrap().name, "DuckDuckGo");
        assert_eq!(lookup(" DuckDuckGo ").unwrap().name, "DuckDuckGo");
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup("yahoo").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn test_resolve_unknown_falls_back_to_google() {
        assert_eq!(resolve("yahoo").name, "Google");
        assert_eq!(resolve("").name, "Google");
        assert_eq!(resolve("bing").name, "Bing");
    }

    #[test]
    fn test_build_url_templates() {
        assert_eq!(
            build_url("Google", "rust"),
            "https://www.google.com/search?q=rust&num=20"
        );
        assert_eq!(
            build_url("Bing", "rust"),
            "https://www.bing.com/search?q=rust&count=20"
        );
        assert_eq!(
            build_url("DuckDuckGo", "rust"),
            "https://duckduckgo.com/html/?q=rust"
        );
    }

    #[test]
    fn test_build_url_encodes_query() {
        let url = build_url("google", "intext:password filetype:txt");
        assert_eq!(
            url,
            "https://www.google.com/search?q=intext%3Apassword%20filetype%3Atxt&num=20"
        );
    }

    #[test]
    fn test_build_url_round_trip_all_engines() {
        let queries = [
            "intext:password filetype:txt",
            "site:example.com inurl:admin",
            "\"index of\" /backup & more+stuff",
            "ext:sql 密码 #1 100%",
        ];
        for engine in ENGINES.iter() {
            for query in queries {
                let url = engine.build_url(query);
                assert_eq!(query_param(&url), query, "engine {}", engine.name);
            }
        }
    }

    #[test]
    fn test_build_url_unknown_engine_uses_google() {
        let url = build_url("altavista", "rust");
        assert!(url.starts_with("https://www.google.com/search?q=rust"));
    }

    #[test]
    fn test_alternate_cycles_through_table() {
        assert_eq!(resolve("google").alternate().name, "Bing");
        assert_eq!(resolve("bing").alternate().name, "DuckDuckGo");
        assert_eq!(resolve("duckduckgo").alternate().name, "Google");
    }

    #[test]
    fn test_every_template_has_one_placeholder() {
        for engine in ENGINES.iter() {
            assert_eq!(engine.url_template.matches(QUERY_PLACEHOLDER).count(), 1);
        }
    }

    #[test]
    fn test_engine_names() {
        assert_eq!(engine_names(), vec!["Google", "Bing", "DuckDuckGo"]);
    }

    #[test]
    fn test_only_google_excludes_self_links() {
        assert_eq!(resolve("google").rule.self_domain, Some("google.com"));
        assert!(resolve("bing").rule.self_domain.is_none());
        assert!(resolve("duckduckgo").rule.self_domain.is_none());
    }
}
