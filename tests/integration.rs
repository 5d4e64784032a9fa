//! End-to-end retrieval tests through the public API.
//!
//! The HTTP strategy runs against a local mock server and the browser
//! strategy against a scripted fake, so these run offline. The live tests at
//! the bottom hit real engines and are `#[ignore]`d.
//!
//! Run the live ones with: `cargo test --test integration -- --ignored`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dorker::{AttemptOutcome, HttpStrategy, Retriever, SearchRequest, SearchResult};

const BING_PAGE: &str = r#"
    <html><body><ol id="b_results">
        <li class="b_algo"><h2><a href="https://a.example/">A</a></h2><p>first</p></li>
        <li class="b_algo"><h2><a href="https://b.example/">B</a></h2><p>second</p></li>
    </ol></body></html>
"#;

async fn mock_engine(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    server
}

fn request_against(server: &MockServer, engine: &str, query: &str) -> SearchRequest {
    let url = format!("{}/search?q={}", server.uri(), urlencoding::encode(query));
    SearchRequest::new(query, engine).with_url(url)
}

#[cfg(feature = "headless")]
mod with_browser {
    use super::*;
    use async_trait::async_trait;

    use dorker::browser::{
        BrowserLauncher, BrowserSession, BrowserStrategy, DelayWindow, LaunchOptions, RawHit,
    };
    use dorker::{ExtractionRule, Result};

    /// Serves a fixed set of hits and counts launches.
    struct ScriptedLauncher {
        hits: Vec<RawHit>,
        launches: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    struct ScriptedSession {
        hits: Vec<RawHit>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserLauncher for ScriptedLauncher {
        async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn BrowserSession>> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession {
                hits: self.hits.clone(),
                closes: Arc::clone(&self.closes),
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn navigate(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn wait_for(&mut self, _css: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn collect(&mut self, _rule: &ExtractionRule) -> Result<Vec<Result<RawHit>>> {
            Ok(self.hits.iter().cloned().map(Ok).collect())
        }

        async fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        retriever: Retriever,
        launches: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    fn harness(hits: Vec<RawHit>) -> Harness {
        let launches = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        let launcher = ScriptedLauncher {
            hits,
            launches: Arc::clone(&launches),
            closes: Arc::clone(&closes),
        };
        let browser =
            BrowserStrategy::with_launcher(Arc::new(launcher)).with_delay(DelayWindow::none());
        let retriever = Retriever::new()
            .with_strategy(HttpStrategy::new())
            .with_strategy(browser);
        Harness {
            retriever,
            launches,
            closes,
        }
    }

    fn hit(title: &str, link: &str) -> RawHit {
        RawHit {
            title: title.to_string(),
            link: Some(link.to_string()),
        }
    }

    #[tokio::test]
    async fn test_http_success_never_launches_browser() {
        let server = mock_engine(200, BING_PAGE).await;
        let harness = harness(vec![hit("Never", "https://never.example/")]);

        let retrieval = harness
            .retriever
            .retrieve_detailed(&request_against(&server, "bing", "x"))
            .await;

        assert_eq!(
            retrieval.results,
            vec![
                SearchResult::new("A", "https://a.example/"),
                SearchResult::new("B", "https://b.example/"),
            ]
        );
        assert_eq!(retrieval.strategy, Some("http"));
        assert!(!retrieval.used_fallback());
        assert_eq!(harness.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_http_error_falls_back_to_browser() {
        let server = mock_engine(503, "Service Unavailable").await;
        let harness = harness(vec![hit("C", "https://c.example/")]);

        let retrieval = harness
            .retriever
            .retrieve_detailed(&request_against(&server, "bing", "x"))
            .await;

        assert_eq!(retrieval.results, vec![SearchResult::new("C", "https://c.example/")]);
        assert_eq!(retrieval.strategy, Some("browser"));
        assert!(matches!(
            retrieval.attempts[0].outcome,
            AttemptOutcome::Failed(ref reason) if reason.contains("503")
        ));
        assert_eq!(harness.launches.load(Ordering::SeqCst), 1);
        assert_eq!(harness.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_page_and_empty_browser_yield_nothing() {
        let server = mock_engine(200, "<html><body>no results here</body></html>").await;
        let harness = harness(vec![]);

        let retrieval = harness
            .retriever
            .retrieve_detailed(&request_against(&server, "duckduckgo", "nothing"))
            .await;

        assert!(retrieval.results.is_empty());
        assert_eq!(retrieval.attempts.len(), 2);
        assert!(retrieval
            .attempts
            .iter()
            .all(|attempt| attempt.outcome == AttemptOutcome::Empty));
        assert_eq!(harness.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_browser_results_are_filtered() {
        let server = mock_engine(429, "").await;
        let harness = harness(vec![
            hit("Internal", "https://www.google.com/search?q=more"),
            hit("", "https://untitled.example/"),
            hit("Relative", "/url?q=x"),
            hit("Kept", "https://kept.example/"),
        ]);

        let results = harness
            .retriever
            .retrieve_detailed(&request_against(&server, "google", "x"))
            .await
            .results;

        assert_eq!(results, vec![SearchResult::new("Kept", "https://kept.example/")]);
    }
}

/// A strategy that records whether it was asked.
struct Counting {
    calls: AtomicUsize,
    results: Vec<SearchResult>,
}

#[async_trait::async_trait]
impl dorker::SearchStrategy for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn fetch(&self, _request: &SearchRequest) -> dorker::Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

#[tokio::test]
async fn test_http_then_custom_fallback() {
    let server = mock_engine(200, BING_PAGE).await;
    let fallback = Arc::new(Counting {
        calls: AtomicUsize::new(0),
        results: vec![SearchResult::new("Z", "https://z.example/")],
    });
    let retriever = Retriever::new()
        .with_strategy(HttpStrategy::new())
        .with_shared_strategy(fallback.clone());

    let found = retriever
        .retrieve_detailed(&request_against(&server, "bing", "x"))
        .await
        .results;

    assert_eq!(found.len(), 2);
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_connection_refused_falls_through() {
    let request = SearchRequest::new("x", "bing").with_url("http://127.0.0.1:1/search?q=x");

    let fallback = Arc::new(Counting {
        calls: AtomicUsize::new(0),
        results: vec![],
    });
    let retriever = Retriever::new()
        .with_strategy(HttpStrategy::new().with_timeout(Duration::from_secs(2)))
        .with_shared_strategy(fallback.clone());

    let retrieval = retriever.retrieve_detailed(&request).await;

    assert!(retrieval.results.is_empty());
    assert!(matches!(retrieval.attempts[0].outcome, AttemptOutcome::Failed(_)));
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
}

mod live {
    use super::*;
    use dorker::Config;

    async fn live_search(engine: &str, query: &str) -> Vec<SearchResult> {
        let retriever = Retriever::from_config(&Config::default()).unwrap();
        let retrieval = retriever
            .retrieve_detailed(&SearchRequest::new(query, engine))
            .await;
        println!(
            "{} returned {} results via {:?} in {}ms",
            engine,
            retrieval.results.len(),
            retrieval.strategy,
            retrieval.duration_ms
        );
        for (i, result) in retrieval.results.iter().take(3).enumerate() {
            println!("  {}. {} - {}", i + 1, result.title, result.link);
        }
        retrieval.results
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_duckduckgo() {
        let results = live_search("duckduckgo", "rust programming language").await;
        assert!(results.iter().all(|r| r.link.starts_with("http")));
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_bing() {
        let results = live_search("bing", "site:rust-lang.org").await;
        assert!(results.iter().all(|r| !r.title.is_empty()));
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_google() {
        let results = live_search("google", "filetype:pdf rust").await;
        assert!(results
            .iter()
            .all(|r| !r.host().unwrap_or_default().contains("google.com")));
    }
}
