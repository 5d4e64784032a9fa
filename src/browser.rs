//! Browser automation retrieval for pages that block or break plain HTTP.
//!
//! This module is only available when the `headless` Cargo feature is enabled.
//! Each fetch launches its own Chrome/Chromium process through the Chrome
//! DevTools Protocol, waits for the engine's result markers, reads the results
//! out of the live DOM, and closes the process again on every exit path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::ExtractionRule;
use crate::extract::accept;
use crate::fetcher::SearchStrategy;
use crate::identity::random_user_agent;
use crate::proxy::ProxyPool;
use crate::{Result, SearchError, SearchRequest, SearchResult};

/// Default bound on waiting for result markers.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Interval between selector checks while waiting for results.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Bound on each step of shutting a browser down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Random pause inserted before navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    min: Duration,
    max: Duration,
}

impl DelayWindow {
    /// Creates a window; bounds are swapped if given in the wrong order.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Picks a pause uniformly inside the window.
    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for DelayWindow {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3))
    }
}

/// How to start one browser process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Whether to run without a window.
    pub headless: bool,
    /// Path to the Chrome/Chromium executable. If `None`, auto-detected.
    pub chrome_path: Option<PathBuf>,
    /// User agent for the whole session.
    pub user_agent: String,
    /// Proxy endpoint for the whole session.
    pub proxy: Option<String>,
}

impl LaunchOptions {
    /// Command-line flags passed to the browser.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(
            [
                "--no-sandbox",
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--disable-blink-features=AutomationControlled",
                "--disable-extensions",
                "--no-first-run",
                "--mute-audio",
            ]
            .map(String::from),
        );
        args.push(format!("--user-agent={}", self.user_agent));
        if let Some(ref proxy) = self.proxy {
            args.push(format!("--proxy-server={}", proxy));
        }
        args
    }
}

/// What one result container yielded before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHit {
    /// Visible title text.
    pub title: String,
    /// Resolved `href`, if the link element had one.
    pub link: Option<String>,
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launches a browser process configured by `options`.
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>>;
}

/// A running browser owned by one fetch.
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url` in a fresh tab.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Waits until `css` matches, failing with [`SearchError::Timeout`].
    async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<()>;

    /// Reads every container matched by `rule`, one entry per container.
    ///
    /// A failure reading one container is reported in its own slot.
    async fn collect(&mut self, rule: &ExtractionRule) -> Result<Vec<Result<RawHit>>>;

    /// Terminates the browser process.
    async fn close(&mut self) -> Result<()>;
}

/// A strategy that renders the engine page in a headless browser.
pub struct BrowserStrategy {
    launcher: Arc<dyn BrowserLauncher>,
    proxies: Arc<ProxyPool>,
    wait_timeout: Duration,
    delay: DelayWindow,
    headless: bool,
    chrome_path: Option<PathBuf>,
}

impl BrowserStrategy {
    /// Creates a strategy that launches Chrome.
    pub fn new() -> Self {
        Self::with_launcher(Arc::new(ChromeLauncher))
    }

    /// Creates a strategy with a custom launcher.
    pub fn with_launcher(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            launcher,
            proxies: Arc::new(ProxyPool::new()),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            delay: DelayWindow::default(),
            headless: true,
            chrome_path: None,
        }
    }

    /// Uses `proxies` for each launched session.
    pub fn with_proxies(mut self, proxies: Arc<ProxyPool>) -> Self {
        self.proxies = proxies;
        self
    }

    /// Sets how long to wait for result markers.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Sets the pause before navigation.
    pub fn with_delay(mut self, delay: DelayWindow) -> Self {
        self.delay = delay;
        self
    }

    /// Runs the browser with a visible window when `false`.
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Uses a specific browser executable.
    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: self.headless,
            chrome_path: self.chrome_path.clone(),
            user_agent: random_user_agent().to_string(),
            proxy: self.proxies.select().map(|proxy| proxy.endpoint()),
        }
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        request: &SearchRequest,
    ) -> Result<Vec<SearchResult>> {
        let rule = &request.engine.rule;

        tokio::time::sleep(self.delay.sample()).await;

        session.navigate(&request.url).await?;

        if let Err(e) = session.wait_for(rule.wait_for, self.wait_timeout).await {
            warn!(
                "{} results did not render within {:?}: {}",
                request.engine.name, self.wait_timeout, e
            );
            return Err(e);
        }

        let hits = session.collect(rule).await?;
        let mut results = Vec::with_capacity(hits.len());

        for (index, hit) in hits.into_iter().enumerate() {
            let hit = match hit {
                Ok(hit) => hit,
                Err(e) => {
                    debug!("Error extracting result {}: {}", index, e);
                    continue;
                }
            };
            match hit.link.as_deref().and_then(|link| accept(rule, &hit.title, link)) {
                Some(result) => results.push(result),
                None => debug!("Discarding candidate link: {:?}", hit.link),
            }
        }

        Ok(results)
    }
}

impl Default for BrowserStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStrategy for BrowserStrategy {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let options = self.launch_options();
        if let Some(ref proxy) = options.proxy {
            debug!("Launching browser through proxy: {}", proxy);
        }

        let mut session = self.launcher.launch(&options).await?;
        let outcome = self.drive(session.as_mut(), request).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser: {}", e);
        }

        if let Ok(ref results) = outcome {
            info!(
                "{} page yielded {} results in browser",
                request.engine.name,
                results.len()
            );
        }
        outcome
    }
}

fn browser_error(context: &str, e: impl std::fmt::Display) -> SearchError {
    SearchError::Browser(format!("{}: {}", context, e))
}

/// Launches local Chrome/Chromium processes.
pub struct ChromeLauncher;

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder();

        if !options.headless {
            builder = builder.with_head();
        }

        // Resolve executable: explicit path > auto-detect > chromiumoxide default lookup
        let chrome_path = options
            .chrome_path
            .clone()
            .or_else(crate::browser_setup::detect_chrome);
        if let Some(path) = chrome_path {
            debug!("Using Chrome at: {}", path.display());
            builder = builder.chrome_executable(path);
        }

        for arg in options.args() {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| browser_error("Failed to build browser config", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error("Failed to launch browser", e))?;

        // Spawn the CDP event handler as a background task
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser CDP handler error: {}", e);
                }
            }
            debug!("Browser CDP handler exited");
        });

        Ok(Box::new(ChromeSession {
            browser,
            handler,
            page: None,
        }))
    }
}

/// One Chrome process with at most one open tab.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
}

impl ChromeSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| SearchError::Browser("No page open".to_string()))
    }
}

async fn read_hit(container: &Element, rule: &ExtractionRule) -> Result<RawHit> {
    let anchor = container
        .find_element(rule.link)
        .await
        .map_err(|e| browser_error("Link element missing", e))?;

    let link = anchor
        .property("href")
        .await
        .map_err(|e| browser_error("Failed to read href", e))?
        .and_then(|value| value.as_str().map(str::to_string));

    let title_element = match rule.title {
        Some(css) => container
            .find_element(css)
            .await
            .map_err(|e| browser_error("Title element missing", e))?,
        None => anchor,
    };

    let title = title_element
        .inner_text()
        .await
        .map_err(|e| browser_error("Failed to read title", e))?
        .unwrap_or_default();

    Ok(RawHit { title, link })
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| browser_error("Failed to open tab", e))?;
        self.page = Some(page);
        Ok(())
    }

    async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        tokio::time::timeout(timeout, async {
            while page.find_element(css).await.is_err() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| SearchError::Timeout)
    }

    async fn collect(&mut self, rule: &ExtractionRule) -> Result<Vec<Result<RawHit>>> {
        let page = self.page()?;
        let containers = page
            .find_elements(rule.container)
            .await
            .map_err(|e| browser_error("Failed to query result containers", e))?;

        let mut hits = Vec::with_capacity(containers.len());
        for container in &containers {
            hits.push(read_hit(container, rule).await);
        }
        Ok(hits)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, page.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Failed to close browser tab: {}", e),
                Err(_) => debug!("Closing browser tab timed out"),
            }
        }

        let outcome = match tokio::time::timeout(CLOSE_TIMEOUT, self.browser.close()).await {
            Ok(Ok(_)) => CloseOutcome::Closed,
            Ok(Err(e)) => CloseOutcome::Failed(e.to_string()),
            Err(_) => CloseOutcome::TimedOut,
        };

        if outcome.needs_kill() {
            warn!("Browser did not close cleanly ({:?}), killing it", outcome);
            match self.browser.kill().await {
                Some(Err(e)) => warn!("Failed to kill browser process: {}", e),
                Some(Ok(())) | None => {}
            }
        }

        match tokio::time::timeout(CLOSE_TIMEOUT, self.browser.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to reap browser process: {}", e),
            Err(_) => warn!("Browser process still running after {:?}", CLOSE_TIMEOUT),
        }
        self.handler.abort();

        outcome.into_result()
    }
}

/// How a graceful browser shutdown went.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CloseOutcome {
    Closed,
    Failed(String),
    TimedOut,
}

impl CloseOutcome {
    /// A process that was not told to exit must be killed before reaping.
    fn needs_kill(&self) -> bool {
        !matches!(self, CloseOutcome::Closed)
    }

    fn into_result(self) -> Result<()> {
        match self {
            CloseOutcome::Closed => Ok(()),
            CloseOutcome::Failed(reason) => Err(browser_error("Failed to close browser", reason)),
            CloseOutcome::TimedOut => Err(SearchError::Timeout),
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
