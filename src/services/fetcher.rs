// src/services/fetcher.rs

//! Page acquisition service.
//!
//! `FetchClient` builds the time-bounded search URL, drives a
//! [`PageFetcher`] under a hard timeout, tells blocked pages apart from
//! content, and keeps a copy of the markup for offline inspection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chrono::Local;
use futures::StreamExt;
use scraper::Html;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{BrowserConfig, SourceConfig};
use crate::storage::ArtifactWriter;

/// Script evaluated in every new document before any page script runs.
///
/// Masks the most common headless fingerprints: empty language and plugin
/// lists, and the SwiftShader WebGL vendor/renderer strings.
pub const EVASION_SCRIPT: &str = r#"
Object.defineProperty(navigator, "languages", {
    get: function () {
        return ["en-US", "en"];
    },
});

Object.defineProperty(navigator, "plugins", {
    get: function () {
        return [1, 2, 3, 4, 5];
    },
});

const getParameter = WebGLRenderingContext.prototype.getParameter;
WebGLRenderingContext.prototype.getParameter = function (parameter) {
    // UNMASKED_VENDOR_WEBGL
    if (parameter === 37445) {
        return "Intel Open Source Technology Center";
    }
    // UNMASKED_RENDERER_WEBGL
    if (parameter === 37446) {
        return "Mesa DRI Intel(R) Ivybridge Mobile ";
    }
    return getParameter.call(this, parameter);
};
"#;

const BODY_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// Rendered page as seen by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Full document markup after scripts ran
    pub markup: String,
    /// Visible text of the body
    pub text: String,
}

impl RenderedPage {
    /// Build a page from markup alone, deriving the text from the DOM.
    pub fn from_markup(markup: impl Into<String>) -> Self {
        let markup = markup.into();
        let text = Html::parse_document(&markup)
            .root_element()
            .text()
            .collect::<String>();
        Self { markup, text }
    }
}

/// Outcome of one page acquisition.
#[derive(Debug)]
pub enum PageResult {
    /// The page was retrieved and is not a block page
    Content(String),
    /// The source rejected the session
    Blocked,
    /// Transport or automation failure, including timeouts
    Error(AppError),
}

/// Capability to render a URL into markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RenderedPage>;
}

/// Build the search URL returning listings created at or after `watermark`.
pub fn search_url(source: &SourceConfig, watermark: i64) -> String {
    format!(
        "{}{}?create_time=gte,{}",
        source.domain.trim_end_matches('/'),
        source.endpoint_path,
        watermark
    )
}

/// Whether the page body carries the block sentinel.
pub fn is_blocked(body_text: &str, sentinel: &str) -> bool {
    !sentinel.is_empty() && body_text.contains(sentinel)
}

/// Fetch step of the watch cycle.
pub struct FetchClient {
    fetcher: Arc<dyn PageFetcher>,
    source: SourceConfig,
    timeout: Duration,
    artifacts: Option<ArtifactWriter>,
}

impl FetchClient {
    pub fn new(fetcher: Arc<dyn PageFetcher>, source: SourceConfig, timeout: Duration) -> Self {
        Self {
            fetcher,
            source,
            timeout,
            artifacts: None,
        }
    }

    /// Keep a copy of every fetched page under `writer`.
    pub fn with_artifacts(mut self, writer: ArtifactWriter) -> Self {
        self.artifacts = Some(writer);
        self
    }

    /// Retrieve listings created at or after `watermark` (seconds since epoch).
    pub async fn fetch(&self, watermark: i64) -> PageResult {
        let url = search_url(&self.source, watermark);
        log::info!("Getting from url {}", url);

        let page = match tokio::time::timeout(self.timeout, self.fetcher.fetch(&url)).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return PageResult::Error(e),
            Err(_) => {
                return PageResult::Error(AppError::timeout("Page fetch", self.timeout.as_secs()));
            }
        };

        if is_blocked(&page.text, &self.source.blocked_sentinel) {
            return PageResult::Blocked;
        }

        if let Some(writer) = &self.artifacts {
            writer.save_markup(&page.markup, Local::now()).await;
        }

        PageResult::Content(page.markup)
    }
}

/// Page fetcher driving a fresh headless Chrome session per fetch.
pub struct BrowserFetcher {
    config: BrowserConfig,
}

impl BrowserFetcher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Launch configuration mirroring a regular desktop browser.
    fn launch_config(&self) -> Result<LaunchConfig> {
        let (width, height) = self.config.window_size;
        let mut builder = LaunchConfig::builder()
            .no_sandbox()
            .window_size(width, height)
            .request_timeout(self.config.timeout())
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--start-maximized")
            .arg(format!("--user-agent={}", self.config.user_agent));

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }
        for arg in &self.config.args {
            builder = builder.arg(arg.clone());
        }

        builder.build().map_err(AppError::browser)
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<RenderedPage> {
        let session = BrowserSession::launch(self.launch_config()?).await?;
        let result = session.render(url).await;
        session.close().await;
        result
    }
}

/// A running browser plus the task pumping its CDP connection.
///
/// Call [`BrowserSession::close`] when done. If the session is dropped
/// instead (error path, cancelled cycle) the handler task is aborted and
/// the browser's own drop kills the child process.
struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
}

impl BrowserSession {
    async fn launch(config: LaunchConfig) -> Result<Self> {
        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            handler: Some(handler),
        })
    }

    async fn render(&self, url: &str) -> Result<RenderedPage> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| AppError::browser("session already closed"))?;

        let page = browser.new_page("about:blank").await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(EVASION_SCRIPT))
            .await?;
        page.goto(url).await?;

        let markup = page.content().await?;
        let text = page
            .evaluate(BODY_TEXT_JS)
            .await?
            .into_value::<String>()
            .map_err(|e| AppError::browser(format!("reading body text: {e}")))?;

        if let Err(e) = page.close().await {
            log::debug!("Failed to close page for {}: {}", url, e);
        }

        Ok(RenderedPage { markup, text })
    }

    /// Shut the browser down and wait for the handler to finish.
    async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                log::warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                log::debug!("Browser process did not exit cleanly: {}", e);
            }
        }
        if let Some(handler) = self.handler.take() {
            let _ = handler.await;
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if self.browser.take().is_some() {
            log::debug!("Browser session dropped without close");
        }
    }
}

/// One canned response of a [`StaticPageFetcher`].
#[derive(Debug, Clone)]
pub enum StaticResponse {
    Page(RenderedPage),
    Fail(String),
    /// Never completes; exercises the fetch timeout
    Hang,
}

/// Page fetcher that replays canned responses, for tests and offline runs.
///
/// Responses are consumed in order; the last one is repeated forever.
#[derive(Debug, Default)]
pub struct StaticPageFetcher {
    responses: Mutex<VecDeque<StaticResponse>>,
    requests: Mutex<Vec<String>>,
}

impl StaticPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a page built from markup.
    pub fn with_markup(self, markup: impl Into<String>) -> Self {
        self.with_response(StaticResponse::Page(RenderedPage::from_markup(markup)))
    }

    pub fn with_response(self, response: StaticResponse) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_response(&self) -> Option<StaticResponse> {
        let mut responses = self.responses.lock().ok()?;
        if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        }
    }
}

#[async_trait]
impl PageFetcher for StaticPageFetcher {
    async fn fetch(&self, url: &str) -> Result<RenderedPage> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }

        match self.next_response() {
            Some(StaticResponse::Page(page)) => Ok(page),
            Some(StaticResponse::Fail(message)) => Err(AppError::browser(message)),
            Some(StaticResponse::Hang) => futures::future::pending().await,
            None => Err(AppError::browser("no canned response")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source() -> SourceConfig {
        SourceConfig {
            domain: "https://listings.test/".to_string(),
            endpoint_path: "/realestate/rent".to_string(),
            blocked_sentinel: "blocked".to_string(),
        }
    }

    fn client(fetcher: StaticPageFetcher) -> (Arc<StaticPageFetcher>, FetchClient) {
        let fetcher = Arc::new(fetcher);
        let client = FetchClient::new(fetcher.clone(), source(), Duration::from_secs(5));
        (fetcher, client)
    }

    #[test]
    fn test_search_url() {
        assert_eq!(
            search_url(&source(), 1_700_000_000),
            "https://listings.test/realestate/rent?create_time=gte,1700000000"
        );
    }

    #[test]
    fn test_is_blocked() {
        assert!(is_blocked("You have been blocked.", "blocked"));
        assert!(!is_blocked("3 new apartments", "blocked"));
        assert!(!is_blocked("anything", ""));
    }

    #[test]
    fn test_evasion_script_spoofs_webgl_codes() {
        assert!(EVASION_SCRIPT.contains("37445"));
        assert!(EVASION_SCRIPT.contains("37446"));
        assert!(EVASION_SCRIPT.contains(r#"["en-US", "en"]"#));
    }

    #[test]
    fn test_rendered_page_text_from_markup() {
        let page =
            RenderedPage::from_markup("<html><body><p>You were <b>blocked</b></p></body></html>");
        assert!(page.text.contains("You were blocked"));
    }

    #[tokio::test]
    async fn test_content_is_returned_and_saved() {
        let tmp = TempDir::new().unwrap();
        let fetcher =
            Arc::new(StaticPageFetcher::new().with_markup("<html><body>ok</body></html>"));
        let client = FetchClient::new(fetcher.clone(), source(), Duration::from_secs(5))
            .with_artifacts(ArtifactWriter::new(tmp.path()));

        match client.fetch(42).await {
            PageResult::Content(markup) => assert!(markup.contains("ok")),
            other => panic!("expected content, got {other:?}"),
        }
        assert_eq!(
            fetcher.requests(),
            vec!["https://listings.test/realestate/rent?create_time=gte,42"]
        );

        let mut saved = tokio::fs::read_dir(tmp.path().join("body")).await.unwrap();
        assert!(saved.next_entry().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_block_page_is_reported() {
        let (_, client) = client(
            StaticPageFetcher::new().with_markup("<html><body>Request blocked</body></html>"),
        );
        assert!(matches!(client.fetch(0).await, PageResult::Blocked));
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let (_, client) = client(
            StaticPageFetcher::new().with_response(StaticResponse::Fail("net::ERR".to_string())),
        );
        assert!(matches!(
            client.fetch(0).await,
            PageResult::Error(AppError::Browser(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_times_out() {
        let (_, client) = client(StaticPageFetcher::new().with_response(StaticResponse::Hang));
        assert!(matches!(
            client.fetch(0).await,
            PageResult::Error(AppError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_last_response_repeats() {
        let fetcher = StaticPageFetcher::new()
            .with_response(StaticResponse::Fail("first".to_string()))
            .with_markup("<html><body>second</body></html>");

        assert!(fetcher.fetch("a").await.is_err());
        assert!(fetcher.fetch("b").await.unwrap().text.contains("second"));
        assert!(fetcher.fetch("c").await.unwrap().text.contains("second"));
        assert_eq!(fetcher.requests(), vec!["a", "b", "c"]);
    }
}
