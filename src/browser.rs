use std::time::Duration;

use anyhow::Result;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use rand::Rng;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const NAV_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Hide the webdriver flag that job boards sniff for.
const STEALTH_JS: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// Page-level failure. Selector misses are not errors; they stay inside the
/// extractor as exhausted chains.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("page load timed out")]
    NavigationTimeout,
    #[error("{0}")]
    Unexpected(String),
}

/// The one shared browser session for a run. Owns the Chrome process and the
/// CDP event handler task; torn down exactly once via `close`, with a Drop
/// fallback that kills the child process.
pub struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl Session {
    /// Launch headless Chrome with the anti-automation flags job boards
    /// otherwise reject.
    pub async fn launch() -> Result<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-extensions")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", USER_AGENT))
            .build()
            .map_err(|e| anyhow::anyhow!("browser config: {}", e))?;

        let (browser, mut events) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }

    /// Navigate to a URL in a fresh tab and wait for it to settle. The
    /// jittered settle delay is load-bearing: these pages render client-side,
    /// and an immediate DOM query intermittently observes an empty shell.
    pub async fn open(&self, url: &str, settle_ms: (u64, u64)) -> Result<PageGuard, PageError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| PageError::Unexpected(e.to_string()))?;
        let guard = PageGuard::new(page, url.to_string());

        if let Err(e) = guard.page().evaluate_on_new_document(STEALTH_JS).await {
            debug!("stealth script rejected for {}: {}", url, e);
        }

        match tokio::time::timeout(NAV_TIMEOUT, guard.page().goto(url)).await {
            Err(_) => return Err(PageError::NavigationTimeout),
            Ok(Err(e)) => return Err(PageError::Unexpected(e.to_string())),
            Ok(Ok(_)) => {}
        }
        // Best effort: some boards never fire the load event cleanly.
        let _ = tokio::time::timeout(NAV_TIMEOUT, guard.page().wait_for_navigation()).await;

        tokio::time::sleep(jitter(settle_ms)).await;
        Ok(guard)
    }

    /// Tear the session down. Consumes self so it can only happen once.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}

/// Bounded-uniform random delay. A fixed constant is detectable, which
/// defeats the delay's purpose.
pub fn jitter((min_ms, max_ms): (u64, u64)) -> Duration {
    Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
}

/// RAII guard for a page (tab). chromiumoxide pages need an explicit async
/// `close` to release their CDP target; Drop falls back to a spawned
/// best-effort cleanup for error paths.
pub struct PageGuard {
    page: Option<Page>,
    url: String,
    // Captured at construction so the Drop fallback can spawn cleanup even
    // during unwinding.
    runtime: tokio::runtime::Handle,
}

impl PageGuard {
    fn new(page: Page, url: String) -> Self {
        Self {
            page: Some(page),
            url,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    fn page(&self) -> &Page {
        self.page.as_ref().expect("PageGuard: page already closed")
    }

    /// innerText of the first element matching `selector`, trimmed.
    /// `Ok(None)` when the element is absent or its text is empty.
    pub async fn query_text(&self, selector: &str) -> Result<Option<String>, PageError> {
        let script = format!(
            "(() => {{ const el = document.querySelector('{}'); \
             return el ? el.innerText : null; }})()",
            escape(selector)
        );
        let text: Option<String> = self.eval(&script).await?;
        Ok(text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
    }

    /// innerHTML of the first element matching `selector`.
    pub async fn query_html(&self, selector: &str) -> Result<Option<String>, PageError> {
        let script = format!(
            "(() => {{ const el = document.querySelector('{}'); \
             return el ? el.innerHTML : null; }})()",
            escape(selector)
        );
        let html: Option<String> = self.eval(&script).await?;
        Ok(html.filter(|h| !h.trim().is_empty()))
    }

    /// Trimmed innerText of every element matching `selector`.
    pub async fn query_text_all(&self, selector: &str) -> Result<Vec<String>, PageError> {
        let script = format!(
            "Array.from(document.querySelectorAll('{}')).map(el => el.innerText)",
            escape(selector)
        );
        let texts: Vec<String> = self.eval(&script).await?;
        Ok(texts
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }

    /// Click the first element matching `selector` if it exists. Absence of
    /// the control is not an error.
    pub async fn click_if_present(&self, selector: &str) -> Result<bool, PageError> {
        let script = format!(
            "(() => {{ const el = document.querySelector('{}'); \
             if (!el) return false; el.click(); return true; }})()",
            escape(selector)
        );
        self.eval(&script).await
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, PageError> {
        self.page()
            .evaluate(script)
            .await
            .map_err(|e| PageError::Unexpected(e.to_string()))?
            .into_value()
            .map_err(|e| PageError::Unexpected(e.to_string()))
    }

    /// Explicitly close the tab. Preferred over the Drop fallback.
    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("failed to close page for {}: {}", self.url, e);
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let url = std::mem::take(&mut self.url);
            self.runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!("page cleanup failed for {}: {}", url, e);
                }
            });
        }
    }
}

fn escape(selector: &str) -> String {
    selector.replace('\\', "\\\\").replace('\'', "\\'")
}
