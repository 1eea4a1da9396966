use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::app::{Result, TributaryError};
use crate::scraper::config::ScraperConfig;
use crate::scraper::extractor::{ContentExtractor, ExtractedContent};
use crate::scraper::pool::{RenderSession, RendererPool, SessionLauncher};
use crate::scraper::PageRenderer;

/// Launches headless Chrome sessions via chromiumoxide
pub struct ChromeLauncher {
    config: ScraperConfig,
}

impl ChromeLauncher {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn launch(&self) -> Result<ChromeSession> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer");

        if !self.config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| TributaryError::Render(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            TributaryError::Render(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {
                // Drive the CDP connection
            }
        });

        Ok(ChromeSession {
            browser: RwLock::new(browser),
            handler,
        })
    }
}

/// One headless Chrome process
pub struct ChromeSession {
    browser: RwLock<Browser>,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    pub async fn new_page(&self) -> Result<Page> {
        self.browser
            .read()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| TributaryError::Render(format!("Failed to create page: {}", e)))
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn probe(&self) -> Result<()> {
        self.browser
            .read()
            .await
            .pages()
            .await
            .map(|_| ())
            .map_err(|e| TributaryError::Render(format!("Browser unresponsive: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        let result = self.browser.write().await.close().await;
        self.handler.abort();
        result
            .map(|_| ())
            .map_err(|e| TributaryError::Render(format!("Failed to close browser: {}", e)))
    }
}

/// Rendered strategy: full page render in a pooled Chrome session
pub struct ChromeRenderer {
    pool: Arc<RendererPool<ChromeLauncher>>,
    config: ScraperConfig,
    extractor: ContentExtractor,
}

impl ChromeRenderer {
    pub fn new(pool: Arc<RendererPool<ChromeLauncher>>, config: ScraperConfig) -> Self {
        let extractor = ContentExtractor::new(config.clone());
        Self {
            pool,
            config,
            extractor,
        }
    }

    fn blocked_resource_types(&self) -> Vec<ResourceType> {
        let mut blocked = Vec::new();
        if self.config.block_images {
            blocked.push(ResourceType::Image);
            blocked.push(ResourceType::Media);
        }
        if self.config.block_stylesheets {
            blocked.push(ResourceType::Stylesheet);
            blocked.push(ResourceType::Font);
        }
        blocked
    }

    /// Intercept requests and fail the non-essential ones.
    ///
    /// Returns the listener task, which the caller must abort when done.
    async fn install_resource_blocking(&self, page: &Page) -> Result<Option<JoinHandle<()>>> {
        let blocked = self.blocked_resource_types();
        if blocked.is_empty() {
            return Ok(None);
        }

        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| TributaryError::Render(format!("Failed to listen for requests: {}", e)))?;

        page.execute(
            EnableParams::builder()
                .pattern(RequestPattern::builder().url_pattern("*").build())
                .build(),
        )
        .await
        .map_err(|e| TributaryError::Render(format!("Failed to enable interception: {}", e)))?;

        let page = page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let outcome = if blocked.contains(&event.resource_type) {
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                } else {
                    page.execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                };

                if let Err(e) = outcome {
                    trace!("Request interception reply failed: {}", e);
                }
            }
        });

        Ok(Some(task))
    }

    async fn extract_from_page(&self, page: &Page, url: &str) -> Result<ExtractedContent> {
        let identity = SetUserAgentOverrideParams::builder()
            .user_agent(self.config.user_agent.clone())
            .accept_language(self.config.accept_language.clone())
            .build()
            .map_err(|e| TributaryError::Render(format!("Invalid user agent override: {}", e)))?;
        page.set_user_agent(identity)
            .await
            .map_err(|e| TributaryError::Render(format!("Failed to set user agent: {}", e)))?;

        let navigation = NavigateParams::builder()
            .url(url)
            .referrer(url)
            .build()
            .map_err(|e| TributaryError::Render(format!("Invalid navigation: {}", e)))?;

        tokio::time::timeout(self.config.navigation_timeout(), page.goto(navigation))
            .await
            .map_err(|_| {
                TributaryError::Timeout(format!(
                    "Navigation to {} exceeded {}s",
                    url, self.config.navigation_timeout_secs
                ))
            })?
            .map_err(|e| TributaryError::Render(format!("Navigation failed: {}", e)))?;

        // Let trailing XHR settle
        tokio::time::sleep(self.config.wait_after_load()).await;

        let script = self.extractor.extraction_script();
        page.evaluate(script)
            .await
            .map_err(|e| TributaryError::Render(format!("Script execution failed: {}", e)))?
            .into_value::<ExtractedContent>()
            .map_err(|e| TributaryError::Render(format!("Failed to parse result: {:?}", e)))
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Result<ExtractedContent> {
        let session = self.pool.acquire().await?;

        let page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                self.pool.release_unhealthy(session).await;
                return Err(e);
            }
        };

        let closing = page.clone();
        let target = url.to_string();
        let mut lease = PageLease::new(async move {
            if let Err(e) = closing.close().await {
                debug!("Page close error for {}: {}", target, e);
            }
        });

        let result = match self.install_resource_blocking(&page).await {
            Ok(blocker) => {
                if let Some(task) = blocker {
                    lease.watch(task);
                }
                self.extract_from_page(&page, url).await
            }
            Err(e) => Err(e),
        };

        lease.release().await;
        result
    }
}

/// Per-caller page cleanup that also runs when the render future is dropped.
struct PageLease {
    close: Option<BoxFuture<'static, ()>>,
    listener: Option<JoinHandle<()>>,
}

impl PageLease {
    fn new(close: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            close: Some(close.boxed()),
            listener: None,
        }
    }

    fn watch(&mut self, listener: JoinHandle<()>) {
        self.listener = Some(listener);
    }

    async fn release(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(close) = self.close.take() {
            close.await;
        }
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(close) = self.close.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(close);
                }
                Err(_) => warn!("No runtime left to close an abandoned page"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn flagged_lease(closed: &Arc<AtomicBool>) -> PageLease {
        let flag = closed.clone();
        PageLease::new(async move { flag.store(true, Ordering::SeqCst) })
    }

    #[tokio::test]
    async fn test_release_closes_page_and_stops_listener() {
        let closed = Arc::new(AtomicBool::new(false));
        let listener = tokio::spawn(futures::future::pending::<()>());
        let listener_state = listener.abort_handle();

        let mut lease = flagged_lease(&closed);
        lease.watch(listener);
        lease.release().await;

        assert!(closed.load(Ordering::SeqCst));
        for _ in 0..10 {
            if listener_state.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(listener_state.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_render_still_closes_page() {
        let closed = Arc::new(AtomicBool::new(false));
        let listener = tokio::spawn(futures::future::pending::<()>());
        let listener_state = listener.abort_handle();

        let mut lease = flagged_lease(&closed);
        lease.watch(listener);

        // Stands in for a navigation that outlives the caller's deadline
        let render = tokio::spawn(async move {
            let _lease = lease;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let timed_out = tokio::time::timeout(Duration::from_secs(60), async {
            tokio::time::sleep(Duration::from_secs(61)).await;
        })
        .await;
        assert!(timed_out.is_err());
        render.abort();
        assert!(render.await.unwrap_err().is_cancelled());

        for _ in 0..10 {
            if closed.load(Ordering::SeqCst) && listener_state.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(closed.load(Ordering::SeqCst));
        assert!(listener_state.is_finished());
    }
}
