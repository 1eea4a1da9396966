//! Two-tier content acquisition.
//!
//! # Architecture
//!
//! ```text
//! URL → cache ─hit─────────────────────────────────────→ ScrapeResult (cache)
//!        └miss→ fetch + static extract → quality gate ─pass→ ScrapeResult (cheerio)
//!                                          └fail→ rendered extract → gate ─pass→ (puppeteer)
//!                                                                      └fail→ failure
//! ```
//!
//! The rendered strategy borrows headless Chrome sessions from a bounded
//! [`RendererPool`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use tributary::scraper::{ChromeLauncher, ChromeRenderer, RendererPool, ScrapeOrchestrator};
//!
//! let pool = RendererPool::start(ChromeLauncher::new(config.clone()), PoolConfig::default());
//! let renderer = Arc::new(ChromeRenderer::new(pool.clone(), config.clone()));
//! let orchestrator = ScrapeOrchestrator::new(cache, fetcher, renderer, config);
//!
//! let result = orchestrator.scrape("https://example.com/article").await;
//! pool.shutdown().await;
//! ```

mod chrome;
mod config;
mod extractor;
mod orchestrator;
mod pool;
pub mod quality;

pub use chrome::{ChromeLauncher, ChromeRenderer, ChromeSession};
pub use config::{PoolConfig, ScraperConfig};
pub use extractor::{ContentExtractor, ExtractedContent, MIN_FRAGMENT_CHARS};
pub use orchestrator::ScrapeOrchestrator;
pub use pool::{RenderSession, RendererPool, SessionHandle, SessionLauncher};

use crate::app::Result;
use crate::domain::ScrapeResult;
use async_trait::async_trait;

/// Produces readable text from a live, script-executing render of a URL
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<ExtractedContent>;
}

/// Trait for per-URL scraping implementations
///
/// Implementations never fail: every outcome, including errors, is reported
/// through the returned [`ScrapeResult`].
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, url: &str) -> ScrapeResult;
}
