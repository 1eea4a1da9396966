use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::app::{Result, TributaryError};
use crate::cache::{keys, Cache};
use crate::domain::{MetricsTimer, ScrapeMethod, ScrapeResult};
use crate::fetcher::Fetcher;
use crate::scraper::extractor::{ContentExtractor, ExtractedContent};
use crate::scraper::quality;
use crate::scraper::{PageRenderer, ScraperConfig, Scraper};

pub const VALIDATION_FAILED: &str = "Content validation failed";

/// Per-URL cache → static → rendered workflow
pub struct ScrapeOrchestrator {
    cache: Cache,
    fetcher: Arc<dyn Fetcher>,
    renderer: Arc<dyn PageRenderer>,
    extractor: ContentExtractor,
}

impl ScrapeOrchestrator {
    pub fn new(
        cache: Cache,
        fetcher: Arc<dyn Fetcher>,
        renderer: Arc<dyn PageRenderer>,
        config: ScraperConfig,
    ) -> Self {
        Self {
            cache,
            fetcher,
            renderer,
            extractor: ContentExtractor::new(config),
        }
    }

    async fn run(&self, url: &str, timer: &mut Option<MetricsTimer>) -> Result<ScrapeResult> {
        validate_url(url)?;

        let key = keys::scrape_key(url);
        if let Some(cached) = self.cache.get::<ScrapeResult>(&key).await {
            debug!("Serving {} from cache", url);
            return Ok(cached.served_from_cache());
        }

        if let Some(t) = timer.as_mut() {
            t.mark_static_attempt();
        }
        match self.try_static(url).await {
            Ok(extracted) => {
                let verdict = quality::assess(&extracted.text);
                if verdict.is_pass() {
                    info!("Static extraction succeeded for {}", url);
                    return Ok(self
                        .complete(url, extracted, ScrapeMethod::Cheerio, timer, &key)
                        .await);
                }
                debug!("Static extraction rejected for {}: {:?}", url, verdict);
            }
            Err(e) => warn!("Static extraction failed for {}: {}", url, e),
        }

        if let Some(t) = timer.as_mut() {
            t.mark_rendered_attempt();
        }
        let extracted = self.renderer.render(url).await?;
        let verdict = quality::assess(&extracted.text);
        if verdict.is_pass() {
            info!("Rendered extraction succeeded for {}", url);
            return Ok(self
                .complete(url, extracted, ScrapeMethod::Puppeteer, timer, &key)
                .await);
        }

        info!("Rendered extraction rejected for {}: {:?}", url, verdict);
        Ok(ScrapeResult::failure(
            url,
            VALIDATION_FAILED,
            ScrapeMethod::Puppeteer,
            take_timer(timer),
        ))
    }

    async fn try_static(&self, url: &str) -> Result<ExtractedContent> {
        let html = self.fetcher.fetch(url).await?;
        Ok(self.extractor.extract_html(&html))
    }

    /// Build the success result and write it through to the cache.
    async fn complete(
        &self,
        url: &str,
        extracted: ExtractedContent,
        method: ScrapeMethod,
        timer: &mut Option<MetricsTimer>,
        key: &str,
    ) -> ScrapeResult {
        let result = ScrapeResult::success(
            url,
            extracted.title,
            extracted.text,
            method,
            take_timer(timer),
        );

        if let Err(e) = self.cache.set(key, &result).await {
            warn!("Failed to cache result for {}: {}", url, e);
        }

        result
    }
}

#[async_trait]
impl Scraper for ScrapeOrchestrator {
    async fn scrape(&self, url: &str) -> ScrapeResult {
        let mut timer = Some(MetricsTimer::start());

        match self.run(url, &mut timer).await {
            Ok(result) => result,
            Err(e) => {
                error!("Scraping {} failed: {}", url, e);
                let method = match timer.as_ref() {
                    Some(t) if t.reached_rendered() => ScrapeMethod::Puppeteer,
                    _ => ScrapeMethod::Cheerio,
                };
                ScrapeResult::failure(url, e.to_string(), method, take_timer(&mut timer))
            }
        }
    }
}

fn take_timer(timer: &mut Option<MetricsTimer>) -> MetricsTimer {
    timer.take().unwrap_or_else(MetricsTimer::start)
}

/// Accept only absolute http(s) URLs.
pub fn validate_url(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(TributaryError::InvalidUrl(url.to_string()));
    }

    let parsed = Url::parse(trimmed).map_err(|_| TributaryError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(TributaryError::InvalidUrl(url.to_string())),
    }
}
