use std::sync::Arc;

use crate::app::error::Result;
use crate::cache::Cache;
use crate::config::Config;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::gatherer::InformationGatherer;
use crate::pipeline::{AnswerGenerator, Pipeline, SearchProvider};
use crate::processor::ContentProcessor;
use crate::scraper::{
    ChromeLauncher, ChromeRenderer, PageRenderer, RendererPool, ScrapeOrchestrator, Scraper,
};
use crate::store::{KvStore, SqliteStore};

/// Owns the one renderer pool per process and everything wired to it.
pub struct AppContext {
    pub cache: Cache,
    pub pool: Arc<RendererPool<ChromeLauncher>>,
    pub scraper: Arc<dyn Scraper>,
    pub gatherer: Arc<InformationGatherer>,
    pub processor: Arc<ContentProcessor>,
}

impl AppContext {
    /// Must be called inside a tokio runtime; the pool's health check is spawned here.
    pub fn new(config: &Config) -> Result<Self> {
        let db_path = config.cache.resolve_db_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_store(config, Arc::new(SqliteStore::new(&db_path)?))
    }

    pub fn in_memory(config: &Config) -> Result<Self> {
        Self::with_store(config, Arc::new(SqliteStore::in_memory()?))
    }

    fn with_store(config: &Config, store: Arc<dyn KvStore>) -> Result<Self> {
        let cache = Cache::new(store);

        let pool = RendererPool::start(
            ChromeLauncher::new(config.scraper.clone()),
            config.pool.clone(),
        );
        let renderer: Arc<dyn PageRenderer> =
            Arc::new(ChromeRenderer::new(pool.clone(), config.scraper.clone()));
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.scraper)?);

        let scraper: Arc<dyn Scraper> = Arc::new(ScrapeOrchestrator::new(
            cache.clone(),
            fetcher,
            renderer,
            config.scraper.clone(),
        ));
        let gatherer = Arc::new(InformationGatherer::new(
            scraper.clone(),
            cache.clone(),
            pool.max_sessions(),
            &config.gatherer,
        ));
        let processor = Arc::new(ContentProcessor::new()?);

        Ok(Self {
            cache,
            pool,
            scraper,
            gatherer,
            processor,
        })
    }

    /// Attach the external collaborators needed for full responses.
    pub fn pipeline(
        &self,
        generator: Arc<dyn AnswerGenerator>,
        search: Arc<dyn SearchProvider>,
    ) -> Pipeline {
        Pipeline::new(
            self.cache.clone(),
            self.scraper.clone(),
            self.gatherer.clone(),
            self.processor.clone(),
            generator,
            search,
        )
    }

    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScrapeMethod;

    #[tokio::test]
    async fn test_in_memory_context_is_lazy() {
        let ctx = AppContext::in_memory(&Config::default()).unwrap();

        assert_eq!(ctx.pool.max_sessions(), 3);
        assert_eq!(ctx.pool.live_sessions().await, 0);

        ctx.shutdown().await;
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_url_never_touches_the_network() {
        let ctx = AppContext::in_memory(&Config::default()).unwrap();

        let result = ctx.scraper.scrape("not a url").await;
        assert!(!result.success);
        assert_eq!(result.scrape_method, ScrapeMethod::Cheerio);
        assert_eq!(ctx.pool.live_sessions().await, 0);

        ctx.shutdown().await;
    }
}
