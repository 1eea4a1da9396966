//! Request-level flow: intent analysis, URL selection, gathering, context
//! building, and answer generation.
//!
//! The answer generator and search provider are external collaborators
//! reached through [`AnswerGenerator`] and [`SearchProvider`].

mod retry;

pub use retry::with_retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::{Result, TributaryError};
use crate::cache::{Cache, DEFAULT_HISTORY_LIMIT};
use crate::domain::{ChatEntry, QueryAnalysis, ScrapeResult, SearchHit};
use crate::gatherer::{validate_results, GatherReport, InformationGatherer};
use crate::processor::{ContentProcessor, ProcessedContent};
use crate::scraper::Scraper;

/// Search results requested per query
pub const SEARCH_RESULT_LIMIT: usize = 5;
pub const GENERATION_ATTEMPTS: u32 = 3;
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Language-model collaborator
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn analyze_intent(&self, message: &str, history: &[ChatEntry]) -> Result<QueryAnalysis>;
    async fn generate_answer(&self, prompt: &str) -> Result<String>;
}

/// Web search collaborator; returns an empty list rather than failing
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchHit>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResponse {
    pub answer: String,
    pub analysis: QueryAnalysis,
    /// URLs whose content made it into the context
    pub sources: Vec<String>,
    pub used_context: bool,
}

pub struct Pipeline {
    cache: Cache,
    scraper: Arc<dyn Scraper>,
    gatherer: Arc<InformationGatherer>,
    processor: Arc<ContentProcessor>,
    generator: Arc<dyn AnswerGenerator>,
    search: Arc<dyn SearchProvider>,
}

impl Pipeline {
    pub fn new(
        cache: Cache,
        scraper: Arc<dyn Scraper>,
        gatherer: Arc<InformationGatherer>,
        processor: Arc<ContentProcessor>,
        generator: Arc<dyn AnswerGenerator>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self {
            cache,
            scraper,
            gatherer,
            processor,
            generator,
            search,
        }
    }

    pub async fn gather(&self, query: &str, conversation_id: &str, urls: &[String]) -> GatherReport {
        debug!("Gathering context for query: {}", query);
        self.gatherer.gather(conversation_id, urls).await
    }

    pub async fn scrape_one(&self, url: &str) -> ScrapeResult {
        self.scraper.scrape(url).await
    }

    pub fn process_for_context(&self, results: &[ScrapeResult]) -> ProcessedContent {
        self.processor.process(&validate_results(results))
    }

    pub async fn respond(&self, message: &str, conversation_id: &str) -> Result<PipelineResponse> {
        if message.trim().is_empty() {
            return Err(TributaryError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }

        let history = self
            .cache
            .recent_chat(conversation_id, DEFAULT_HISTORY_LIMIT)
            .await;

        let analysis = match self.generator.analyze_intent(message, &history).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Intent analysis failed, answering without context: {}", e);
                QueryAnalysis::degraded()
            }
        };

        let urls = self.select_urls(message, &analysis).await;

        let mut sources = Vec::new();
        let mut context = None;
        if !urls.is_empty() {
            let report = self.gather(message, conversation_id, &urls).await;
            let documents = report.documents();
            if !documents.is_empty() {
                sources = documents.iter().map(|d| d.url.clone()).collect();
                context = Some(self.processor.process(&documents).content);
            }
        }

        let (answer, used_context) = match context {
            Some(context) => {
                let prompt = build_prompt(message, &history, Some(&context));
                match self.generate(&prompt).await {
                    Ok(answer) => (answer, true),
                    Err(e) => {
                        warn!("Answer with context failed, retrying without: {}", e);
                        let prompt = build_prompt(message, &history, None);
                        (self.generate(&prompt).await?, false)
                    }
                }
            }
            None => {
                let prompt = build_prompt(message, &history, None);
                (self.generate(&prompt).await?, false)
            }
        };

        if !used_context {
            sources.clear();
        }

        self.cache
            .push_chat(conversation_id, &ChatEntry::new(message, answer.as_str()))
            .await;

        info!(
            "Answered in conversation {} ({} source(s), context: {})",
            conversation_id,
            sources.len(),
            used_context
        );

        Ok(PipelineResponse {
            answer,
            analysis,
            sources,
            used_context,
        })
    }

    async fn select_urls(&self, message: &str, analysis: &QueryAnalysis) -> Vec<String> {
        if !analysis.extracted_urls.is_empty() {
            return analysis.extracted_urls.clone();
        }
        if !analysis.needs_search || analysis.is_casual {
            return Vec::new();
        }

        let query = analysis.search_query.as_deref().unwrap_or(message);
        let mut hits = self.search.search(query, SEARCH_RESULT_LIMIT).await;
        hits.sort_by(|a, b| b.authority_score.total_cmp(&a.authority_score));
        debug!("Search for '{}' returned {} hit(s)", query, hits.len());

        hits.into_iter().map(|hit| hit.url).collect()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        with_retry(GENERATION_ATTEMPTS, RETRY_BASE_DELAY, || {
            self.generator.generate_answer(prompt)
        })
        .await
    }
}

fn build_prompt(message: &str, history: &[ChatEntry], context: Option<&str>) -> String {
    let mut prompt = String::new();

    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        // History is newest first
        for entry in history.iter().rev() {
            prompt.push_str(&format!(
                "User: {}\nAssistant: {}\n",
                entry.user_message, entry.ai_response
            ));
        }
        prompt.push('\n');
    }

    if let Some(context) = context {
        prompt.push_str("Context:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Question: ");
    prompt.push_str(message);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MetricsTimer, ScrapeMethod};
    use crate::gatherer::GathererConfig;
    use crate::store::SqliteStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeScraper;

    #[async_trait]
    impl Scraper for FakeScraper {
        async fn scrape(&self, url: &str) -> ScrapeResult {
            if url.contains("/dead") {
                return ScrapeResult::failure(
                    url,
                    "Content validation failed",
                    ScrapeMethod::Puppeteer,
                    MetricsTimer::start(),
                );
            }
            ScrapeResult::success(
                url,
                None,
                format!("Body of {}", url),
                ScrapeMethod::Cheerio,
                MetricsTimer::start(),
            )
        }
    }

    #[derive(Default)]
    struct FakeGenerator {
        analysis: Option<QueryAnalysis>,
        reject_context: bool,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnswerGenerator for FakeGenerator {
        async fn analyze_intent(&self, _message: &str, _history: &[ChatEntry]) -> Result<QueryAnalysis> {
            self.analysis
                .clone()
                .ok_or_else(|| TributaryError::Upstream("unparseable analysis".into()))
        }

        async fn generate_answer(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.reject_context && prompt.contains("Context:") {
                return Err(TributaryError::Upstream("context too long".into()));
            }
            Ok(format!("answer #{}", self.prompts.lock().unwrap().len()))
        }
    }

    #[derive(Default)]
    struct FakeSearch {
        hits: Vec<SearchHit>,
        queries: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for FakeSearch {
        async fn search(&self, query: &str, max_results: usize) -> Vec<SearchHit> {
            assert_eq!(max_results, SEARCH_RESULT_LIMIT);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            self.hits.clone()
        }
    }

    fn hit(url: &str, authority_score: f64) -> SearchHit {
        SearchHit {
            url: url.to_string(),
            title: String::new(),
            snippet: String::new(),
            domain: String::new(),
            authority_score,
        }
    }

    fn analysis(needs_search: bool, urls: &[&str]) -> QueryAnalysis {
        QueryAnalysis {
            is_casual: false,
            needs_search,
            reasoning: String::new(),
            suggested_approach: String::new(),
            search_query: Some("rust async runtimes".to_string()),
            confidence_score: 0.9,
            extracted_urls: urls.iter().map(|u| u.to_string()).collect(),
            is_follow_up: false,
        }
    }

    fn pipeline(generator: Arc<FakeGenerator>, search: Arc<FakeSearch>) -> (Pipeline, Cache) {
        let cache = Cache::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let scraper: Arc<dyn Scraper> = Arc::new(FakeScraper);
        let gatherer = Arc::new(InformationGatherer::new(
            scraper.clone(),
            cache.clone(),
            3,
            &GathererConfig::default(),
        ));
        let processor = Arc::new(ContentProcessor::new().unwrap());
        let pipeline = Pipeline::new(cache.clone(), scraper, gatherer, processor, generator, search);
        (pipeline, cache)
    }

    #[tokio::test]
    async fn test_degrades_when_intent_analysis_fails() {
        let generator = Arc::new(FakeGenerator::default());
        let search = Arc::new(FakeSearch::default());
        let (pipeline, cache) = pipeline(generator.clone(), search.clone());

        let response = pipeline.respond("hello there", "conv").await.unwrap();

        assert_eq!(response.analysis, QueryAnalysis::degraded());
        assert!(!response.used_context);
        assert!(response.sources.is_empty());
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);

        let history = cache.recent_chat("conv", 5).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_message, "hello there");
        assert_eq!(history[0].ai_response, response.answer);
    }

    #[tokio::test]
    async fn test_extracted_urls_skip_search() {
        let generator = Arc::new(FakeGenerator {
            analysis: Some(analysis(true, &["https://a.example/post", "https://b.example/dead"])),
            ..Default::default()
        });
        let search = Arc::new(FakeSearch::default());
        let (pipeline, _) = pipeline(generator.clone(), search.clone());

        let response = pipeline.respond("summarize this", "conv").await.unwrap();

        assert!(response.used_context);
        assert_eq!(response.sources, vec!["https://a.example/post".to_string()]);
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Source: https://a.example/post"));
        assert!(prompts[0].ends_with("Question: summarize this"));
    }

    #[tokio::test]
    async fn test_search_hits_ranked_by_authority() {
        let generator = Arc::new(FakeGenerator {
            analysis: Some(analysis(true, &[])),
            ..Default::default()
        });
        let search = Arc::new(FakeSearch {
            hits: vec![
                hit("https://low.example", 0.2),
                hit("https://high.example", 0.9),
                hit("https://mid.example", 0.5),
            ],
            ..Default::default()
        });
        let (pipeline, _) = pipeline(generator, search.clone());

        let response = pipeline.respond("what is tokio", "conv").await.unwrap();

        assert_eq!(
            search.queries.lock().unwrap().as_slice(),
            ["rust async runtimes".to_string()]
        );
        assert_eq!(
            response.sources,
            vec![
                "https://high.example".to_string(),
                "https://mid.example".to_string(),
                "https://low.example".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_casual_message_never_searches() {
        let mut casual = analysis(true, &[]);
        casual.is_casual = true;
        let generator = Arc::new(FakeGenerator {
            analysis: Some(casual),
            ..Default::default()
        });
        let search = Arc::new(FakeSearch::default());
        let (pipeline, _) = pipeline(generator, search.clone());

        let response = pipeline.respond("thanks!", "conv").await.unwrap();
        assert!(!response.used_context);
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_answer_without_context() {
        let generator = Arc::new(FakeGenerator {
            analysis: Some(analysis(false, &["https://a.example/post"])),
            reject_context: true,
            ..Default::default()
        });
        let (pipeline, _) = pipeline(generator.clone(), Arc::new(FakeSearch::default()));

        let response = pipeline.respond("summarize this", "conv").await.unwrap();

        assert!(!response.used_context);
        assert!(response.sources.is_empty());
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[1].contains("Context:"));
    }

    #[tokio::test]
    async fn test_history_feeds_prompt_oldest_first() {
        let generator = Arc::new(FakeGenerator::default());
        let (pipeline, _) = pipeline(generator.clone(), Arc::new(FakeSearch::default()));

        pipeline.respond("first", "conv").await.unwrap();
        pipeline.respond("second", "conv").await.unwrap();
        pipeline.respond("third", "conv").await.unwrap();

        let prompts = generator.prompts.lock().unwrap();
        let last = &prompts[2];
        let first_at = last.find("User: first").unwrap();
        let second_at = last.find("User: second").unwrap();
        assert!(first_at < second_at);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (pipeline, cache) = pipeline(
            Arc::new(FakeGenerator::default()),
            Arc::new(FakeSearch::default()),
        );
        let result = pipeline.respond("   ", "conv").await;
        assert!(matches!(result, Err(TributaryError::InvalidInput(_))));
        assert!(cache.recent_chat("conv", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_process_for_context_filters_failures() {
        let (pipeline, _) = pipeline(
            Arc::new(FakeGenerator::default()),
            Arc::new(FakeSearch::default()),
        );
        let ok = pipeline.scrape_one("https://a.example/post").await;
        let dead = pipeline.scrape_one("https://b.example/dead").await;

        let processed = pipeline.process_for_context(&[ok, dead]);
        assert_eq!(
            processed.content,
            "Source: https://a.example/post\nBody of https://a.example/post"
        );
    }
}
