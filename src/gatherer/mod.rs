//! Bounded fan-out of the scrape orchestrator over a list of URLs.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::{keys, Cache};
use crate::domain::{ScrapeResult, SourceDocument};
use crate::scraper::Scraper;

/// Gatherer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GathererConfig {
    /// Seconds allowed for one batch of concurrent scrapes (default: 60)
    pub batch_timeout_secs: u64,
}

impl Default for GathererConfig {
    fn default() -> Self {
        Self {
            batch_timeout_secs: 60,
        }
    }
}

impl GathererConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

/// A URL that produced no result at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedUrl {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GatherReport {
    /// One result per surviving URL, in input order
    pub results: Vec<ScrapeResult>,
    pub skipped: Vec<SkippedUrl>,
}

impl GatherReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Results that pass the shape check, as processor input.
    pub fn documents(&self) -> Vec<SourceDocument> {
        validate_results(&self.results)
    }
}

/// Run typed results through the same shape check as loose JSON.
pub fn validate_results(results: &[ScrapeResult]) -> Vec<SourceDocument> {
    match serde_json::to_value(results) {
        Ok(value) => validate_scraping_results(&value),
        Err(e) => {
            warn!("Failed to serialize scrape results: {}", e);
            Vec::new()
        }
    }
}

pub struct InformationGatherer {
    scraper: Arc<dyn Scraper>,
    cache: Cache,
    batch_size: usize,
    batch_timeout: Duration,
}

impl InformationGatherer {
    /// `batch_size` should not exceed the renderer pool's session cap.
    pub fn new(
        scraper: Arc<dyn Scraper>,
        cache: Cache,
        batch_size: usize,
        config: &GathererConfig,
    ) -> Self {
        Self {
            scraper,
            cache,
            batch_size: batch_size.max(1),
            batch_timeout: config.batch_timeout(),
        }
    }

    pub async fn gather(&self, conversation_id: &str, urls: &[String]) -> GatherReport {
        let mut report = GatherReport::default();

        if urls.is_empty() {
            info!("No URLs to gather for conversation {}", conversation_id);
            return report;
        }

        info!(
            "Gathering {} URL(s) for conversation {} in batches of {}",
            urls.len(),
            conversation_id,
            self.batch_size
        );

        for batch in urls.chunks(self.batch_size) {
            let handles: Vec<_> = batch
                .iter()
                .map(|url| {
                    let scraper = self.scraper.clone();
                    let cache = self.cache.clone();
                    let key = keys::conversation_scrape_key(conversation_id, url);
                    let url = url.clone();
                    tokio::spawn(async move { gather_one(scraper, cache, key, url).await })
                })
                .collect();
            let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

            match tokio::time::timeout(self.batch_timeout, futures::future::join_all(handles)).await
            {
                Ok(joined) => {
                    for (url, outcome) in batch.iter().zip(joined) {
                        match outcome {
                            Ok(result) => report.results.push(result),
                            Err(e) => {
                                warn!("Skipping {}: scrape task failed: {}", url, e);
                                report.skipped.push(SkippedUrl {
                                    url: url.clone(),
                                    reason: format!("scrape task failed: {}", e),
                                });
                            }
                        }
                    }
                }
                Err(_) => {
                    warn!(
                        "Batch of {} URL(s) exceeded {:?}; skipping it",
                        batch.len(),
                        self.batch_timeout
                    );
                    for handle in abort_handles {
                        handle.abort();
                    }
                    report.skipped.extend(batch.iter().map(|url| SkippedUrl {
                        url: url.clone(),
                        reason: "batch timed out".to_string(),
                    }));
                }
            }
        }

        info!(
            "Gathered {} result(s), {} successful, {} skipped",
            report.results.len(),
            report.succeeded(),
            report.skipped.len()
        );

        report
    }
}

async fn gather_one(
    scraper: Arc<dyn Scraper>,
    cache: Cache,
    key: String,
    url: String,
) -> ScrapeResult {
    if let Some(cached) = cache.get::<ScrapeResult>(&key).await {
        return cached.served_from_cache();
    }

    let result = scraper.scrape(&url).await;
    if result.success {
        if let Err(e) = cache.set(&key, &result).await {
            warn!("Failed to cache gathered result for {}: {}", url, e);
        }
    }

    result
}

/// Keep only elements shaped like a scrape result with non-empty `content`.
pub fn validate_scraping_results(value: &Value) -> Vec<SourceDocument> {
    let Some(items) = value.as_array() else {
        warn!("Expected an array of scraping results, got {}", kind(value));
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let Some(fields) = item.as_object() else {
                warn!("Dropping scraping result {}: not an object ({})", index, kind(item));
                return None;
            };

            match fields.get("content").and_then(Value::as_str) {
                Some(content) if !content.is_empty() => Some(SourceDocument {
                    url: fields
                        .get("url")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                    title: fields.get("title").and_then(Value::as_str).map(String::from),
                    content: content.to_string(),
                }),
                _ => {
                    warn!("Dropping scraping result {}: missing or empty content", index);
                    None
                }
            }
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
