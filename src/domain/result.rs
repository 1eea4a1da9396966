use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder title for pages that expose neither `<title>` nor `<h1>`.
pub const UNTITLED: &str = "(Untitled)";

/// Which stage produced a [`ScrapeResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScrapeMethod {
    /// Static HTML parse of the fetched body
    #[serde(rename = "cheerio")]
    Cheerio,
    /// Headless-browser render
    #[serde(rename = "puppeteer")]
    Puppeteer,
    /// Served from the cache layer
    #[serde(rename = "cache")]
    Cache,
}

impl ScrapeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cheerio => "cheerio",
            Self::Puppeteer => "puppeteer",
            Self::Cache => "cache",
        }
    }
}

impl fmt::Display for ScrapeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing breakdown for one scrape attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeMetrics {
    pub start_time: DateTime<Utc>,
    /// Milliseconds from start until the static attempt began
    pub static_attempt_ms: Option<u64>,
    /// Milliseconds from start until the rendered attempt began
    pub rendered_attempt_ms: Option<u64>,
    pub total_ms: u64,
    pub method: Option<ScrapeMethod>,
    pub success: bool,
}

/// Running clock behind [`ScrapeMetrics`]; not serialized.
#[derive(Debug)]
pub struct MetricsTimer {
    started: Instant,
    metrics: ScrapeMetrics,
}

impl MetricsTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            metrics: ScrapeMetrics {
                start_time: Utc::now(),
                static_attempt_ms: None,
                rendered_attempt_ms: None,
                total_ms: 0,
                method: None,
                success: false,
            },
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn mark_static_attempt(&mut self) {
        self.metrics.static_attempt_ms = Some(self.elapsed_ms());
    }

    pub fn mark_rendered_attempt(&mut self) {
        self.metrics.rendered_attempt_ms = Some(self.elapsed_ms());
    }

    /// Whether the run got as far as the rendered strategy.
    pub fn reached_rendered(&self) -> bool {
        self.metrics.rendered_attempt_ms.is_some()
    }

    pub fn finish(mut self, method: Option<ScrapeMethod>, success: bool) -> ScrapeMetrics {
        self.metrics.total_ms = self.elapsed_ms();
        self.metrics.method = method;
        self.metrics.success = success;
        self.metrics
    }
}

/// Shape statistics of successfully extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentStats {
    pub word_count: usize,
    pub char_count: usize,
    pub paragraph_count: usize,
    pub avg_word_length: f64,
}

impl ContentStats {
    pub fn compute(text: &str) -> Self {
        let words: Vec<&str> = text.split_whitespace().collect();
        let letters: usize = words.iter().map(|w| w.chars().count()).sum();
        let avg_word_length = if words.is_empty() {
            0.0
        } else {
            letters as f64 / words.len() as f64
        };

        Self {
            word_count: words.len(),
            char_count: text.chars().count(),
            paragraph_count: text.split("\n\n").filter(|p| !p.trim().is_empty()).count(),
            avg_word_length,
        }
    }
}

/// Outcome of scraping one URL. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub content: String,
    pub title: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub scrape_method: ScrapeMethod,
    pub metrics: ScrapeMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_stats: Option<ContentStats>,
}

impl ScrapeResult {
    pub fn success(
        url: &str,
        title: Option<String>,
        content: String,
        method: ScrapeMethod,
        timer: MetricsTimer,
    ) -> Self {
        let content_stats = Some(ContentStats::compute(&content));
        Self {
            url: url.to_string(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            content,
            success: true,
            error: None,
            timestamp: Utc::now(),
            scrape_method: method,
            metrics: timer.finish(Some(method), true),
            content_stats,
        }
    }

    /// `method` names the last strategy attempted.
    pub fn failure(
        url: &str,
        error: impl Into<String>,
        method: ScrapeMethod,
        timer: MetricsTimer,
    ) -> Self {
        Self {
            url: url.to_string(),
            content: String::new(),
            title: UNTITLED.to_string(),
            success: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
            scrape_method: method,
            metrics: timer.finish(None, false),
            content_stats: None,
        }
    }

    /// Re-label a memoized result as cache-served.
    pub fn served_from_cache(mut self) -> Self {
        self.scrape_method = ScrapeMethod::Cache;
        self.metrics.method = Some(ScrapeMethod::Cache);
        self
    }
}
