use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::{Result, TributaryError};

/// Intent classification produced by the answer generator.
///
/// The generator speaks camelCase JSON; [`QueryAnalysis::from_json`] is the
/// only way loose upstream output becomes one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysis {
    pub is_casual: bool,
    pub needs_search: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub suggested_approach: String,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default)]
    pub extracted_urls: Vec<String>,
    #[serde(default)]
    pub is_follow_up: bool,
}

impl QueryAnalysis {
    /// Fallback used when intent analysis fails: answer directly, no search.
    pub fn degraded() -> Self {
        Self {
            is_casual: true,
            needs_search: false,
            reasoning: "Intent analysis unavailable".to_string(),
            suggested_approach: "Respond without external context".to_string(),
            search_query: None,
            confidence_score: 0.1,
            extracted_urls: Vec::new(),
            is_follow_up: false,
        }
    }

    /// Parse and normalize raw generator output.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut analysis: Self = serde_json::from_str(raw.trim())
            .map_err(|e| TributaryError::Upstream(format!("Malformed query analysis: {}", e)))?;
        analysis.normalize();
        Ok(analysis)
    }

    fn normalize(&mut self) {
        if !self.confidence_score.is_finite() {
            self.confidence_score = 0.0;
        }
        self.confidence_score = self.confidence_score.clamp(0.0, 1.0);

        self.extracted_urls.retain(|u| {
            Url::parse(u)
                .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
                .unwrap_or(false)
        });

        if self
            .search_query
            .as_ref()
            .is_some_and(|q| q.trim().is_empty())
        {
            self.search_query = None;
        }
    }
}

/// One candidate page returned by the search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub authority_score: f64,
}
