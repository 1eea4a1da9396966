use serde::{Deserialize, Serialize};

/// Validated scraped text, ready to become answer context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
}
