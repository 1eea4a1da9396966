//! Merges validated documents into one bounded, sanitized context blob.

use regex::{Captures, Regex};
use serde::Serialize;
use tracing::{debug, info};

use crate::app::{Result, TributaryError};
use crate::domain::SourceDocument;

/// Hard cap on the merged context, in characters
pub const MAX_CONTEXT_CHARS: usize = 30_000;
pub const TRUNCATION_MARKER: &str = "... [Content truncated]";
const SOURCE_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedContent {
    pub content: String,
    /// Reserved for content-policy filtering; never set today.
    pub was_filtered: bool,
    pub filter_reason: Option<String>,
}

pub struct ContentProcessor {
    code_fence: Regex,
    tag: Regex,
    whitespace: Regex,
    repeated_punctuation: Regex,
}

impl ContentProcessor {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| TributaryError::Other(format!("Invalid sanitizer pattern: {}", e)))
        };

        Ok(Self {
            code_fence: compile(r"```[A-Za-z0-9_+\-]*")?,
            tag: compile(r"<[^>]*>")?,
            whitespace: compile(r"\s+")?,
            repeated_punctuation: compile(r"!{2,}|\?{2,}|\.{2,}|,{2,}|;{2,}|:{2,}")?,
        })
    }

    pub fn process(&self, documents: &[SourceDocument]) -> ProcessedContent {
        let merged = documents
            .iter()
            .map(|doc| format!("Source: {}\n{}", doc.url, self.sanitize(&doc.content)))
            .collect::<Vec<_>>()
            .join(SOURCE_SEPARATOR);

        let content = truncate(merged);
        info!(
            "Processed {} document(s) into {} chars of context",
            documents.len(),
            content.chars().count()
        );

        ProcessedContent {
            content,
            was_filtered: false,
            filter_reason: None,
        }
    }

    /// Normalize scraped text into a single plain line.
    pub fn sanitize(&self, text: &str) -> String {
        let decoded = html_escape::decode_html_entities(text);
        let unfenced = self.code_fence.replace_all(&decoded, "");
        let untagged = self.tag.replace_all(&unfenced, " ");
        let collapsed = self.whitespace.replace_all(&untagged, " ");
        let punctuated = self
            .repeated_punctuation
            .replace_all(&collapsed, |caps: &Captures| caps[0][..1].to_string());

        punctuated
            .chars()
            .map(straighten_quote)
            .filter(|c| !c.is_control())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

fn straighten_quote(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
        other => other,
    }
}

fn truncate(content: String) -> String {
    match content.char_indices().nth(MAX_CONTEXT_CHARS) {
        Some((cut, _)) => {
            debug!("Context exceeds {} chars, truncating", MAX_CONTEXT_CHARS);
            let mut truncated = content[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str, content: &str) -> SourceDocument {
        SourceDocument {
            url: url.to_string(),
            title: None,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_sanitize_pipeline() {
        let processor = ContentProcessor::new().unwrap();
        let raw = "Wow!!! Really??? <b>bold</b> &amp; \u{201C}quoted\u{201D} it\u{2019}s\n```rust\nfn x() {}\n```";
        assert_eq!(
            processor.sanitize(raw),
            "Wow! Really? bold & \"quoted\" it's fn x() {}"
        );
    }

    #[test]
    fn test_sanitize_strips_encoded_markup_and_controls() {
        let processor = ContentProcessor::new().unwrap();
        let raw = "&lt;script&gt;alert(1)&lt;/script&gt; text\u{0007} here\t\t";
        assert_eq!(processor.sanitize(raw), "alert(1) text here");
    }

    #[test]
    fn test_process_formats_sources() {
        let processor = ContentProcessor::new().unwrap();
        let processed = processor.process(&[
            doc("https://a.example", "First   body"),
            doc("https://b.example", "Second body"),
        ]);

        assert_eq!(
            processed.content,
            "Source: https://a.example\nFirst body\n\n---\n\nSource: https://b.example\nSecond body"
        );
        assert!(!processed.was_filtered);
        assert!(processed.filter_reason.is_none());
    }

    #[test]
    fn test_process_empty() {
        let processor = ContentProcessor::new().unwrap();
        assert_eq!(processor.process(&[]).content, "");
    }

    #[test]
    fn test_output_is_capped() {
        let processor = ContentProcessor::new().unwrap();
        let huge = "word ".repeat(20_000);
        let processed = processor.process(&[doc("https://a.example", &huge), doc("https://b.example", &huge)]);

        assert!(processed.content.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            processed.content.chars().count(),
            MAX_CONTEXT_CHARS + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn test_cap_counts_chars_not_bytes() {
        let processor = ContentProcessor::new().unwrap();
        let processed = processor.process(&[doc("https://a.example", &"é".repeat(MAX_CONTEXT_CHARS))]);
        let body = processed.content.trim_end_matches(TRUNCATION_MARKER);
        assert_eq!(body.chars().count(), MAX_CONTEXT_CHARS);
    }

    #[test]
    fn test_short_content_untouched() {
        let processor = ContentProcessor::new().unwrap();
        let processed = processor.process(&[doc("https://a.example", "short")]);
        assert!(!processed.content.contains(TRUNCATION_MARKER));
    }
}
