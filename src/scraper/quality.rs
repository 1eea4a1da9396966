//! Heuristic gate separating usable article text from boilerplate and error pages.

const MIN_WORDS: usize = 100;
const MIN_SENTENCES: usize = 3;
const MIN_AVG_WORD_LENGTH: f64 = 3.0;

/// Phrases that mark error, challenge, or interstitial pages (matched case-insensitively).
const BLOCKLIST: &[&str] = &[
    "404",
    "access denied",
    "please enable javascript",
    "robot check",
    "captcha",
    "page not found",
    "are you a robot",
];

#[derive(Debug, Clone, PartialEq)]
pub enum QualityVerdict {
    Pass,
    Empty,
    TooFewWords(usize),
    TooFewSentences(usize),
    ShortWords(f64),
    Blocklisted(&'static str),
}

impl QualityVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

pub fn assess(text: &str) -> QualityVerdict {
    if text.trim().is_empty() {
        return QualityVerdict::Empty;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < MIN_WORDS {
        return QualityVerdict::TooFewWords(words.len());
    }

    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    if sentences < MIN_SENTENCES {
        return QualityVerdict::TooFewSentences(sentences);
    }

    let letters: usize = words.iter().map(|w| w.chars().count()).sum();
    let avg = letters as f64 / words.len() as f64;
    if avg < MIN_AVG_WORD_LENGTH {
        return QualityVerdict::ShortWords(avg);
    }

    let lowered = text.to_lowercase();
    if let Some(phrase) = BLOCKLIST.iter().copied().find(|p| lowered.contains(p)) {
        return QualityVerdict::Blocklisted(phrase);
    }

    QualityVerdict::Pass
}

pub fn is_meaningful(text: &str) -> bool {
    assess(text).is_pass()
}
