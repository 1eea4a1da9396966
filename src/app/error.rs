use thiserror::Error;

use crate::domain::ScrapeMethod;

#[derive(Error, Debug)]
pub enum TributaryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL")]
    InvalidUrl(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The renderer pool could not hand out a session.
    #[error("{context} ({method}) could not acquire a renderer: {reason}")]
    Acquisition {
        context: &'static str,
        method: ScrapeMethod,
        reason: String,
    },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("{0}")]
    Other(String),
}

impl TributaryError {
    pub(crate) fn pool_launch(reason: impl Into<String>) -> Self {
        Self::Acquisition {
            context: "browser-pool",
            method: ScrapeMethod::Puppeteer,
            reason: reason.into(),
        }
    }

    /// Whether an outer retry loop should back off and try again.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Http(e) => e.status().is_some_and(|s| s.as_u16() == 429),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TributaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_message_is_stable() {
        let err = TributaryError::InvalidUrl("ftp://nope".into());
        assert_eq!(err.to_string(), "Invalid URL");
    }

    #[test]
    fn test_pool_launch_carries_context() {
        let err = TributaryError::pool_launch("chrome not found");
        match &err {
            TributaryError::Acquisition {
                context, method, ..
            } => {
                assert_eq!(*context, "browser-pool");
                assert_eq!(*method, ScrapeMethod::Puppeteer);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("chrome not found"));
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(TributaryError::RateLimited("slow down".into()).is_rate_limited());
        assert!(!TributaryError::Upstream("bad json".into()).is_rate_limited());
    }
}
