use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the two extraction strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Timeout for the static strategy's HTTP fetch in seconds (default: 10)
    pub fetch_timeout_secs: u64,

    /// Navigation timeout for the rendered strategy in seconds (default: 15)
    pub navigation_timeout_secs: u64,

    /// Settle time after navigation for late network activity in milliseconds (default: 500)
    pub wait_after_load_ms: u64,

    /// CSS selectors to try for content extraction, in priority order
    pub content_selectors: Vec<String>,

    /// CSS selectors for boilerplate removed before extraction
    pub remove_selectors: Vec<String>,

    /// Whether to block images and media for faster loading (default: true)
    pub block_images: bool,

    /// Whether to block stylesheets and fonts for faster loading (default: true)
    pub block_stylesheets: bool,

    /// User agent string presented by both strategies
    pub user_agent: String,

    /// Accept-Language preference presented by the rendered strategy
    pub accept_language: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            fetch_timeout_secs: 10,
            navigation_timeout_secs: 15,
            wait_after_load_ms: 500,
            content_selectors: vec![
                "article".to_string(),
                "[role=\"main\"]".to_string(),
                "main".to_string(),
                ".post-content".to_string(),
                ".article-content".to_string(),
                ".entry-content".to_string(),
                ".content".to_string(),
                "#content".to_string(),
                "p".to_string(),
            ],
            remove_selectors: vec![
                "script".to_string(),
                "style".to_string(),
                "noscript".to_string(),
                "iframe".to_string(),
                "nav".to_string(),
                "header".to_string(),
                "footer".to_string(),
                "aside".to_string(),
                ".sidebar".to_string(),
                ".advertisement".to_string(),
                ".ad".to_string(),
                ".ads".to_string(),
                "[class*=\"cookie\"]".to_string(),
                "[id*=\"cookie\"]".to_string(),
                ".social-share".to_string(),
                ".share".to_string(),
                ".comments".to_string(),
                "#comments".to_string(),
                "[hidden]".to_string(),
                "[aria-hidden=\"true\"]".to_string(),
                "[style*=\"display:none\"]".to_string(),
                "[style*=\"display: none\"]".to_string(),
            ],
            block_images: true,
            block_stylesheets: true,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn wait_after_load(&self) -> Duration {
        Duration::from_millis(self.wait_after_load_ms)
    }
}

/// Renderer pool sizing and health checking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum live browser sessions (default: 3)
    pub max_sessions: usize,

    /// Seconds between background health sweeps (default: 60)
    pub health_check_interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: 3,
            health_check_interval_secs: 60,
        }
    }
}

impl PoolConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ScraperConfig::default();
        assert!(config.headless);
        assert_eq!(config.navigation_timeout(), Duration::from_secs(15));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.wait_after_load(), Duration::from_millis(500));
        assert_eq!(config.content_selectors.first().map(String::as_str), Some("article"));
        assert_eq!(config.content_selectors.last().map(String::as_str), Some("p"));
        assert!(config.remove_selectors.iter().any(|s| s == "iframe"));
    }

    #[test]
    fn test_default_pool_values() {
        let pool = PoolConfig::default();
        assert_eq!(pool.max_sessions, 3);
        assert_eq!(pool.health_check_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ScraperConfig = toml::from_str("navigation_timeout_secs = 30").unwrap();
        assert_eq!(config.navigation_timeout_secs, 30);
        assert!(config.block_images);
        assert_eq!(config.accept_language, "en-US,en;q=0.9");
    }
}
