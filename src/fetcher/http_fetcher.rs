use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use crate::app::Result;
use crate::fetcher::Fetcher;
use crate::scraper::ScraperConfig;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        if let Ok(value) = HeaderValue::from_str(&config.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }

        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_default_config() {
        assert!(HttpFetcher::new(&ScraperConfig::default()).is_ok());
    }

    #[test]
    fn test_tolerates_unusable_language_header() {
        let config = ScraperConfig {
            accept_language: "bad\nvalue".to_string(),
            ..Default::default()
        };
        assert!(HttpFetcher::new(&config).is_ok());
    }
}
