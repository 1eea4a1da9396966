//! Configuration management.
//!
//! Configuration is read from `~/.config/tributary/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use crate::gatherer::GathererConfig;
use crate::scraper::{PoolConfig, ScraperConfig};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub pool: PoolConfig,
    pub cache: CacheConfig,
    pub gatherer: GathererConfig,
}

/// Persistent cache location
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite file; defaults to `<data_dir>/tributary/cache.db`
    pub db_path: Option<PathBuf>,
}

impl CacheConfig {
    pub fn resolve_db_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => {
                let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
                Ok(data_dir.join("tributary").join("cache.db"))
            }
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing file is created with commented defaults. Missing fields fall
    /// back to defaults; an unparseable file is an error.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/tributary/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("tributary").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn default_config_content() -> &'static str {
        r##"# Tributary Configuration

[scraper]
# Run browser in headless mode (no visible window)
headless = true

# Plain HTTP fetch timeout in seconds
fetch_timeout_secs = 10

# Rendered page navigation timeout in seconds
navigation_timeout_secs = 15

# Wait time after page load for dynamic content (milliseconds)
wait_after_load_ms = 500

# Block images and media in rendered pages
block_images = true

# Block stylesheets and fonts in rendered pages
block_stylesheets = true

accept_language = "en-US,en;q=0.9"

# CSS selectors to try for content extraction (in priority order)
content_selectors = [
    "article",
    "[role=\"main\"]",
    "main",
    ".post-content",
    ".article-content",
    ".entry-content",
    ".content",
    "#content",
    "p",
]

[pool]
# Maximum concurrent browser sessions
max_sessions = 3

# Seconds between background health checks
health_check_interval_secs = 60

[cache]
# SQLite cache location (default: <data dir>/tributary/cache.db)
# db_path = "/var/lib/tributary/cache.db"

[gatherer]
# Seconds allowed for one batch of concurrent scrapes
batch_timeout_secs = 60
"##
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl From<ConfigError> for crate::app::TributaryError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
