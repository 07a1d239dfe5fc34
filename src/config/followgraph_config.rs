//! FollowGraph configuration file handling
//!
//! Loads and manages the ~/.config/followgraph/config.yaml file.

use crate::api::retry::{RetryConfig, DEFAULT_MAX_JITTER};
use crate::cache::CacheConfig;
use crate::Result;
use follow_graph::BuildParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upstream API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL the endpoint paths are appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Session cookie sent with every request
    #[serde(default)]
    pub cookie: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://api.bilibili.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("followgraph/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cookie: None,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Minimum spacing between any two upstream requests
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

fn default_min_interval_ms() -> u64 {
    200
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl RateLimitSettings {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

/// Acquisition pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Items requested per list page
    pub page_size: u32,
    /// Common-followings lookups issued concurrently
    pub batch_size: usize,
    /// Pause between batches that hit the network
    pub batch_delay_ms: u64,
    /// Report list progress every N pages
    pub page_progress_every: u32,
    /// Report aggregation progress every N identifiers
    pub progress_milestone: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            batch_size: 10,
            batch_delay_ms: 300,
            page_progress_every: 5,
            progress_milestone: 50,
        }
    }
}

impl FetchSettings {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// SQLite database file
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Lifetime of cached responses in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

/// Directory holding the config file and the cache database
pub fn config_dir() -> PathBuf {
    // Always use ~/.config for consistency across platforms (macOS, Linux)
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("followgraph");
    path
}

/// Default cache database (~/.config/followgraph/cache.db)
pub fn default_cache_path() -> PathBuf {
    config_dir().join("cache.db")
}

fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            path: self.path.clone(),
            ttl: Duration::from_secs(self.ttl_secs),
            ..Default::default()
        }
    }
}

/// FollowGraph configuration
///
/// Represents the complete ~/.config/followgraph/config.yaml file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowGraphConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub fetch: FetchSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    /// Size scaling and link direction for the built graph
    #[serde(default)]
    pub graph: BuildParams,
}

impl FollowGraphConfig {
    /// Load configuration from the default path (~/.config/followgraph/config.yaml)
    ///
    /// A missing default file is not an error; defaults are used instead.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::FollowGraphError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading FollowGraph configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content)?
        };

        tracing::debug!(
            base_url = %config.api.base_url,
            page_size = config.fetch.page_size,
            batch_size = config.fetch.batch_size,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving FollowGraph configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/followgraph/config.yaml)
    pub fn default_path() -> PathBuf {
        config_dir().join("config.yaml")
    }

    /// Check the configuration, collecting every problem into one error
    pub fn validate(&self) -> Result<()> {
        super::validate_config_result(self)
    }
}
