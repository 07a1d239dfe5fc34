//! Configuration system
//!
//! Loads ~/.config/followgraph/config.yaml. Every section has defaults, so an
//! empty file (or no file at all) yields a working configuration:
//! - Upstream API location, session cookie and request timeout
//! - Rate limiting and retry bounds
//! - Page size, batch size and pacing for acquisition
//! - Response cache location and TTL
//! - Graph size scaling and link direction

mod followgraph_config;
pub mod validation;

pub use followgraph_config::{
    config_dir, default_cache_path, ApiConfig, CacheSettings, FetchSettings, FollowGraphConfig,
    RateLimitSettings, RetrySettings,
};
pub use validation::{validate_config, validate_config_result, ValidationError};
