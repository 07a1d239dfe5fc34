//! Cache layer for upstream responses
//!
//! Provides a namespaced, SQLite-backed key/value store with per-entry
//! expiration. Expired entries are evicted lazily when read.

mod clock;
mod sqlite;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sqlite::{Cache, CacheConfig, CacheStats, CACHE_RECORD_VERSION, KEY_PREFIX};
