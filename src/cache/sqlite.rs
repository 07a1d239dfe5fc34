//! SQLite cache implementation

use super::clock::{Clock, SystemClock};
use crate::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Prefix applied to every key this store writes
pub const KEY_PREFIX: &str = "followgraph_";

/// Bumped whenever the shape of cached payloads changes
pub const CACHE_RECORD_VERSION: u32 = 1;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Path to SQLite database file
    pub path: PathBuf,

    /// Default entry lifetime
    pub ttl: Duration,

    /// Enable WAL mode for better concurrency
    pub wal_mode: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: crate::config::default_cache_path(),
            ttl: Duration::from_secs(24 * 60 * 60),
            wal_mode: true,
        }
    }
}

/// Stored form of a cached value
#[derive(Serialize)]
struct CacheRecordRef<'a, T> {
    version: u32,
    data: &'a T,
    expiry: i64,
}

#[derive(Deserialize)]
struct CacheRecord<T> {
    version: u32,
    data: T,
    #[allow(dead_code)]
    expiry: i64,
}

/// SQLite-backed expiring key/value store
///
/// Reads never fail from the caller's point of view: a missing, expired,
/// unreadable or wrongly shaped entry is simply absent. Writes are best effort.
#[derive(Debug)]
pub struct Cache {
    conn: Mutex<Connection>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl Cache {
    /// Open or create a cache database
    pub fn new(config: CacheConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %config.path.display(), "Opening cache database");

        let conn = Connection::open(&config.path)?;

        if config.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        Self::from_connection(conn, config)
    }

    /// Create a cache that lives only as long as this value
    pub fn in_memory(ttl: Duration) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let config = CacheConfig {
            path: PathBuf::from(":memory:"),
            ttl,
            wal_mode: false,
        };
        Self::from_connection(conn, config)
    }

    fn from_connection(conn: Connection, config: CacheConfig) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cache_entries_expires ON cache_entries(expires_at);
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source used for expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Default entry lifetime
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn namespaced(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }

    /// Read a value, evicting it if it has expired or no longer decodes as `T`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = Self::namespaced(key);
        let conn = self.lock();

        let row: Option<(String, i64)> = match conn
            .query_row(
                "SELECT value, expires_at FROM cache_entries WHERE key = ?1",
                params![full_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Cache read failed");
                return None;
            }
        };

        let (value, expires_at) = row?;

        if self.clock.now_millis() > expires_at {
            tracing::debug!(key = %full_key, "Cache entry expired");
            Self::evict(&conn, &full_key);
            return None;
        }

        match serde_json::from_str::<CacheRecord<T>>(&value) {
            Ok(record) if record.version == CACHE_RECORD_VERSION => Some(record.data),
            Ok(record) => {
                tracing::debug!(
                    key = %full_key,
                    version = record.version,
                    "Cache entry has stale version"
                );
                Self::evict(&conn, &full_key);
                None
            }
            Err(e) => {
                tracing::debug!(key = %full_key, error = %e, "Cache entry failed validation");
                Self::evict(&conn, &full_key);
                None
            }
        }
    }

    /// Whether a live, readable entry exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.get::<serde_json::Value>(key).is_some()
    }

    /// Store a value with an explicit lifetime
    ///
    /// Failures (full disk, locked database, unserializable value) are not
    /// reported; the cache then behaves as if the write never happened.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let full_key = Self::namespaced(key);
        let now = self.clock.now_millis();
        let ttl_ms = ttl.as_millis().min(i64::MAX as u128) as i64;
        let record = CacheRecordRef {
            version: CACHE_RECORD_VERSION,
            data: value,
            expiry: now.saturating_add(ttl_ms),
        };

        let json = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => {
                tracing::debug!(key = %full_key, error = %e, "Skipping cache write");
                return;
            }
        };

        let result = self.lock().execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, expires_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![full_key, json, record.expiry, now],
        );

        if let Err(e) = result {
            tracing::debug!(key = %full_key, error = %e, "Skipping cache write");
        }
    }

    /// Store a value with the configured default lifetime
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        self.set(key, value, self.config.ttl);
    }

    /// Remove an entry, returning whether one existed
    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed = self.lock().execute(
            "DELETE FROM cache_entries WHERE key = ?1",
            params![Self::namespaced(key)],
        )?;
        Ok(removed > 0)
    }

    /// Clear every entry under this store's namespace
    pub fn clear(&self) -> Result<()> {
        tracing::info!("Clearing cache");

        self.lock().execute(
            "DELETE FROM cache_entries WHERE substr(key, 1, ?1) = ?2",
            params![KEY_PREFIX.len() as i64, KEY_PREFIX],
        )?;

        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats> {
        let now = self.clock.now_millis();
        let conn = self.lock();

        let (entries, expired): (i64, i64) = conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(CASE WHEN expires_at < ?3 THEN 1 ELSE 0 END), 0)
            FROM cache_entries
            WHERE substr(key, 1, ?1) = ?2
            "#,
            params![KEY_PREFIX.len() as i64, KEY_PREFIX, now],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(CacheStats {
            entries: entries as usize,
            expired: expired as usize,
        })
    }

    fn evict(conn: &Connection, full_key: &str) {
        if let Err(e) = conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![full_key]) {
            tracing::debug!(key = %full_key, error = %e, "Cache eviction failed");
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    /// Entries past their expiry that have not been read since
    pub expired: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use tempfile::NamedTempFile;

    fn manual_cache(ttl: Duration) -> (Cache, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let cache = Cache::in_memory(ttl)
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (cache, clock)
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        list: Vec<u64>,
        total: u64,
    }

    #[test]
    fn test_cache_creation() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = CacheConfig {
            path: temp_file.path().to_path_buf(),
            ..Default::default()
        };

        let cache = Cache::new(config).unwrap();
        assert!(cache.path().exists());
    }

    #[test]
    fn test_round_trip() {
        let (cache, _clock) = manual_cache(Duration::from_secs(60));
        let payload = Payload {
            list: vec![1, 2, 3],
            total: 3,
        };

        cache.set("common_followings_42", &payload, Duration::from_secs(60));
        assert_eq!(cache.get::<Payload>("common_followings_42"), Some(payload));
        assert_eq!(cache.get::<Payload>("common_followings_43"), None);
    }

    #[test]
    fn test_expiry_evicts_and_does_not_resurrect() {
        let (cache, clock) = manual_cache(Duration::from_secs(60));
        let start = clock.now_millis();

        cache.put("k", &"value".to_string());
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get::<String>("k"), Some("value".to_string()));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get::<String>("k"), None);

        // The entry is gone, not merely hidden
        clock.set(start);
        assert_eq!(cache.get::<String>("k"), None);
        assert_eq!(cache.stats().unwrap().entries, 0);
    }

    #[test]
    fn test_keys_are_namespaced() {
        let (cache, _clock) = manual_cache(Duration::from_secs(60));
        cache.put("abc", &1u32);

        let stored: String = cache
            .lock()
            .query_row("SELECT key FROM cache_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, "followgraph_abc");
    }

    #[test]
    fn test_shape_mismatch_is_a_miss() {
        let (cache, _clock) = manual_cache(Duration::from_secs(60));
        cache.put("k", &"not a payload");

        assert_eq!(cache.get::<Payload>("k"), None);
        assert!(!cache.contains("k"));
    }

    #[test]
    fn test_stale_version_is_a_miss() {
        let (cache, clock) = manual_cache(Duration::from_secs(60));
        let expiry = clock.now_millis() + 60_000;
        cache
            .lock()
            .execute(
                "INSERT INTO cache_entries (key, value, expires_at, updated_at) VALUES (?1, ?2, ?3, 0)",
                params![
                    "followgraph_old",
                    format!(r#"{{"version":0,"data":5,"expiry":{}}}"#, expiry),
                    expiry
                ],
            )
            .unwrap();

        assert_eq!(cache.get::<u32>("old"), None);
        assert_eq!(cache.stats().unwrap().entries, 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let (cache, _clock) = manual_cache(Duration::from_secs(60));
        cache.put("a", &1u32);
        cache.put("b", &2u32);

        assert!(cache.remove("a").unwrap());
        assert!(!cache.remove("a").unwrap());
        assert!(cache.contains("b"));

        // Rows outside the namespace survive a clear
        cache
            .lock()
            .execute(
                "INSERT INTO cache_entries (key, value, expires_at, updated_at) VALUES ('other_app', '{}', 0, 0)",
                [],
            )
            .unwrap();

        cache.clear().unwrap();
        assert!(!cache.contains("b"));

        let remaining: i64 = cache
            .lock()
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[test]
    fn test_write_failure_is_silent() {
        let (cache, _clock) = manual_cache(Duration::from_secs(60));
        cache.lock().execute("DROP TABLE cache_entries", []).unwrap();

        cache.put("k", &1u32);
        assert_eq!(cache.get::<u32>("k"), None);
    }

    #[test]
    fn test_stats_counts_expired() {
        let (cache, clock) = manual_cache(Duration::from_secs(10));
        cache.put("short", &1u32);
        cache.set("long", &2u32, Duration::from_secs(100));

        clock.advance(Duration::from_secs(20));
        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.expired, 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = CacheConfig {
            path: temp_file.path().to_path_buf(),
            ttl: Duration::from_secs(3600),
            ..Default::default()
        };

        {
            let cache = Cache::new(config.clone()).unwrap();
            cache.put("persisted", &vec![7u64, 8]);
        }

        let cache = Cache::new(config).unwrap();
        assert_eq!(cache.get::<Vec<u64>>("persisted"), Some(vec![7, 8]));
    }
}
