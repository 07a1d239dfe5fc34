//! Common-followings aggregation
//!
//! Looks up, for each user in a follow list, which users they follow in
//! common with the session user. Lookups run in concurrent batches, go
//! through the response cache and are deduplicated while in flight.

use super::pause::PauseSignal;
use super::progress::{ProgressEvent, ProgressSink, TracingProgress};
use crate::api::{ApiClient, CommonFollowingsData};
use crate::cache::Cache;
use crate::config::FetchSettings;
use crate::dedup::RequestDeduplicator;
use crate::Result;
use follow_graph::Mid;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache and dedup key for one user's common followings
pub fn cache_key(mid: Mid) -> String {
    format!("common_followings_{}", mid)
}

/// Where a lookup's answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Cache,
    Network,
}

/// Batched, cached, deduplicated common-followings lookups
pub struct CommonFollowingsAggregator {
    client: Arc<ApiClient>,
    cache: Arc<Cache>,
    dedup: Arc<RequestDeduplicator<CommonFollowingsData>>,
    batch_size: usize,
    batch_delay: Duration,
    milestone: usize,
    ttl: Duration,
    pause: PauseSignal,
    progress: Arc<dyn ProgressSink>,
}

impl CommonFollowingsAggregator {
    pub fn new(
        client: Arc<ApiClient>,
        cache: Arc<Cache>,
        dedup: Arc<RequestDeduplicator<CommonFollowingsData>>,
    ) -> Self {
        let settings = FetchSettings::default();
        let ttl = cache.ttl();
        Self {
            client,
            cache,
            dedup,
            batch_size: settings.batch_size,
            batch_delay: settings.batch_delay(),
            milestone: settings.progress_milestone,
            ttl,
            pause: PauseSignal::new(),
            progress: Arc::new(TracingProgress),
        }
    }

    /// Apply batch size, pacing and progress cadence from `settings`
    pub fn with_settings(mut self, settings: &FetchSettings) -> Self {
        self.batch_size = settings.batch_size.max(1);
        self.batch_delay = settings.batch_delay();
        self.milestone = settings.progress_milestone.max(1);
        self
    }

    pub fn with_pause(mut self, pause: PauseSignal) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Common followings of one user
    ///
    /// Served from the cache when fresh, otherwise fetched (joining any
    /// identical request already in flight) and written back.
    pub async fn lookup(&self, mid: Mid) -> (Result<CommonFollowingsData>, LookupSource) {
        let key = cache_key(mid);

        if let Some(data) = self.cache.get::<CommonFollowingsData>(&key) {
            debug!(mid = %mid, "Common followings cache hit");
            return (Ok(data), LookupSource::Cache);
        }

        let client = Arc::clone(&self.client);
        let result = self
            .dedup
            .dedupe(&key, move || async move { client.common_followings(mid).await })
            .await;

        if let Ok(ref data) = result {
            self.cache.set(&key, data, self.ttl);
        }

        (result, LookupSource::Network)
    }

    fn batch_is_cached(&self, batch: &[Mid]) -> bool {
        batch.iter().all(|mid| self.cache.contains(&cache_key(*mid)))
    }

    /// Common followings of every user in `ids`
    ///
    /// Every id gets an entry. A failed lookup yields an empty list and a
    /// warning; it never aborts the run.
    pub async fn aggregate(&self, ids: &[Mid]) -> HashMap<Mid, Vec<Mid>> {
        let total = ids.len();
        let mut relations = HashMap::with_capacity(total);
        let mut done = 0usize;
        let mut next_milestone = self.milestone;
        let mut cache_hits = 0usize;
        let mut failures = 0usize;

        let batches: Vec<&[Mid]> = ids.chunks(self.batch_size.max(1)).collect();

        info!(total, batches = batches.len(), "Aggregating common followings");

        for (index, batch) in batches.iter().enumerate() {
            self.pause.wait_if_paused().await;

            let results = join_all(batch.iter().map(|&mid| async move {
                let (result, source) = self.lookup(mid).await;
                (mid, result, source)
            }))
            .await;

            for (mid, result, source) in results {
                if source == LookupSource::Cache {
                    cache_hits += 1;
                }
                match result {
                    Ok(data) => {
                        relations.insert(mid, data.mids());
                    }
                    Err(e) => {
                        warn!(mid = %mid, error = %e, "Common followings lookup failed");
                        failures += 1;
                        relations.insert(mid, Vec::new());
                    }
                }
            }

            done += batch.len();
            if done >= next_milestone || done == total {
                self.progress
                    .report(ProgressEvent::CommonFollowings { done, total });
                while next_milestone <= done {
                    next_milestone += self.milestone;
                }
            }

            if let Some(next) = batches.get(index + 1) {
                if self.batch_is_cached(next) {
                    debug!(batch = index + 1, "Next batch fully cached, not pacing");
                } else {
                    tokio::time::sleep(self.batch_delay).await;
                }
            }
        }

        info!(
            total,
            cache_hits,
            failures,
            "Common followings aggregation complete"
        );

        relations
    }
}
