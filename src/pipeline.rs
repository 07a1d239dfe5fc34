//! End-to-end acquisition pipeline
//!
//! identity → paged follow list → common followings → graph build.
//!
//! A [`Pipeline`] owns the rate limiter, client, cache and deduplicator
//! for one session; every stage it runs shares them.

use crate::api::{ApiClient, ClientStats, CommonFollowingsData, RateLimiter};
use crate::cache::Cache;
use crate::config::FollowGraphConfig;
use crate::dedup::RequestDeduplicator;
use crate::fetch::{
    CommonFollowingsAggregator, ListKind, PaginatedFetcher, PauseSignal, ProgressSink,
    TracingProgress,
};
use crate::{FollowGraphError, Result};
use async_trait::async_trait;
use follow_graph::{GraphData, Mid, UserIdentity};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Supplies the identifier of the user whose graph is built
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Result<Mid>;
}

#[async_trait]
impl IdentityProvider for ApiClient {
    async fn current_user(&self) -> Result<Mid> {
        let session = self.session().await.map_err(|e| match e {
            FollowGraphError::Identity(_) => e,
            other => FollowGraphError::Identity(format!("session lookup failed: {}", other)),
        })?;

        if !session.is_login {
            return Err(FollowGraphError::Identity("not logged in".to_string()));
        }

        let mid = session
            .mid
            .ok_or_else(|| FollowGraphError::Identity("session has no user id".to_string()))?;

        info!(
            mid = %mid,
            uname = session.uname.as_deref().unwrap_or(""),
            "Resolved session user"
        );
        Ok(mid)
    }
}

/// A fixed user, for runs that skip the session lookup
#[derive(Debug, Clone, Copy)]
pub struct StaticIdentity(pub Mid);

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Result<Mid> {
        Ok(self.0)
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The user whose graph this is
    pub owner: Mid,
    pub kind: ListKind,
    /// Total the list endpoint reported
    pub reported_total: u64,
    pub skipped_pages: Vec<u32>,
    /// Deduplicated follow list in first-seen order
    pub follow_list: Vec<UserIdentity>,
    pub graph: GraphData,
    pub client_stats: ClientStats,
}

/// Shared state and stages for one acquisition session
pub struct Pipeline {
    config: FollowGraphConfig,
    limiter: Arc<RateLimiter>,
    client: Arc<ApiClient>,
    cache: Arc<Cache>,
    dedup: Arc<RequestDeduplicator<CommonFollowingsData>>,
    identity: Arc<dyn IdentityProvider>,
    pause: PauseSignal,
    progress: Arc<dyn ProgressSink>,
}

impl Pipeline {
    /// Wire a pipeline from configuration, opening the on-disk cache
    pub fn from_config(config: FollowGraphConfig) -> Result<Self> {
        config.validate()?;
        let cache = Cache::new(config.cache.to_cache_config())?;
        Self::with_cache(config, cache)
    }

    /// Wire a pipeline around an already opened cache
    pub fn with_cache(config: FollowGraphConfig, cache: Cache) -> Result<Self> {
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(config.rate_limit.min_interval()));
        let client = Arc::new(ApiClient::new(
            &config.api,
            config.retry.to_retry_config(),
            Arc::clone(&limiter),
        )?);
        let identity: Arc<dyn IdentityProvider> = client.clone();

        Ok(Self {
            config,
            limiter,
            client,
            cache: Arc::new(cache),
            dedup: Arc::new(RequestDeduplicator::new()),
            identity,
            pause: PauseSignal::new(),
            progress: Arc::new(TracingProgress),
        })
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &FollowGraphConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Handle for pausing and resuming the fetch loops from another task
    pub fn pause_signal(&self) -> PauseSignal {
        self.pause.clone()
    }

    fn fetcher(&self) -> PaginatedFetcher {
        PaginatedFetcher::new(Arc::clone(&self.client))
            .with_pause(self.pause.clone())
            .with_progress(Arc::clone(&self.progress))
            .with_progress_every(self.config.fetch.page_progress_every)
    }

    fn aggregator(&self) -> CommonFollowingsAggregator {
        CommonFollowingsAggregator::new(
            Arc::clone(&self.client),
            Arc::clone(&self.cache),
            Arc::clone(&self.dedup),
        )
        .with_settings(&self.config.fetch)
        .with_pause(self.pause.clone())
        .with_progress(Arc::clone(&self.progress))
    }

    /// Run every stage and build the graph
    ///
    /// Fails only when the user cannot be identified or the first list page
    /// cannot be fetched; later failures degrade the result instead.
    pub async fn run(&self, kind: ListKind) -> Result<PipelineOutput> {
        let owner = self.identity.current_user().await?;
        info!(owner = %owner, kind = %kind, "Starting acquisition");

        let fetched = self
            .fetcher()
            .fetch_all(kind, owner, self.config.fetch.page_size)
            .await?;

        let mut seen = HashSet::with_capacity(fetched.items.len());
        let mut follow_list: Vec<UserIdentity> = Vec::with_capacity(fetched.items.len());
        for user in fetched.items.into_iter().map(UserIdentity::from) {
            if seen.insert(user.mid) {
                follow_list.push(user);
            } else if let Some(existing) = follow_list.iter_mut().find(|u| u.mid == user.mid) {
                *existing = user;
            }
        }

        let ids: Vec<Mid> = follow_list.iter().map(|u| u.mid).collect();
        let common = self.aggregator().aggregate(&ids).await;

        let graph = follow_graph::build(&follow_list, &common, &self.config.graph);

        info!(
            owner = %owner,
            total_nodes = graph.stats.total_nodes,
            connected_nodes = graph.stats.connected_nodes,
            edges = graph.stats.edge_count,
            bidirectional = graph.stats.bidirectional_edge_count,
            "Graph built"
        );

        Ok(PipelineOutput {
            owner,
            kind,
            reported_total: fetched.total,
            skipped_pages: fetched.skipped_pages,
            follow_list,
            graph,
            client_stats: self.client.stats(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn offline_config() -> FollowGraphConfig {
        let mut config = FollowGraphConfig::default();
        config.api.base_url = "http://127.0.0.1:9".to_string();
        config.api.timeout_secs = 1;
        config.retry.max_retries = 0;
        config.rate_limit.min_interval_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_static_identity() {
        let identity = StaticIdentity(Mid::new(77));
        assert_eq!(identity.current_user().await.unwrap(), Mid::new(77));
    }

    #[tokio::test]
    async fn test_unreachable_session_is_identity_error() {
        let pipeline = Pipeline::with_cache(
            offline_config(),
            Cache::in_memory(Duration::from_secs(60)).unwrap(),
        )
        .unwrap();

        let err = pipeline.run(ListKind::Followings).await.unwrap_err();
        assert!(matches!(err, FollowGraphError::Identity(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = offline_config();
        config.fetch.page_size = 0;
        let result = Pipeline::with_cache(config, Cache::in_memory(Duration::from_secs(60)).unwrap());
        assert!(matches!(result, Err(FollowGraphError::Config(_))));
    }

    #[test]
    fn test_components_are_shared() {
        let pipeline = Pipeline::with_cache(
            offline_config(),
            Cache::in_memory(Duration::from_secs(60)).unwrap(),
        )
        .unwrap();
        assert_eq!(pipeline.rate_limiter().min_interval(), Duration::ZERO);
        assert_eq!(pipeline.client().base_url(), "http://127.0.0.1:9");
        assert!(!pipeline.pause_signal().is_paused());
    }
}
