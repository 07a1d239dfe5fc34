//! In-flight request deduplication
//!
//! Concurrent callers asking for the same resource share one underlying
//! request and observe the same outcome, retries included.

use crate::{FollowGraphError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type SharedOutcome<T> = Shared<BoxFuture<'static, std::result::Result<T, Arc<FollowGraphError>>>>;
type PendingMap<T> = Arc<Mutex<HashMap<String, SharedOutcome<T>>>>;

/// Removes a pending entry when the request settles, or unwinds
struct PendingGuard<T> {
    pending: PendingMap<T>,
    key: String,
}

impl<T> Drop for PendingGuard<T> {
    fn drop(&mut self) {
        // The removed handle is released after the lock
        let removed = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        drop(removed);
    }
}

/// Ensures at most one in-flight request per key
///
/// The pending entry is removed by the request itself as soon as it settles,
/// before any caller sees the result, so a failed or panicking request never
/// blocks later requests for the same key.
pub struct RequestDeduplicator<T> {
    pending: PendingMap<T>,
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(pending: &PendingMap<T>) -> MutexGuard<'_, HashMap<String, SharedOutcome<T>>> {
        pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of keys with a request in flight
    pub fn in_flight(&self) -> usize {
        Self::lock(&self.pending).len()
    }

    /// Run `factory` for `key` unless a request for it is already in flight
    ///
    /// `factory` is called while the pending map is locked; it must only
    /// construct the future, not drive it.
    pub async fn dedupe<F, Fut>(&self, key: &str, factory: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let outcome = {
            let mut pending = Self::lock(&self.pending);

            match pending.get(key) {
                Some(existing) => {
                    debug!(key = %key, "Joining in-flight request");
                    existing.clone()
                }
                None => {
                    let request = factory();
                    let guard = PendingGuard {
                        pending: Arc::clone(&self.pending),
                        key: key.to_string(),
                    };

                    let shared = async move {
                        let _guard = guard;
                        request.await.map_err(Arc::new)
                    }
                    .boxed()
                    .shared();

                    pending.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        outcome
            .await
            .map_err(|e| Arc::try_unwrap(e).unwrap_or_else(FollowGraphError::Shared))
    }
}

impl<T> Default for RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for RequestDeduplicator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let in_flight = self
            .pending
            .lock()
            .map(|p| p.len())
            .unwrap_or_default();
        f.debug_struct("RequestDeduplicator")
            .field("in_flight", &in_flight)
            .finish()
    }
}
