//! Minimum-interval rate limiter
//!
//! Every upstream request goes through one shared limiter so that calls are
//! spaced at least `min_interval` apart, no matter how many tasks issue them.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Default spacing between upstream requests
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(200);

/// Enforces a minimum interval between granted calls
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    /// Start of the most recently granted call
    last_granted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_granted: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the interval since the previous grant has elapsed
    ///
    /// The lock is held while sleeping, so waiters queue behind each other and
    /// each one measures from the grant before it.
    pub async fn acquire(&self) {
        let mut last = self.last_granted.lock().await;

        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                trace!(
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "Rate limiter delaying request"
                );
                sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
