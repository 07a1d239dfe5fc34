//! Upstream API access
//!
//! A resilient client for the paged, rate-limited relation API.
//!
//! # Request Flow
//!
//! 1. **Rate limit**: wait for the shared [`RateLimiter`] slot
//! 2. **Send**: GET with the session cookie and a per-request timeout
//! 3. **Classify**: HTTP status, then the envelope's application `code`
//! 4. **Retry**: transient failures back off exponentially with jitter
//!
//! Application code `-412` is the upstream's throttling signal and is retried
//! like HTTP 429.

pub mod client;
pub mod rate_limiter;
pub mod retry;
pub mod types;

pub use client::{ApiClient, ClientStats};
pub use rate_limiter::RateLimiter;
pub use retry::{with_retry, RetryConfig, RetryDecision, RetryableError};
pub use types::{CommonFollowingsData, FollowItem, SessionIdentity, VipInfo};
