//! HTTP client for the upstream relation API
//!
//! Every call goes through the shared [`RateLimiter`], is classified by
//! [`RetryableError`](super::retry::RetryableError) and retried with backoff.

use super::rate_limiter::RateLimiter;
use super::retry::{with_retry, RetryConfig};
use super::types::{
    ApiEnvelope, CommonFollowingsData, SessionIdentity, RATE_LIMITED_CODE, SUCCESS_CODE,
};
use crate::config::ApiConfig;
use crate::{FollowGraphError, Result};
use follow_graph::Mid;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

pub const FOLLOWERS_PATH: &str = "/x/relation/followers";
pub const FOLLOWINGS_PATH: &str = "/x/relation/followings";
pub const COMMON_FOLLOWINGS_PATH: &str = "/x/relation/same/followings";
pub const NAV_PATH: &str = "/x/web-interface/nav";

/// Query parameters; `None` values are left out of the URL
pub type Params<'a> = [(&'a str, Option<String>)];

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of client activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Logical requests
    pub requests: u64,
    /// Network attempts, including retries
    pub attempts: u64,
    /// Backoff sleeps taken
    pub retries: u64,
    /// Requests that ended in an error
    pub failures: u64,
}

/// Upstream API client
#[derive(Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    cookie: Option<String>,
    timeout: Duration,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
    counters: Counters,
}

impl ApiClient {
    /// Create a new client
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &ApiConfig, retry: RetryConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .user_agent(config.user_agent.clone())
            .build()?; // reqwest::Error converts to FollowGraphError::Http via #[from]

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie: config.cookie.clone(),
            timeout: config.timeout(),
            limiter,
            retry,
            counters: Counters::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Build the full URL, appending only the parameters that have a value
    pub fn build_url(&self, path: &str, params: &Params<'_>) -> String {
        let mut url = format!("{}{}", self.base_url, path);

        let query: Vec<String> = params
            .iter()
            .filter_map(|(key, value)| {
                value.as_ref().map(|v| {
                    format!("{}={}", urlencoding::encode(key), urlencoding::encode(v))
                })
            })
            .collect();

        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }

        url
    }

    /// Issue one logical GET request and return the envelope's `data`
    pub async fn request<T: DeserializeOwned>(&self, path: &str, params: &Params<'_>) -> Result<T> {
        let url = self.build_url(path, params);
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let mut attempts: u64 = 0;
        let result = with_retry(&self.retry, path, || {
            attempts += 1;
            self.send_once::<T>(&url)
        })
        .await;

        self.counters
            .retries
            .fetch_add(attempts.saturating_sub(1), Ordering::Relaxed);
        if result.is_err() {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
        }

        result
    }

    async fn send_once<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.limiter.acquire().await;
        self.counters.attempts.fetch_add(1, Ordering::Relaxed);

        trace!(url = %url, "Sending request");

        let mut request = self.client.get(url).timeout(self.timeout);
        if let Some(ref cookie) = self.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // The throttling code may arrive with any HTTP status
            if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body) {
                if envelope.code == RATE_LIMITED_CODE {
                    return Err(FollowGraphError::RateLimited(envelope.message));
                }
            }
            return Err(FollowGraphError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Err(FollowGraphError::EmptyData);
        }

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)
            .map_err(|e| FollowGraphError::Parse(format!("{}: {}", url, e)))?;

        match envelope.code {
            SUCCESS_CODE => envelope.data.ok_or(FollowGraphError::EmptyData),
            RATE_LIMITED_CODE => Err(FollowGraphError::RateLimited(envelope.message)),
            code => Err(FollowGraphError::Api {
                code,
                message: envelope.message,
            }),
        }
    }

    /// One page of a user's followers
    ///
    /// Returned undecoded so that a malformed page can be skipped by the caller.
    pub async fn followers(
        &self,
        vmid: Mid,
        page: u32,
        page_size: u32,
        offset: Option<&str>,
    ) -> Result<serde_json::Value> {
        debug!(vmid = %vmid, page, "Fetching followers page");
        self.request(
            FOLLOWERS_PATH,
            &[
                ("vmid", Some(vmid.to_string())),
                ("ps", Some(page_size.to_string())),
                ("pn", Some(page.to_string())),
                ("offset", offset.map(str::to_string)),
            ],
        )
        .await
    }

    /// One page of the users `vmid` follows
    pub async fn followings(&self, vmid: Mid, page: u32, page_size: u32) -> Result<serde_json::Value> {
        debug!(vmid = %vmid, page, "Fetching followings page");
        self.request(
            FOLLOWINGS_PATH,
            &[
                ("vmid", Some(vmid.to_string())),
                ("ps", Some(page_size.to_string())),
                ("pn", Some(page.to_string())),
            ],
        )
        .await
    }

    /// Users followed by both the session user and `vmid`
    pub async fn common_followings(&self, vmid: Mid) -> Result<CommonFollowingsData> {
        debug!(vmid = %vmid, "Fetching common followings");
        self.request(COMMON_FOLLOWINGS_PATH, &[("vmid", Some(vmid.to_string()))])
            .await
    }

    /// Identity of the session the cookie belongs to
    pub async fn session(&self) -> Result<SessionIdentity> {
        self.request(NAV_PATH, &[]).await
    }
}
