//! Error types for FollowGraph
//!
//! Defines a comprehensive error enum covering all failure modes across the
//! pipeline. Uses thiserror for ergonomic error handling.

use crate::api::retry::{RetryDecision, RetryableError};
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for FollowGraph operations
pub type Result<T> = std::result::Result<T, FollowGraphError>;

/// Comprehensive error type for FollowGraph operations
#[derive(Error, Debug)]
pub enum FollowGraphError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Transport-level HTTP errors (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Non-zero application code in the response envelope
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Upstream rate limiting (HTTP 429 equivalent)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Successful envelope without a data payload
    #[error("Response contained no data")]
    EmptyData,

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// No session, or the current user could not be resolved
    #[error("Identity error: {0}")]
    Identity(String),

    /// Paged list could not be walked
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// Graph construction errors
    #[error("Graph error: {0}")]
    Graph(#[from] follow_graph::Error),

    /// Outcome of a deduplicated request, shared by every waiting caller
    #[error("{0}")]
    Shared(Arc<FollowGraphError>),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl RetryableError for FollowGraphError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            FollowGraphError::Http(e) => {
                if e.is_decode() || e.is_builder() {
                    RetryDecision::NoRetry
                } else if let Some(status) = e.status() {
                    status_decision(status.as_u16())
                } else {
                    // connect, timeout, request and body failures
                    RetryDecision::Retry
                }
            }
            FollowGraphError::HttpStatus { status, .. } => status_decision(*status),
            FollowGraphError::RateLimited(_) => RetryDecision::Retry,
            FollowGraphError::Shared(inner) => inner.retry_decision(),

            FollowGraphError::Config(_) => RetryDecision::NoRetry,
            FollowGraphError::Io(_) => RetryDecision::NoRetry,
            FollowGraphError::Yaml(_) => RetryDecision::NoRetry,
            FollowGraphError::Database(_) => RetryDecision::NoRetry,
            FollowGraphError::Api { .. } => RetryDecision::NoRetry,
            FollowGraphError::EmptyData => RetryDecision::NoRetry,
            FollowGraphError::Parse(_) => RetryDecision::NoRetry,
            FollowGraphError::Identity(_) => RetryDecision::NoRetry,
            FollowGraphError::Pagination(_) => RetryDecision::NoRetry,
            FollowGraphError::Graph(_) => RetryDecision::NoRetry,
            FollowGraphError::Other(_) => RetryDecision::NoRetry,
        }
    }
}

/// 429 and 5xx are transient, everything else is the caller's fault
fn status_decision(status: u16) -> RetryDecision {
    match status {
        429 | 500..=599 => RetryDecision::Retry,
        _ => RetryDecision::NoRetry,
    }
}
