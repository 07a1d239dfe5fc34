//! FollowGraph - social follow graph acquisition
//!
//! Fetches a user's follow list from a paginated, rate-limited upstream API,
//! resolves which of those users follow each other, and builds a deduplicated
//! graph ready for visualization.
//!
//! # Architecture
//!
//! - **api**: HTTP client, rate limiter, retry with backoff, wire formats
//! - **cache**: Expiring SQLite response cache
//! - **dedup**: In-flight request deduplication
//! - **fetch**: Paged list walking, common-followings aggregation, pause and progress
//! - **pipeline**: Wires the stages together for one session
//! - **config**: YAML configuration
//!
//! Graph construction itself lives in the I/O-free `follow_graph` crate.

// Core modules
pub mod config;
pub mod error;
pub mod logging;

// Acquisition
pub mod api;
pub mod cache;
pub mod dedup;
pub mod fetch;
pub mod pipeline;

// Re-exports
pub use error::{FollowGraphError, Result};
pub use follow_graph::{GraphData, GraphEdge, GraphNode, GraphStats, Mid, UserIdentity};
pub use pipeline::{IdentityProvider, Pipeline, PipelineOutput, StaticIdentity};
