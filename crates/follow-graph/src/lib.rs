//! Follow graph construction for visualization
//!
//! Turns a raw follow list plus a "common followings" relation map into a
//! deduplicated node set, a deduplicated directed edge set with bidirectional
//! tagging, per-node degree and a render size derived from that degree.
//!
//! This crate does no I/O. Acquisition of the inputs lives in the
//! `followgraph` crate.
//!
//! # Example
//!
//! ```
//! use follow_graph::{build, BuildParams, Mid, UserIdentity};
//! use std::collections::HashMap;
//!
//! let follows = vec![
//!     UserIdentity::new(1u64, "alice"),
//!     UserIdentity::new(2u64, "bob"),
//! ];
//! let mut common = HashMap::new();
//! common.insert(Mid::new(1), vec![Mid::new(2)]);
//! common.insert(Mid::new(2), vec![Mid::new(1)]);
//!
//! let graph = build(&follows, &common, &BuildParams::default());
//! assert_eq!(graph.stats.edge_count, 2);
//! assert!(graph.edges.iter().all(|e| e.bidirectional));
//! ```

mod builder;
mod identity;
mod ids;

pub use builder::{build, BuildParams, GraphData, GraphEdge, GraphNode, GraphStats, SizeParams};
pub use identity::UserIdentity;
pub use ids::Mid;

use thiserror::Error;

/// Errors raised while preparing a graph build
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid size parameters: {0}")]
    InvalidSizeParams(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, Error>;
