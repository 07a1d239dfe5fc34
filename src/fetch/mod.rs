//! Acquisition stages
//!
//! - [`PaginatedFetcher`] walks a paged follower/following list
//! - [`CommonFollowingsAggregator`] resolves common followings per user
//!
//! Both honor a shared [`PauseSignal`] and report through a [`ProgressSink`].

pub mod common;
pub mod paginated;
pub mod pause;
pub mod progress;

pub use common::{cache_key, CommonFollowingsAggregator, LookupSource};
pub use paginated::{FetchedList, ListKind, PaginatedFetcher};
pub use pause::PauseSignal;
pub use progress::{ProgressEvent, ProgressSink, TracingProgress};
