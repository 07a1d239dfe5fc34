//! Progress reporting for long-running acquisition stages

use std::fmt;

/// A progress observation emitted by the fetch stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A list page was fetched (or skipped)
    Pages {
        page: u32,
        total_pages: u32,
        items: usize,
    },
    /// Common-followings lookups completed so far
    CommonFollowings { done: usize, total: usize },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Pages {
                page,
                total_pages,
                items,
            } => write!(f, "page {}/{} ({} items)", page, total_pages, items),
            ProgressEvent::CommonFollowings { done, total } => {
                write!(f, "common followings {}/{}", done, total)
            }
        }
    }
}

/// Receiver of progress observations
///
/// Implemented for closures, so a UI can pass `|event| ...` directly.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Logs progress through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, event: ProgressEvent) {
        tracing::info!(progress = %event, "Fetch progress");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: ProgressEvent| seen.lock().unwrap().push(event);

        sink.report(ProgressEvent::CommonFollowings { done: 1, total: 2 });
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_display() {
        let event = ProgressEvent::Pages {
            page: 5,
            total_pages: 9,
            items: 250,
        };
        assert_eq!(event.to_string(), "page 5/9 (250 items)");
    }
}
