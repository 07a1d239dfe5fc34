//! Paged list walking
//!
//! Page 1 tells us the total; the remaining pages are fetched one after
//! another so the shared rate limiter is never flooded with a burst.

use super::pause::PauseSignal;
use super::progress::{ProgressEvent, ProgressSink, TracingProgress};
use crate::api::{ApiClient, FollowItem};
use crate::{FollowGraphError, Result};
use follow_graph::Mid;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Which paged relation list to walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListKind {
    /// Users following `vmid`
    Followers,
    /// Users `vmid` follows
    #[default]
    Followings,
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListKind::Followers => write!(f, "followers"),
            ListKind::Followings => write!(f, "followings"),
        }
    }
}

/// The merged result of walking every page
#[derive(Debug, Clone, Default)]
pub struct FetchedList {
    /// Items in page order
    pub items: Vec<FollowItem>,
    /// Total reported by the first page
    pub total: u64,
    pub total_pages: u32,
    /// Pages that were malformed or failed, and were left out
    pub skipped_pages: Vec<u32>,
}

/// Shape of a list page's `data`, checked loosely so bad pages can be skipped
#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    list: Option<Value>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    offset: Option<Value>,
}

impl RawPage {
    fn parse(data: Value) -> std::result::Result<Self, String> {
        if !data.is_object() {
            return Err(format!("page data is not an object: {}", type_name(&data)));
        }
        serde_json::from_value(data).map_err(|e| e.to_string())
    }

    fn items(&mut self) -> std::result::Result<Vec<FollowItem>, String> {
        match self.list.take() {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .map(serde_json::from_value::<FollowItem>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| format!("undecodable list entry: {}", e)),
            Some(other) => Err(format!("list is {}", type_name(&other))),
            None => Err("missing list".to_string()),
        }
    }

    /// Cursor for the next followers page
    fn next_offset(&self) -> Option<String> {
        match &self.offset {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Walks a paged list endpoint to completion
pub struct PaginatedFetcher {
    client: Arc<ApiClient>,
    pause: PauseSignal,
    progress: Arc<dyn ProgressSink>,
    progress_every: u32,
}

impl PaginatedFetcher {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            pause: PauseSignal::new(),
            progress: Arc::new(TracingProgress),
            progress_every: 5,
        }
    }

    pub fn with_pause(mut self, pause: PauseSignal) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Report every `pages` pages (and always on the last one)
    pub fn with_progress_every(mut self, pages: u32) -> Self {
        self.progress_every = pages.max(1);
        self
    }

    async fn fetch_page(
        &self,
        kind: ListKind,
        vmid: Mid,
        page: u32,
        page_size: u32,
        offset: Option<&str>,
    ) -> Result<Value> {
        match kind {
            ListKind::Followers => self.client.followers(vmid, page, page_size, offset).await,
            ListKind::Followings => self.client.followings(vmid, page, page_size).await,
        }
    }

    fn report(&self, page: u32, total_pages: u32, items: usize) {
        if page % self.progress_every == 0 || page == total_pages {
            self.progress.report(ProgressEvent::Pages {
                page,
                total_pages,
                items,
            });
        }
    }

    /// Fetch every page of `kind` for `vmid`
    ///
    /// A failure on page 1 is fatal because the total is unknown without it.
    /// Later pages that fail or are malformed are skipped with a warning.
    pub async fn fetch_all(&self, kind: ListKind, vmid: Mid, page_size: u32) -> Result<FetchedList> {
        if page_size == 0 {
            return Err(FollowGraphError::Pagination(
                "page size must be greater than 0".to_string(),
            ));
        }

        self.pause.wait_if_paused().await;

        let first = self.fetch_page(kind, vmid, 1, page_size, None).await?;
        let mut first = RawPage::parse(first)
            .map_err(|e| FollowGraphError::Pagination(format!("first {} page: {}", kind, e)))?;
        let total = first.total.ok_or_else(|| {
            FollowGraphError::Pagination(format!("first {} page has no total", kind))
        })?;
        let total_pages = total.div_ceil(u64::from(page_size)).min(u64::from(u32::MAX)) as u32;

        info!(vmid = %vmid, kind = %kind, total, total_pages, "Walking paged list");

        let mut fetched = FetchedList {
            items: Vec::with_capacity(total.min(10_000) as usize),
            total,
            total_pages,
            skipped_pages: Vec::new(),
        };

        match first.items() {
            Ok(items) => fetched.items.extend(items),
            Err(reason) => {
                warn!(vmid = %vmid, kind = %kind, page = 1, reason = %reason, "Skipping malformed page");
                fetched.skipped_pages.push(1);
            }
        }
        let mut offset = first.next_offset();
        self.report(1, total_pages.max(1), fetched.items.len());

        for page in 2..=total_pages {
            self.pause.wait_if_paused().await;

            let outcome = self
                .fetch_page(kind, vmid, page, page_size, offset.as_deref())
                .await
                .map_err(|e| e.to_string())
                .and_then(|data| {
                    let mut raw = RawPage::parse(data)?;
                    let items = raw.items()?;
                    Ok((items, raw.next_offset()))
                });

            match outcome {
                Ok((items, next)) => {
                    fetched.items.extend(items);
                    if next.is_some() {
                        offset = next;
                    }
                }
                Err(reason) => {
                    warn!(vmid = %vmid, kind = %kind, page, reason = %reason, "Skipping page");
                    fetched.skipped_pages.push(page);
                }
            }

            self.report(page, total_pages, fetched.items.len());
        }

        info!(
            vmid = %vmid,
            kind = %kind,
            items = fetched.items.len(),
            skipped = fetched.skipped_pages.len(),
            "Paged list complete"
        );

        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_page_items() {
        let mut page = RawPage::parse(json!({
            "list": [{"mid": 1, "uname": "a"}, {"mid": 2, "uname": "b"}],
            "total": 2
        }))
        .unwrap();
        assert_eq!(page.total, Some(2));
        let items = page.items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].mid, Mid::new(2));
    }

    #[test]
    fn test_raw_page_malformed_list() {
        let mut page = RawPage::parse(json!({"list": "oops", "total": 3})).unwrap();
        assert_eq!(page.items().unwrap_err(), "list is a string");

        let mut page = RawPage::parse(json!({"total": 3})).unwrap();
        assert_eq!(page.items().unwrap_err(), "missing list");

        let mut page = RawPage::parse(json!({"list": [{"uname": "no mid"}], "total": 1})).unwrap();
        assert!(page.items().is_err());
    }

    #[test]
    fn test_raw_page_not_an_object() {
        assert!(RawPage::parse(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_next_offset() {
        let page = RawPage::parse(json!({"list": [], "total": 0, "offset": "abc"})).unwrap();
        assert_eq!(page.next_offset().as_deref(), Some("abc"));

        let page = RawPage::parse(json!({"list": [], "total": 0, "offset": 17})).unwrap();
        assert_eq!(page.next_offset().as_deref(), Some("17"));

        let page = RawPage::parse(json!({"list": [], "total": 0, "offset": ""})).unwrap();
        assert_eq!(page.next_offset(), None);
    }

    #[test]
    fn test_list_kind_display() {
        assert_eq!(ListKind::Followers.to_string(), "followers");
        assert_eq!(ListKind::default(), ListKind::Followings);
    }
}
