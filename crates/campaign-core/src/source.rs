//! Paginated record sources
//!
//! Both the contact list and the open-tracking analytics are read through a
//! cursor-based query: the caller passes the cursor from the previous page
//! (or none for the first page) and receives a page of records together
//! with a continuation cursor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::contact::Contact;
use crate::tracking::TrackingRecord;

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// One page of a cursor-paginated query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A final page with no continuation
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            has_more: false,
            next_cursor: None,
        }
    }

    /// A page followed by more records at `cursor`
    pub fn more(items: Vec<T>, cursor: impl Into<String>) -> Self {
        Self {
            items,
            has_more: true,
            next_cursor: Some(cursor.into()),
        }
    }
}

/// Errors raised while querying an upstream source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Source unreachable: {0}")]
    Unreachable(String),

    #[error("Source rejected query ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed source response: {0}")]
    Malformed(String),
}

/// A cursor-paginated query over some record type
#[async_trait]
pub trait PagedSource: Send + Sync {
    type Item: Send;

    /// Fetch the page starting at `cursor`
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page<Self::Item>, SourceError>;
}

/// Source of campaign recipients
pub trait ContactSource: PagedSource<Item = Contact> {}
impl<S> ContactSource for S where S: PagedSource<Item = Contact> {}

/// Source of open-tracking records
pub trait TrackingSource: PagedSource<Item = TrackingRecord> {}
impl<S> TrackingSource for S where S: PagedSource<Item = TrackingRecord> {}

/// Walk every page of `source` and flatten the records in order.
///
/// A page that reports more results without a cursor ends the walk.
pub async fn fetch_all<S>(source: &S, page_size: u32) -> Result<Vec<S::Item>, SourceError>
where
    S: PagedSource + ?Sized,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source.fetch_page(cursor.as_deref(), page_size).await?;
        pages += 1;
        items.extend(page.items);
        debug!(pages, records = items.len(), "Fetched page");

        match (page.has_more, page.next_cursor) {
            (true, Some(next)) => cursor = Some(next),
            (true, None) => {
                warn!(pages, "Source reported more pages without a cursor; stopping");
                break;
            }
            (false, _) => break,
        }
    }

    Ok(items)
}
