//! Cursor-following traversal of paginated list endpoints.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};
use url::Url;

use super::errors::CongressApiError;
use super::fetch::Fetcher;

/// Page size requested from list endpoints.
pub const PAGE_SIZE: u32 = 250;

/// Everything collected by a [`walk`], in upstream order.
#[derive(Debug)]
pub struct Walk<T> {
    pub items: Vec<T>,
    pub pages: u32,
    /// Records that failed to deserialize and were dropped.
    pub skipped: usize,
    /// `false` when a page after the first failed and traversal stopped early.
    pub complete: bool,
    /// Total reported by the first page, if any.
    pub reported_count: Option<u64>,
}

impl<T> Walk<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            pages: 0,
            skipped: 0,
            complete: true,
            reported_count: None,
        }
    }
}

/// Sets `offset=0` and `limit=PAGE_SIZE` on the first page request.
pub fn first_page(mut url: Url) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "offset" && k != "limit")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("offset", "0")
        .append_pair("limit", &PAGE_SIZE.to_string());
    url
}

/// Follows `pagination.next` from `start` until the upstream stops handing
/// out cursors, collecting the records stored under `field` on each page.
///
/// A failure on the first page is an error. A failure on a later page ends
/// the walk with whatever was already collected and `complete = false`.
/// Individual records that fail to deserialize are skipped.
#[tracing::instrument(skip_all, fields(field = field))]
pub async fn walk<T: DeserializeOwned>(
    fetcher: &Fetcher,
    start: Url,
    field: &str,
) -> Result<Walk<T>, CongressApiError> {
    let mut walk = Walk::new();
    let mut next = Some(first_page(start));

    while let Some(url) = next.take() {
        let page: Value = match fetcher.get_json(&url).await {
            Ok(page) => page,
            Err(e) if walk.pages == 0 => return Err(e),
            Err(e) => {
                warn!(pages = walk.pages, collected = walk.items.len(), error = ?e, "pagination stopped early");
                walk.complete = false;
                break;
            }
        };
        walk.pages += 1;

        if walk.pages == 1 {
            walk.reported_count = page
                .pointer("/pagination/count")
                .and_then(Value::as_u64);
        }

        let Some(records) = page.get(field).and_then(Value::as_array) else {
            debug!(page = walk.pages, "page carried no records, stopping");
            break;
        };

        for record in records {
            match T::deserialize(record) {
                Ok(item) => walk.items.push(item),
                Err(e) => {
                    walk.skipped += 1;
                    debug!(page = walk.pages, error = %e, "skipping malformed record");
                }
            }
        }
        trace!(page = walk.pages, collected = walk.items.len(), "page collected");

        next = match page.pointer("/pagination/next").and_then(Value::as_str) {
            Some(cursor) => match Url::parse(cursor) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(cursor, error = %e, "unparseable pagination cursor");
                    walk.complete = false;
                    None
                }
            },
            None => None,
        };
    }

    if walk.skipped > 0 {
        warn!(skipped = walk.skipped, kept = walk.items.len(), "dropped malformed records");
    }
    Ok(walk)
}
