//! Page metadata for listings proxied from upstream.
//!
//! Upstream totals overshoot: pages past the real end come back empty. The
//! first empty page observed pins the real total, which is then remembered in
//! [`PageCountCache`](crate::cache::PageCountCache).

use serde::{Serialize, Serializer};

use crate::data::MAX_PAGE;
use crate::web::error::ApiError;

/// Page size used for browsing listings.
pub const LISTING_PAGE_SIZE: u32 = 12;

/// Elided ranges show every page up to this many.
const FULL_RANGE_MAX: u64 = 7;

/// Rejects page numbers outside `1..=MAX_PAGE` before any query runs.
pub fn check_page(page: i64) -> Result<(), ApiError> {
    if (1..=MAX_PAGE).contains(&page) {
        Ok(())
    } else {
        Err(ApiError::invalid(format!("page must be between 1 and {MAX_PAGE}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    Page(u64),
    Ellipsis,
}

impl Serialize for PageLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageLink::Page(n) => serializer.serialize_u64(*n),
            PageLink::Ellipsis => serializer.serialize_str("…"),
        }
    }
}

/// Page links around `current`, e.g. `1 … 4 5 6 7 8 … 20`.
///
/// All pages are listed when there are at most seven; otherwise `on_each_side`
/// neighbours are kept and gaps wider than one page collapse to an ellipsis.
pub fn elided_page_range(current: u64, total_pages: u64, on_each_side: u64) -> Vec<PageLink> {
    if total_pages <= FULL_RANGE_MAX {
        return (1..=total_pages).map(PageLink::Page).collect();
    }

    let current = current.clamp(1, total_pages);
    let start = current.saturating_sub(on_each_side).max(1);
    let end = (current + on_each_side).min(total_pages);

    let mut links = Vec::new();
    if start > 1 {
        links.push(PageLink::Page(1));
        if start > 2 {
            links.push(PageLink::Ellipsis);
        }
    }
    links.extend((start..=end).map(PageLink::Page));
    if end < total_pages {
        if end < total_pages - 1 {
            links.push(PageLink::Ellipsis);
        }
        links.push(PageLink::Page(total_pages));
    }
    links
}

/// Totals for one page after applying what is known about the real count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCount {
    pub total_count: u64,
    pub total_pages: u64,
    /// A real total learned from this page, to be remembered.
    pub discovered: Option<u64>,
}

fn pages_for(count: u64, limit: u64) -> u64 {
    if count == 0 { 1 } else { count.div_ceil(limit) }
}

pub fn resolve_count(
    page: u64,
    limit: u32,
    reported: u64,
    remembered: Option<u64>,
    items_on_page: usize,
) -> ResolvedCount {
    let limit = u64::from(limit.max(1));
    if let Some(real) = remembered {
        return ResolvedCount {
            total_count: real,
            total_pages: pages_for(real, limit),
            discovered: None,
        };
    }
    if items_on_page == 0 && page > 1 {
        let real = (page - 1) * limit;
        return ResolvedCount {
            total_count: real,
            total_pages: page - 1,
            discovered: Some(real),
        };
    }
    ResolvedCount {
        total_count: reported,
        total_pages: pages_for(reported, limit),
        discovered: None,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u64,
    pub total_pages: u64,
    pub total_count: u64,
    pub previous_page: Option<u64>,
    pub next_page: Option<u64>,
    pub page_range: Vec<PageLink>,
}

impl PageMeta {
    pub fn new(page: u64, resolved: ResolvedCount) -> Self {
        let total_pages = resolved.total_pages;
        Self {
            page,
            total_pages,
            total_count: resolved.total_count,
            previous_page: (page > 1).then(|| page - 1),
            next_page: (page < total_pages).then(|| page + 1),
            page_range: elided_page_range(page, total_pages, 2),
        }
    }
}
