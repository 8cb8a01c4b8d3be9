//! Database models, the storage seam, and its implementations.

pub mod bills;
pub mod health;
pub mod kv;
pub mod members;
pub mod memory;
pub mod models;
pub mod pg;
pub mod records;
pub mod search;
pub mod sessions;
pub mod store;

pub use memory::MemoryStore;
pub use pg::PgStore;
pub use store::Store;

/// Highest page number any listing serves.
pub const MAX_PAGE: i64 = 10_000;

/// Largest page size a listing accepts.
pub const MAX_PER_PAGE: i64 = 100;

/// A clamped 1-based page request and the row offset it starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub per_page: i64,
    pub offset: i64,
}

impl PageWindow {
    pub fn new(page: i64, per_page: i64) -> Self {
        let page = page.clamp(1, MAX_PAGE);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        Self {
            page,
            per_page,
            offset: (page - 1) * per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window_offsets() {
        assert_eq!(
            PageWindow::new(3, 12),
            PageWindow {
                page: 3,
                per_page: 12,
                offset: 24
            }
        );
        assert_eq!(PageWindow::new(0, 0).offset, 0);
        assert_eq!(PageWindow::new(-5, 500).per_page, MAX_PER_PAGE);
    }

    #[test]
    fn test_page_window_huge_page_is_clamped() {
        let window = PageWindow::new(i64::MAX, i64::MAX);
        assert_eq!(window.page, MAX_PAGE);
        assert_eq!(window.offset, (MAX_PAGE - 1) * MAX_PER_PAGE);
    }
}
