//! Pagination for public listings (24 items per page)

use serde::Serialize;

/// Page size for the public discovery listing
pub const PAGE_SIZE: i64 = 24;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Clamp `requested_page` to `[1, total_pages]` and compute the offset
///
/// # Examples
/// ```
/// use confrarias_common::pagination::calculate_pagination;
///
/// // 50 results = 3 pages (24 + 24 + 2)
/// let p = calculate_pagination(50, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 24);
///
/// // Out-of-bounds pages are clamped to the last one
/// assert_eq!(calculate_pagination(50, 99).page, 3);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64) -> Pagination {
    let total_pages = (total_results + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * PAGE_SIZE;

    Pagination {
        page,
        total_pages,
        offset,
    }
}

/// One page of results plus navigation metadata
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        Self {
            items,
            page: pagination.page,
            per_page: PAGE_SIZE,
            total,
            total_pages: pagination.total_pages,
        }
    }
}
