//! Page arithmetic for search results.

use gnoindex_core::QueryError;

pub const DEFAULT_PER_PAGE: usize = 30;
pub const MAX_PER_PAGE: usize = 100;

/// Absent means [`DEFAULT_PER_PAGE`]; anything else is clamped into
/// `[1, MAX_PER_PAGE]`.
pub fn validate_per_page(per_page: Option<i64>) -> usize {
    match per_page {
        None => DEFAULT_PER_PAGE,
        Some(n) if n < 1 => 1,
        Some(n) => (n as u64).min(MAX_PER_PAGE as u64) as usize,
    }
}

/// Number of pages for `total` results; at least one, so an empty result
/// still has a valid first page.
pub fn total_pages(total: usize, per_page: usize) -> usize {
    if total == 0 {
        1
    } else {
        (total - 1) / per_page.max(1) + 1
    }
}

/// Absent means the first page. An explicit page must lie in
/// `[1, total_pages]`.
pub fn validate_page(page: Option<i64>, per_page: usize, total: usize) -> Result<usize, QueryError> {
    let Some(page) = page else {
        return Ok(1);
    };
    let pages = total_pages(total, per_page);
    if page <= 0 || page as u64 > pages as u64 {
        return Err(QueryError::InvalidPage { page, total_pages: pages });
    }
    Ok(page as usize)
}

/// Results to skip before `page`.
pub fn skip_count(page: usize, per_page: usize) -> usize {
    page.saturating_sub(1).saturating_mul(per_page)
}
