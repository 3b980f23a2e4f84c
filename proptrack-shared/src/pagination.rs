/// Offset pagination shared by every list operation
///
/// Pages are 1-based. A missing or zero `page` means the first page, a
/// missing or zero `limit` means [`DEFAULT_LIMIT`], and limits above
/// [`MAX_LIMIT`] are clamped.
///
/// # Example
///
/// ```
/// use proptrack_shared::pagination::{Page, PageRequest};
///
/// let req = PageRequest::new(Some(2), Some(10));
/// assert_eq!(req.offset(), 10);
///
/// let page: Page<u32> = Page::new(vec![11, 12], 12, &req);
/// assert_eq!(page.total_pages, 2);
/// ```

use serde::{Deserialize, Serialize};

/// Page used when the request doesn't name one
pub const DEFAULT_PAGE: u32 = 1;

/// Page size used when the request doesn't name one
pub const DEFAULT_LIMIT: u32 = 50;

/// Largest page size a caller may request
pub const MAX_LIMIT: u32 = 100;

/// Requested page window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number
    pub page: Option<u32>,

    /// Rows per page
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self { page, limit }
    }

    /// Effective page number (>= 1)
    pub fn page(&self) -> u32 {
        match self.page {
            Some(page) if page >= 1 => page,
            _ => DEFAULT_PAGE,
        }
    }

    /// Effective page size (1..=MAX_LIMIT)
    pub fn limit(&self) -> u32 {
        match self.limit {
            Some(0) | None => DEFAULT_LIMIT,
            Some(limit) => limit.min(MAX_LIMIT),
        }
    }

    /// Number of rows to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    /// Cuts the requested window out of an already filtered and ordered row set
    pub fn window<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        rows.iter()
            .skip(start)
            .take(self.limit() as usize)
            .cloned()
            .collect()
    }
}

/// One page of results plus the totals needed to walk the rest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows on this page
    pub data: Vec<T>,

    /// Rows matching the query across all pages
    pub total: i64,

    /// Effective page number
    pub page: u32,

    /// Effective page size
    pub limit: u32,

    /// `ceil(total / limit)`
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, request: &PageRequest) -> Self {
        let limit = request.limit();

        Self {
            data,
            total,
            page: request.page(),
            limit,
            total_pages: total_pages(total, limit),
        }
    }

    /// Converts every row, keeping the totals
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

/// `ceil(total / limit)`, zero when there are no rows
pub fn total_pages(total: i64, limit: u32) -> u32 {
    if total <= 0 || limit == 0 {
        return 0;
    }

    let total = total as u64;
    let limit = u64::from(limit);
    u32::try_from(total.div_ceil(limit)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req = PageRequest::default();
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), 50);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        let req = PageRequest::new(Some(0), Some(0));
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn test_limit_is_clamped() {
        let req = PageRequest::new(None, Some(10_000));
        assert_eq!(req.limit(), MAX_LIMIT);
    }

    #[test]
    fn test_total_pages_is_ceiling() {
        assert_eq!(total_pages(0, 50), 0);
        assert_eq!(total_pages(1, 50), 1);
        assert_eq!(total_pages(50, 50), 1);
        assert_eq!(total_pages(51, 50), 2);
        assert_eq!(total_pages(101, 10), 11);
    }

    #[test]
    fn test_window_beyond_last_page_is_empty() {
        let rows: Vec<u32> = (1..=7).collect();

        let req = PageRequest::new(Some(2), Some(5));
        assert_eq!(req.window(&rows), vec![6, 7]);

        let req = PageRequest::new(Some(3), Some(5));
        assert!(req.window(&rows).is_empty());

        let page = Page::new(req.window(&rows), rows.len() as i64, &req);
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages, 2);
        assert!(page.data.is_empty());
    }

    #[test]
    fn test_page_map_keeps_totals() {
        let req = PageRequest::new(Some(1), Some(2));
        let page = Page::new(vec![1, 2], 3, &req).map(|n| n * 10);

        assert_eq!(page.data, vec![10, 20]);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
    }
}
