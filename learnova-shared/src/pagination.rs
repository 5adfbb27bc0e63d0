//! Page-number pagination
//!
//! List endpoints take `?page=` and `?page_size=` and answer with
//! [`Page`]: the total row count, links to the neighbouring pages and the
//! rows of the requested page.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// A normalized page request
///
/// `page` is 1-based and at least 1; `page_size` lies in 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn clamped(params: PageParams) -> Self {
        Self {
            page: params.page.unwrap_or(1).max(1),
            page_size: params
                .page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::clamped(PageParams::default())
    }
}

impl From<PageParams> for PageRequest {
    fn from(params: PageParams) -> Self {
        Self::clamped(params)
    }
}

/// Paginated response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wraps one page of rows
    ///
    /// `path` and `query` are the request's own; the neighbour links keep
    /// every other query parameter and only swap `page`.
    pub fn new(results: Vec<T>, count: i64, request: PageRequest, path: &str, query: Option<&str>) -> Self {
        let shown = request.offset() + results.len() as i64;

        Self {
            count,
            next: (shown < count).then(|| page_link(path, query, request.page + 1)),
            previous: (request.page > 1).then(|| page_link(path, query, request.page - 1)),
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Rebuilds `path?query` with `page` set to `page`
pub fn page_link(path: &str, query: Option<&str>, page: u32) -> String {
    let mut pairs: Vec<&str> = query
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty() && pair.split('=').next() != Some("page"))
        .collect();

    let page_pair = format!("page={}", page);
    pairs.push(&page_pair);

    format!("{}?{}", path, pairs.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = PageRequest::default();
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 20);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_clamping() {
        let request = PageRequest::clamped(PageParams {
            page: Some(0),
            page_size: Some(500),
        });
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 100);

        let request = PageRequest::clamped(PageParams {
            page: Some(3),
            page_size: Some(0),
        });
        assert_eq!(request.page_size, 1);
        assert_eq!(request.offset(), 2);
    }

    #[test]
    fn test_links() {
        let request = PageRequest::clamped(PageParams {
            page: Some(2),
            page_size: Some(10),
        });
        let page = Page::new(vec![0; 10], 35, request, "/api/v1/courses", Some("status=PUBLISHED&page=2&page_size=10"));

        assert_eq!(page.count, 35);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/v1/courses?status=PUBLISHED&page_size=10&page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/v1/courses?status=PUBLISHED&page_size=10&page=1")
        );
    }

    #[test]
    fn test_last_page_has_no_next() {
        let request = PageRequest::clamped(PageParams {
            page: Some(4),
            page_size: Some(10),
        });
        let page = Page::new(vec![0; 5], 35, request, "/api/v1/courses", None);

        assert!(page.next.is_none());
        assert_eq!(page.previous.as_deref(), Some("/api/v1/courses?page=3"));
    }

    #[test]
    fn test_single_page() {
        let page = Page::new(vec!["a", "b"], 2, PageRequest::default(), "/x", None);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
        assert_eq!(page.map(str::len).results, vec![1, 1]);
    }
}
