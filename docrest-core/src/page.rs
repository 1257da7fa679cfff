//! Pagination parameters and page results.
//!
//! Pages are 1-indexed. Out-of-range parameters are clamped rather than rejected: a page below 1
//! is page 1, a size below 1 is 1 and a size above [`MAX_PER_PAGE`] is [`MAX_PER_PAGE`].

use serde::{Deserialize, Serialize};

/// Default page size of the paginated listing.
pub const DEFAULT_PER_PAGE: usize = 5;
/// Largest page size a caller can ask for.
pub const MAX_PER_PAGE: usize = 100;

/// A single page of results with navigation metadata.
///
/// ```ignore
/// let page = Page::builder(vec!["a", "b"])
///     .with_count(12)
///     .with_next_page(Some(2))
///     .build();
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of items across all pages.
    pub count: usize,
    /// The next page number (if more pages exist).
    pub next_page: Option<usize>,
    /// The previous page number (if this is not the first page).
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }

    /// Converts the items, keeping the navigation metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<Vec<_>, _>>()?,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        })
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

pub struct PageBuilder<T> {
    items: Vec<T>,
    count: usize,
    next_page: Option<usize>,
    previous_page: Option<usize>,
}

impl<T> PageBuilder<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_next_page(mut self, next_page: Option<usize>) -> Self {
        self.next_page = next_page;
        self
    }

    pub fn with_previous_page(mut self, previous_page: Option<usize>) -> Self {
        self.previous_page = previous_page;
        self
    }

    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

/// Which page to fetch and how large pages are.
///
/// Always holds clamped values, so [`PaginationParams::offset`] cannot underflow.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct PaginationParams {
    page: usize,
    per_page: usize,
}

impl PaginationParams {
    /// Creates clamped pagination parameters.
    ///
    /// Takes signed values so that raw user input (`page=-3`) can be passed straight in.
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1) as usize,
            per_page: per_page.clamp(1, MAX_PER_PAGE as i64) as usize,
        }
    }

    /// Parses raw query-string values; anything unparsable falls back to the defaults.
    pub fn from_raw(page: Option<&str>, per_page: Option<&str>) -> Self {
        let parse = |raw: Option<&str>, default: usize| {
            raw.and_then(|value| value.trim().parse::<i64>().ok())
                .unwrap_or(default as i64)
        };

        Self::new(parse(page, 1), parse(per_page, DEFAULT_PER_PAGE))
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// Number of items to skip to reach this page.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Wraps the items of this page with navigation metadata, given the total count.
    pub fn page_of<T>(&self, items: Vec<T>, count: usize) -> Page<T> {
        let end = self.offset().saturating_add(items.len());

        Page::builder(items)
            .with_count(count)
            .with_next_page((end < count).then_some(self.page + 1))
            .with_previous_page((self.page > 1).then(|| self.page - 1))
            .build()
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: DEFAULT_PER_PAGE }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        let params = PaginationParams::new(0, -4);
        assert_eq!((params.page(), params.per_page()), (1, 1));

        let params = PaginationParams::new(3, 10_000);
        assert_eq!((params.page(), params.per_page()), (3, MAX_PER_PAGE));
    }

    #[test]
    fn unparsable_input_uses_defaults() {
        let params = PaginationParams::from_raw(Some("abc"), None);

        assert_eq!(params, PaginationParams::default());
        assert_eq!(PaginationParams::from_raw(Some("2"), Some("3")).offset(), 3);
    }

    #[test]
    fn middle_page_links_both_ways() {
        let params = PaginationParams::new(2, 10);
        let page = params.page_of((11..=20).collect::<Vec<_>>(), 100);

        assert_eq!(params.offset(), 10);
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.previous_page, Some(1));
        assert_eq!(page.count, 100);
    }

    #[test]
    fn last_page_has_no_next() {
        let page = PaginationParams::new(3, 5).page_of(vec![11, 12], 12);

        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, Some(2));
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let page = PaginationParams::new(9, 5).page_of(Vec::<i32>::new(), 12);

        assert!(page.items.is_empty());
        assert_eq!(page.next_page, None);
    }
}
