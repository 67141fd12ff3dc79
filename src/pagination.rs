//! Shared pagination contract for list endpoints.
//!
//! Every list resource (orders, reviews, addresses, notifications, products)
//! uses the same page/per-page query parameters and the same `has_more`
//! derivation, instead of each screen re-deriving it from local state.

use serde::{Deserialize, Serialize};

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_PER_PAGE: u64 = 20;
const MAX_PER_PAGE: u64 = 100;

/// Query parameters for paginated list endpoints. Pages are 1-indexed.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    DEFAULT_PAGE
}

fn default_per_page() -> u64 {
    DEFAULT_PER_PAGE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageParams {
    /// Clamps out-of-range values instead of erroring: page 0 becomes 1,
    /// per_page is capped.
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Zero-based page index for the database paginator.
    pub fn zero_based(self) -> u64 {
        self.page.saturating_sub(1)
    }
}

/// A page of results plus the metadata infinite-scroll clients need.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    /// Whether another page exists: `page * per_page < total`, derived from
    /// the authoritative total rather than the count accumulated so far.
    pub has_more: bool,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, page: PageParams) -> Self {
        let has_more = page
            .page
            .checked_mul(page.per_page)
            .map(|seen| seen < total)
            .unwrap_or(false);

        Self {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page: u64, per_page: u64) -> PageParams {
        PageParams { page, per_page }
    }

    #[test]
    fn has_more_when_total_exceeds_seen() {
        let p = Paginated::new(vec![0u8; 20], 45, page(1, 20));
        assert!(p.has_more);
    }

    #[test]
    fn no_more_on_exact_final_page() {
        // 40 items, 20 per page: page 2 covers items 21..=40 exactly.
        let p = Paginated::new(vec![0u8; 20], 40, page(2, 20));
        assert!(!p.has_more);
    }

    #[test]
    fn partial_final_page_has_no_more() {
        let p = Paginated::new(vec![0u8; 5], 45, page(3, 20));
        assert!(!p.has_more);
    }

    #[test]
    fn empty_result_has_no_more() {
        let p = Paginated::new(Vec::<u8>::new(), 0, page(1, 20));
        assert!(!p.has_more);
        assert_eq!(p.total, 0);
    }

    #[test]
    fn clamping_normalizes_page_and_per_page() {
        let p = page(0, 10_000).clamped();
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 100);
    }

    #[test]
    fn zero_based_never_underflows() {
        assert_eq!(page(0, 20).zero_based(), 0);
        assert_eq!(page(3, 20).zero_based(), 2);
    }

    #[test]
    fn default_params_from_empty_query() {
        let params: PageParams = serde_json::from_str("{}").expect("defaults apply");
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 20);
    }
}
