//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u32,
    /// Total number of pages.
    pub total_pages: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    /// Clamps `per_page` to the allowed maximum of 100.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }

    /// Cuts one page out of `items` and describes where it sits.
    #[must_use]
    pub fn paginate<T>(&self, items: Vec<T>) -> (Vec<T>, PaginationMeta) {
        let params = self.clamped();
        let total = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let total_pages = total.div_ceil(params.per_page);
        let start = usize::try_from(
            params
                .page
                .saturating_sub(1)
                .saturating_mul(params.per_page),
        )
        .unwrap_or(usize::MAX);

        let page = items
            .into_iter()
            .skip(start)
            .take(params.per_page as usize)
            .collect();
        let meta = PaginationMeta {
            page: params.page,
            per_page: params.per_page,
            total,
            total_pages,
        };
        (page, meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        let params = PaginationParams {
            page: 0,
            per_page: 500,
        }
        .clamped();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
    }

    #[test]
    fn paginate_returns_requested_slice() {
        let params = PaginationParams {
            page: 2,
            per_page: 3,
        };
        let (page, meta) = params.paginate((1..=7).collect::<Vec<_>>());
        assert_eq!(page, vec![4, 5, 6]);
        assert_eq!(meta.total, 7);
        assert_eq!(meta.total_pages, 3);
    }

    #[test]
    fn paginate_past_the_end_is_empty() {
        let params = PaginationParams {
            page: 9,
            per_page: 20,
        };
        let (page, meta) = params.paginate(vec!["a"]);
        assert!(page.is_empty());
        assert_eq!(meta.total_pages, 1);
    }
}
