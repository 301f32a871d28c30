pub mod health;
pub use self::health::health;

pub(crate) mod auth;
pub(crate) mod categories;
pub(crate) mod comments;
pub(crate) mod posts;
pub(crate) mod tags;
pub(crate) mod users;

// common types for the handlers
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Composed audit value embedded in entity responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const DEFAULT_PER_PAGE: i64 = 10;
const MAX_PER_PAGE: i64 = 100;

/// Pagination query parameters, 1-based.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageParams {
    /// Clamped (page, per_page, limit, offset) for SQL paging.
    #[must_use]
    pub fn resolve(&self) -> (i64, i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        (page, per_page, per_page, (page - 1) * per_page)
    }
}

/// One page of results with paging metadata.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, params: &PageParams, total: i64) -> Self {
        let (page, per_page, _, _) = params.resolve();
        Self {
            items,
            page,
            per_page,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_params_default_to_first_page() {
        let params = PageParams::default();
        assert_eq!(params.resolve(), (1, 10, 10, 0));
    }

    #[test]
    fn page_params_compute_offset() {
        let params = PageParams {
            page: Some(3),
            per_page: Some(20),
        };
        assert_eq!(params.resolve(), (3, 20, 20, 40));
    }

    #[test]
    fn page_params_clamp_out_of_range_values() {
        let params = PageParams {
            page: Some(0),
            per_page: Some(10_000),
        };
        assert_eq!(params.resolve(), (1, MAX_PER_PAGE, MAX_PER_PAGE, 0));

        let params = PageParams {
            page: Some(-5),
            per_page: Some(0),
        };
        assert_eq!(params.resolve(), (1, 1, 1, 0));
    }
}
