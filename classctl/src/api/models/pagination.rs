//! Shared pagination types for API query parameters.
//!
//! This module provides standardized pagination for all list endpoints.
//! All endpoints use offset-based pagination with `skip` and `limit` parameters.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: i64 = 10;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

/// Standard pagination parameters for list endpoints.
///
/// All list endpoints use consistent offset-based pagination with:
/// - `skip`: Number of items to skip (default: 0)
/// - `limit`: Maximum items to return (default: 10, max: 100)
///
/// The `limit` is clamped to ensure it's always between 1 and 100,
/// preventing both zero-result queries and excessive data fetching.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub skip: Option<i64>,

    /// Maximum number of items to return (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub limit: Option<i64>,
}

impl Pagination {
    /// Get the skip value, defaulting to 0 if not specified.
    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// Get the limit value, clamped between 1 and MAX_LIMIT.
    /// Defaults to DEFAULT_LIMIT if not specified.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Get both skip and limit as a tuple, useful for destructuring.
    #[inline]
    pub fn params(&self) -> (i64, i64) {
        (self.skip(), self.limit())
    }
}

/// Generic paginated response wrapper for list endpoints.
///
/// Wraps a list of items with pagination metadata including total count
/// for client-side pagination calculations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    /// The items for the current page
    pub data: Vec<T>,
    /// Total number of items matching the query (before pagination)
    pub total_count: i64,
    /// Number of items skipped
    pub skip: i64,
    /// Maximum items returned per page
    pub limit: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    /// Create a new paginated response
    pub fn new(data: Vec<T>, total_count: i64, skip: i64, limit: i64) -> Self {
        Self {
            data,
            total_count,
            skip,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        assert_eq!(Pagination::default().params(), (0, DEFAULT_LIMIT));

        let p = Pagination {
            skip: Some(-3),
            limit: Some(0),
        };
        assert_eq!(p.params(), (0, 1));

        let p = Pagination {
            skip: Some(40),
            limit: Some(1000),
        };
        assert_eq!(p.params(), (40, MAX_LIMIT));
    }

    #[test]
    fn test_query_string_values_parse() {
        let p: Pagination = serde_json::from_value(serde_json::json!({"skip": "20", "limit": "5"})).unwrap();
        assert_eq!(p.params(), (20, 5));
    }
}
