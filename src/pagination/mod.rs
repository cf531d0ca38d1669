//! Pagination state shared by every bound instance
//!
//! `PaginationState` is the only mutable state a table carries between
//! refresh cycles. It is serialized twice: as the query string appended to
//! the fetch URL, and as JSON for pagination history persistence.

pub mod window;

pub use window::{compute_window, PageButton, PageWindow, PaginationControl, WindowSettings};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction for the `order` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// The opposite direction
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    /// Parse from config text; unknown values fall back to `desc`
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current page, page size, sort and filter for one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    /// 1-based page number
    pub page: u32,
    /// Items per page
    pub limit: u32,
    pub order: SortOrder,
    pub order_by: String,
    /// Free-text filter, empty when not searching
    #[serde(default)]
    pub like: String,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 25,
            order: SortOrder::Desc,
            order_by: "id".to_string(),
            like: String::new(),
        }
    }
}

impl PaginationState {
    /// Restore the `page >= 1` and `limit >= 1` invariants
    ///
    /// Persisted or user-supplied state may carry zeroes; those are bumped
    /// to 1 rather than rejected.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.max(1);
        self
    }

    /// Set the current page, keeping `page >= 1`
    pub fn go_to(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Encode as `page=..&limit=..&order=..&order_by=..&like=..`
    ///
    /// Field order is stable so identical state always yields an identical
    /// request URL.
    pub fn to_query(&self) -> String {
        let pairs = [
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("order", self.order.as_str().to_string()),
            ("order_by", self.order_by.clone()),
            ("like", self.like.clone()),
        ];

        pairs
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Copy suitable for persistence: the search filter never survives a reload
    pub fn for_history(&self) -> Self {
        Self {
            like: String::new(),
            ..self.clone()
        }
    }

    /// First row number shown on the current page (1-based)
    pub fn first_row_number(&self) -> u64 {
        (u64::from(self.page.max(1)) - 1) * u64::from(self.limit) + 1
    }
}

/// Number of pages needed for `total` items at `limit` per page
pub fn total_pages(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(limit));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = PaginationState::default();
        assert_eq!(state.page, 1);
        assert_eq!(state.limit, 25);
        assert_eq!(state.order, SortOrder::Desc);
        assert_eq!(state.order_by, "id");
        assert!(state.like.is_empty());
    }

    #[test]
    fn test_query_encoding_escapes_filter() {
        let state = PaginationState {
            page: 3,
            limit: 10,
            order: SortOrder::Asc,
            order_by: "created_at".to_string(),
            like: "a&b c".to_string(),
        };

        assert_eq!(
            state.to_query(),
            "page=3&limit=10&order=asc&order_by=created_at&like=a%26b%20c"
        );
    }

    #[test]
    fn test_history_copy_drops_filter() {
        let state = PaginationState {
            like: "abc".to_string(),
            page: 4,
            ..Default::default()
        };

        let stored = state.for_history();
        assert_eq!(stored.like, "");
        assert_eq!(stored.page, 4);
    }

    #[test]
    fn test_normalized_bumps_zeroes() {
        let state = PaginationState {
            page: 0,
            limit: 0,
            ..Default::default()
        }
        .normalized();

        assert_eq!(state.page, 1);
        assert_eq!(state.limit, 1);
    }

    #[test]
    fn test_json_shape_matches_history_format() {
        let json = serde_json::to_string(&PaginationState::default()).unwrap();
        assert_eq!(
            json,
            r#"{"page":1,"limit":25,"order":"desc","order_by":"id","like":""}"#
        );

        // Older history entries may omit `like`
        let parsed: PaginationState =
            serde_json::from_str(r#"{"page":2,"limit":5,"order":"asc","order_by":"name"}"#)
                .unwrap();
        assert_eq!(parsed.page, 2);
        assert_eq!(parsed.order, SortOrder::Asc);
        assert!(parsed.like.is_empty());
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 25), 0);
        assert_eq!(total_pages(25, 25), 1);
        assert_eq!(total_pages(26, 25), 2);
        assert_eq!(total_pages(10, 0), 0);
    }

    #[test]
    fn test_first_row_number() {
        let state = PaginationState {
            page: 3,
            limit: 25,
            ..Default::default()
        };
        assert_eq!(state.first_row_number(), 51);
    }

    #[test]
    fn test_sort_order_toggles() {
        assert_eq!(SortOrder::Desc.toggled(), SortOrder::Asc);
        assert_eq!(SortOrder::Asc.toggled(), SortOrder::Desc);
        assert_eq!(SortOrder::from_str("ASC"), SortOrder::Asc);
        assert_eq!(SortOrder::from_str("bogus"), SortOrder::Desc);
    }
}
