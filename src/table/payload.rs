//! Response payload shapes
//!
//! Endpoints answer in one of two shapes:
//!
//! ```text
//! Paged: { "results": [...], "pagination": { "page", "start", "end", "last",
//!          "left": [...], "right": [...] }, "total_results": N }
//! Bare:  [ {...}, {...} ]
//! ```
//!
//! The configured [`ResponseMode`] decides which one is expected.

use crate::pagination::{total_pages, PaginationState};
use serde::Deserialize;
use serde_json::Value;

/// Which payload shape an instance expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Object with `results`, optional `pagination` and `total_results`
    #[default]
    Paged,
    /// Plain array of rows; paginated client-side
    Bare,
}

impl ResponseMode {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "bare" | "array" | "legacy" => Self::Bare,
            _ => Self::Paged,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paged => "paged",
            Self::Bare => "bare",
        }
    }
}

/// Pagination metadata as reported by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaginationMeta {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub start: u32,
    #[serde(default)]
    pub end: u32,
    #[serde(default)]
    pub last: u32,
    #[serde(default)]
    pub left: Vec<u32>,
    #[serde(default)]
    pub right: Vec<u32>,
}

/// A decoded payload ready for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub results: Vec<Value>,
    pub pagination: PaginationMeta,
    pub total_results: u64,
}

impl Page {
    /// The reported page is a positive integer
    pub fn has_current_page(&self) -> bool {
        self.pagination.page > 0
    }
}

/// Outcome of interpreting a raw payload
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Payload carries data (possibly zero rows)
    Page(Page),
    /// Payload is null, false, zero, an empty string or an empty object
    Empty,
    /// Payload does not match the expected shape
    Malformed(String),
}

/// JavaScript-style falsiness plus the empty object
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(_) => false,
    }
}

/// Interpret a raw payload for the given mode and current state
pub fn decode(value: &Value, mode: ResponseMode, state: &PaginationState) -> Decoded {
    if is_empty_payload(value) {
        return Decoded::Empty;
    }

    match mode {
        ResponseMode::Paged => decode_paged(value, state),
        ResponseMode::Bare => decode_bare(value, state),
    }
}

fn decode_paged(value: &Value, state: &PaginationState) -> Decoded {
    let Some(object) = value.as_object() else {
        return Decoded::Malformed("expected an object with a `results` array".to_string());
    };

    let results = match object.get("results") {
        Some(Value::Array(rows)) => rows.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Decoded::Malformed(format!(
                "`results` must be an array, got {}",
                type_name(other)
            ))
        }
    };

    let total_results = object
        .get("total_results")
        .and_then(Value::as_u64)
        .unwrap_or(results.len() as u64);

    let pagination = match object.get("pagination") {
        Some(Value::Null) | None => derived_meta(state.page, total_results, state.limit),
        Some(meta) => match PaginationMeta::deserialize(meta) {
            Ok(meta) => meta,
            Err(e) => return Decoded::Malformed(format!("invalid `pagination`: {}", e)),
        },
    };

    Decoded::Page(Page {
        results,
        pagination,
        total_results,
    })
}

fn decode_bare(value: &Value, state: &PaginationState) -> Decoded {
    let Some(rows) = value.as_array() else {
        return Decoded::Malformed(format!(
            "expected a bare array of rows, got {}",
            type_name(value)
        ));
    };

    let total_results = rows.len() as u64;
    let limit = state.limit.max(1) as usize;
    let last = total_pages(total_results, state.limit);
    let page = state.page.clamp(1, last.max(1));
    let skip = (page as usize - 1) * limit;

    Decoded::Page(Page {
        results: rows.iter().skip(skip).take(limit).cloned().collect(),
        pagination: derived_meta(page, total_results, state.limit),
        total_results,
    })
}

/// Interpret a payload whose every row is wanted, without paging
///
/// Accepts both a bare array and a `results` object; selects render all
/// options on a single page.
pub fn decode_all(value: &Value) -> Decoded {
    if is_empty_payload(value) {
        return Decoded::Empty;
    }

    let rows = match value {
        Value::Array(rows) => rows.clone(),
        Value::Object(object) => match object.get("results") {
            Some(Value::Array(rows)) => rows.clone(),
            _ => return Decoded::Malformed("expected a `results` array".to_string()),
        },
        other => {
            return Decoded::Malformed(format!(
                "expected rows, got {}",
                type_name(other)
            ))
        }
    };

    let total_results = rows.len() as u64;
    let limit = u32::try_from(total_results).unwrap_or(u32::MAX).max(1);

    Decoded::Page(Page {
        pagination: derived_meta(1, total_results, limit),
        results: rows,
        total_results,
    })
}

/// Metadata for responses that do not report their own pagination
fn derived_meta(page: u32, total: u64, limit: u32) -> PaginationMeta {
    let last = total_pages(total, limit);
    let page = if last == 0 { 0 } else { page.clamp(1, last) };

    PaginationMeta {
        page: i64::from(page),
        start: page.min(1),
        end: last,
        last,
        left: Vec::new(),
        right: Vec::new(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_payloads_are_empty() {
        for value in [json!(null), json!(false), json!(0), json!(""), json!({})] {
            assert_eq!(
                decode(&value, ResponseMode::Paged, &PaginationState::default()),
                Decoded::Empty,
                "{value}"
            );
        }
        // An empty array is data with zero rows, not an empty payload
        assert!(!is_empty_payload(&json!([])));
    }

    #[test]
    fn test_paged_payload() {
        let value = json!({
            "results": [{"id": 1}, {"id": 2}],
            "pagination": {"page": 2, "start": 1, "end": 5, "last": 9, "left": [1], "right": [3, 4]},
            "total_results": 42
        });

        let Decoded::Page(page) = decode(&value, ResponseMode::Paged, &PaginationState::default())
        else {
            panic!("expected a page");
        };
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.total_results, 42);
        assert_eq!(page.pagination.last, 9);
        assert_eq!(page.pagination.right, vec![3, 4]);
        assert!(page.has_current_page());
    }

    #[test]
    fn test_paged_without_pagination_derives_it() {
        let value = json!({"results": [{"id": 1}], "total_results": 60});
        let state = PaginationState {
            page: 2,
            limit: 25,
            ..Default::default()
        };

        let Decoded::Page(page) = decode(&value, ResponseMode::Paged, &state) else {
            panic!("expected a page");
        };
        assert_eq!(page.pagination.page, 2);
        assert_eq!(page.pagination.last, 3);
    }

    #[test]
    fn test_paged_with_zero_page_has_no_current_page() {
        let value = json!({"results": [], "pagination": {"page": 0, "last": 0}, "total_results": 0});
        let Decoded::Page(page) = decode(&value, ResponseMode::Paged, &PaginationState::default())
        else {
            panic!("expected a page");
        };
        assert!(!page.has_current_page());
    }

    #[test]
    fn test_paged_rejects_wrong_shapes() {
        let state = PaginationState::default();
        assert!(matches!(
            decode(&json!([1, 2]), ResponseMode::Paged, &state),
            Decoded::Malformed(_)
        ));
        assert!(matches!(
            decode(&json!({"results": "nope"}), ResponseMode::Paged, &state),
            Decoded::Malformed(_)
        ));
        assert!(matches!(
            decode(
                &json!({"results": [], "pagination": {"page": "x"}}),
                ResponseMode::Paged,
                &state
            ),
            Decoded::Malformed(_)
        ));
    }

    #[test]
    fn test_bare_payload_is_sliced_client_side() {
        let rows: Vec<Value> = (1..=7).map(|i| json!({"id": i})).collect();
        let state = PaginationState {
            page: 2,
            limit: 3,
            ..Default::default()
        };

        let Decoded::Page(page) = decode(&Value::Array(rows), ResponseMode::Bare, &state) else {
            panic!("expected a page");
        };
        assert_eq!(page.results, vec![json!({"id": 4}), json!({"id": 5}), json!({"id": 6})]);
        assert_eq!(page.total_results, 7);
        assert_eq!(page.pagination.last, 3);
        assert_eq!(page.pagination.page, 2);
    }

    #[test]
    fn test_bare_mode_rejects_objects() {
        assert!(matches!(
            decode(
                &json!({"results": []}),
                ResponseMode::Bare,
                &PaginationState::default()
            ),
            Decoded::Malformed(_)
        ));
    }

    #[test]
    fn test_decode_all_keeps_every_row() {
        let rows: Vec<Value> = (1..=40).map(|id| json!({"id": id})).collect();

        let Decoded::Page(page) = decode_all(&Value::Array(rows.clone())) else {
            panic!("expected a page");
        };
        assert_eq!(page.results.len(), 40);
        assert!(page.has_current_page());

        let Decoded::Page(page) = decode_all(&json!({"results": rows})) else {
            panic!("expected a page");
        };
        assert_eq!(page.total_results, 40);

        assert_eq!(decode_all(&json!({})), Decoded::Empty);
        assert!(matches!(decode_all(&json!("x")), Decoded::Malformed(_)));
    }
}
