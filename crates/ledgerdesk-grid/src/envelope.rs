//! Normalisation of the server's JSON envelopes.
//!
//! Every list endpoint answers with one of:
//! - a flat array: `[ {...}, {...} ]`
//! - a single-nested envelope:
//!   `{ "status": "success", "data": [...], "total": 40, "current_page": 2 }`
//! - a double-nested paginator: `{ "data": { "data": [...], "total": 40, "current_page": 2 } }`
//!
//! [`normalize`] is the one place that knows about these shapes. Missing metadata is left as
//! `None` for the caller to default; nothing here fails.

use serde_json::{Map, Value};

use crate::entity::{DecodeEntity, whole_number};
use crate::error::RequestError;
use crate::paging::ApiPage;

/// Which envelope shape a response matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeShape {
    /// Bare JSON array.
    Flat,
    /// `{data: [...]}`.
    SingleNested,
    /// `{data: {data: [...]}}`.
    DoubleNested,
    /// No list could be found; treated as an empty page.
    Unrecognized,
}

/// Items and pagination metadata extracted from an envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedPage {
    /// Raw list items in server order.
    pub items: Vec<Value>,
    /// Total row count, when reported.
    pub total: Option<usize>,
    /// Server-side current page, when reported.
    pub current_page: Option<ApiPage>,
    /// Matched shape.
    pub shape: EnvelopeShape,
}

impl NormalizedPage {
    fn empty(shape: EnvelopeShape) -> Self {
        Self {
            items: Vec::new(),
            total: None,
            current_page: None,
            shape,
        }
    }

    /// Decode items into entities, dropping the ones without a usable identity.
    #[must_use]
    pub fn decode<E: DecodeEntity>(self) -> Vec<E> {
        let received = self.items.len();
        let entities: Vec<E> = self.items.into_iter().filter_map(E::decode).collect();
        let dropped = received - entities.len();
        if dropped > 0 {
            tracing::warn!(dropped, received, "dropped list items without an id");
        }
        entities
    }
}

/// Extract the list and pagination metadata from any supported envelope.
#[must_use]
pub fn normalize(value: Value) -> NormalizedPage {
    match value {
        Value::Array(items) => NormalizedPage {
            items,
            ..NormalizedPage::empty(EnvelopeShape::Flat)
        },
        Value::Object(mut outer) => match outer.remove("data") {
            Some(Value::Object(mut inner)) if inner.get("data").is_some_and(Value::is_array) => {
                let items = match inner.remove("data") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                NormalizedPage {
                    items,
                    total: read_count(&inner, "total").or_else(|| read_count(&outer, "total")),
                    current_page: read_count(&inner, "current_page")
                        .or_else(|| read_count(&outer, "current_page"))
                        .map(ApiPage::new),
                    shape: EnvelopeShape::DoubleNested,
                }
            }
            Some(Value::Array(items)) => NormalizedPage {
                items,
                total: read_count(&outer, "total"),
                current_page: read_count(&outer, "current_page").map(ApiPage::new),
                shape: EnvelopeShape::SingleNested,
            },
            _ => NormalizedPage::empty(EnvelopeShape::Unrecognized),
        },
        _ => NormalizedPage::empty(EnvelopeShape::Unrecognized),
    }
}

/// Non-negative count from a JSON number or numeric string.
fn read_count(map: &Map<String, Value>, key: &str) -> Option<usize> {
    match map.get(key)? {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().and_then(whole_number))
            .and_then(|value| usize::try_from(value).ok()),
        Value::String(text) => text.trim().parse::<usize>().ok(),
        _ => None,
    }
}

/// Envelope-level status flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvelopeStatus {
    /// `status: "success"`.
    Success,
    /// `status: "error"`.
    Error,
    /// Any other reported status.
    Other(String),
    /// No status field (flat arrays, bare objects).
    Absent,
}

impl EnvelopeStatus {
    /// Read the status flag from a response body.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value.get("status") {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "success" => Self::Success,
                "error" => Self::Error,
                other => Self::Other(other.to_string()),
            },
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

/// Human-readable message carried by an envelope (`message` or `error`).
#[must_use]
pub fn envelope_message(value: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find_map(|field| field.as_str())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Fail when the envelope explicitly reports `status: "error"`.
///
/// # Errors
/// Returns [`RequestError::Rejected`] with the envelope message.
pub fn ensure_success(value: &Value) -> Result<(), RequestError> {
    if EnvelopeStatus::of(value) == EnvelopeStatus::Error {
        return Err(RequestError::Rejected {
            message: envelope_message(value).unwrap_or_else(|| "request was rejected".to_string()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, Record};
    use serde_json::json;

    #[test]
    fn flat_array_has_no_metadata() {
        let page = normalize(json!([{"id": 1}, {"id": 2}]));
        assert_eq!(page.shape, EnvelopeShape::Flat);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, None);
        assert_eq!(page.current_page, None);
    }

    #[test]
    fn single_nested_reads_outer_metadata() {
        let page = normalize(json!({
            "status": "success",
            "data": [{"id": 1}],
            "total": 31,
            "current_page": "4"
        }));
        assert_eq!(page.shape, EnvelopeShape::SingleNested);
        assert_eq!(page.total, Some(31));
        assert_eq!(page.current_page, Some(ApiPage::new(4)));
    }

    #[test]
    fn double_nested_is_preferred() {
        let page = normalize(json!({
            "status": "success",
            "total": 999,
            "data": {"data": [{"id": 1}, {"id": 2}], "total": "12", "current_page": 2}
        }));
        assert_eq!(page.shape, EnvelopeShape::DoubleNested);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, Some(12));
        assert_eq!(page.current_page, Some(ApiPage::new(2)));
    }

    #[test]
    fn double_nested_falls_back_to_outer_metadata() {
        let page = normalize(json!({
            "total": 3,
            "data": {"data": [{"id": 1}]}
        }));
        assert_eq!(page.total, Some(3));
    }

    #[test]
    fn float_counts_are_truncated() {
        let page = normalize(json!({"data": [], "total": 40.9, "current_page": -2.0}));
        assert_eq!(page.total, Some(40));
        assert_eq!(page.current_page, None);
    }

    #[test]
    fn missing_total_stays_unset() {
        let page = normalize(json!({"data": [{"id": "a"}, {"id": "b"}, {"id": "c"}]}));
        assert_eq!(page.total, None);
        assert_eq!(page.items.len(), 3);
    }

    #[test]
    fn unrecognised_shapes_become_empty_pages() {
        for value in [
            json!(null),
            json!("text"),
            json!({"status": "success"}),
            json!({"data": {"id": 1}}),
            json!({"data": "oops"}),
        ] {
            let page = normalize(value);
            assert_eq!(page.shape, EnvelopeShape::Unrecognized);
            assert!(page.items.is_empty());
        }
    }

    #[test]
    fn bad_counts_are_ignored() {
        let page = normalize(json!({"data": [], "total": -4, "current_page": "x"}));
        assert_eq!(page.total, None);
        assert_eq!(page.current_page, None);
        let page = normalize(json!({"data": [], "total": 7.9}));
        assert_eq!(page.total, Some(7));
    }

    #[test]
    fn decode_drops_items_without_ids() {
        let records: Vec<Record> =
            normalize(json!([{"id": 1}, {"name": "ghost"}, 5, {"id": "x"}])).decode();
        let ids: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec!["1", "x"]);
    }

    #[test]
    fn status_flags_are_classified() {
        assert_eq!(EnvelopeStatus::of(&json!({"status": "success"})), EnvelopeStatus::Success);
        assert_eq!(EnvelopeStatus::of(&json!({"status": "ERROR"})), EnvelopeStatus::Error);
        assert_eq!(
            EnvelopeStatus::of(&json!({"status": "partial"})),
            EnvelopeStatus::Other("partial".into())
        );
        assert_eq!(EnvelopeStatus::of(&json!([1])), EnvelopeStatus::Absent);
    }

    #[test]
    fn ensure_success_rejects_error_envelopes() {
        assert!(ensure_success(&json!({"status": "success"})).is_ok());
        assert!(ensure_success(&json!(null)).is_ok());
        let err = ensure_success(&json!({"status": "error", "message": "locked"}))
            .expect_err("error envelope");
        assert_eq!(
            err,
            RequestError::Rejected {
                message: "locked".into()
            }
        );
    }
}
