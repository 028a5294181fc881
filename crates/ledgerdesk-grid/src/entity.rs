//! Opaque entity records and dotted-path field lookup.
//!
//! # Design
//! - The server owns the record shape; the client only relies on an `id` field.
//! - Path lookups never panic: any missing or mistyped segment yields `None`.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Stable identifier of an entity, normalised to its textual form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Build an identifier from any string-like value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract an identifier from a JSON scalar. Blank strings, nulls, and
    /// composite values are not identifiers.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) if !text.trim().is_empty() => Some(Self(text.trim().to_string())),
            Value::Number(number) => Some(Self(number.to_string())),
            _ => None,
        }
    }

    /// JSON form used in bulk payloads. Integer ids round-trip as numbers.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self.0.parse::<i64>() {
            Ok(number) if number.to_string() == self.0 => Value::from(number),
            _ => Value::String(self.0.clone()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Anything the grid can list, filter, select, and present.
pub trait Entity {
    /// Stable identifier.
    fn id(&self) -> EntityId;

    /// Resolve a dotted field path (`employee.department.name`).
    fn field(&self, path: &str) -> Option<&Value>;

    /// String form of a field used by text search and plain columns.
    fn text(&self, path: &str) -> Option<String> {
        self.field(path).and_then(value_text)
    }
}

/// Conversion from a raw JSON item into a typed entity.
pub trait DecodeEntity: Sized {
    /// Decode one item; `None` drops it from the page.
    fn decode(value: Value) -> Option<Self>;
}

/// String representation of a JSON value; `null` has none.
#[must_use]
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Loose truthiness used by flag filters and boolean columns: `true`, non-zero
/// numbers, and `"1"`/`"true"`/`"yes"`/`"y"` strings.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Whole part of a non-negative finite float that fits in a `u64`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub(crate) fn whole_number(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0 && value < u64::MAX as f64).then(|| value.trunc() as u64)
}

/// Resolve a dotted path against a JSON value. Numeric segments index arrays.
/// Explicit `null` leaves are treated as absent.
#[must_use]
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut segments = split_path(path)?;
    let first = segments.next()?;
    let start = step(value, first)?;
    walk(start, segments)
}

fn lookup_in_map<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = split_path(path)?;
    let start = map.get(segments.next()?)?;
    walk(start, segments)
}

fn split_path(path: &str) -> Option<std::str::Split<'_, char>> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.split('.'))
    }
}

fn walk<'a, 'p>(
    start: &'a Value,
    mut segments: impl Iterator<Item = &'p str>,
) -> Option<&'a Value> {
    segments
        .try_fold(start, step)
        .filter(|resolved| !resolved.is_null())
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}

/// Opaque JSON entity as returned by the server.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    id: EntityId,
    fields: Map<String, Value>,
}

impl Record {
    /// Accept a JSON object carrying a scalar `id`; anything else is rejected.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };
        let id = fields.get("id").and_then(EntityId::from_value)?;
        Some(Self { id, fields })
    }

    /// Raw field map.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the record back into JSON.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl Entity for Record {
    fn id(&self) -> EntityId {
        self.id.clone()
    }

    fn field(&self, path: &str) -> Option<&Value> {
        lookup_in_map(&self.fields, path).filter(|value| !value.is_null())
    }
}

impl DecodeEntity for Record {
    fn decode(value: Value) -> Option<Self> {
        Self::from_value(value)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
