//! Derived display values for table columns.
//!
//! # Design
//! - Presentation reads entities, never mutates them.
//! - Missing paths render the placeholder; durations render `0h 0m` instead.

use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::entity::{Entity, is_truthy, value_text, whole_number};

/// Placeholder for absent values.
pub const DEFAULT_PLACEHOLDER: &str = "—";
/// Format used for absolute timestamps when none is given.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// How timestamps are rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimestampStyle {
    /// `just now`, `5m ago`, `3h ago`, `2d ago`.
    Relative,
    /// `strftime`-style format string.
    Absolute(String),
}

/// Column value transform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Formatter {
    /// String form of the value.
    Text,
    /// Seconds rendered as `{h}h {m}m`.
    Duration,
    /// Timestamp rendering.
    Timestamp(TimestampStyle),
    /// Truthiness rendered with custom labels.
    Boolean {
        /// Label for truthy values.
        yes: String,
        /// Label for falsy values.
        no: String,
    },
}

/// Declarative column definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Stable column key.
    pub key: String,
    /// Header text.
    pub header: String,
    /// Primary field path.
    pub path: String,
    /// Paths tried in order when the primary one is absent.
    pub fallback_paths: Vec<String>,
    /// Value transform.
    pub formatter: Formatter,
    /// Per-column placeholder overriding the presenter default.
    pub placeholder: Option<String>,
}

impl ColumnSpec {
    /// Plain text column.
    #[must_use]
    pub fn new(key: impl Into<String>, header: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
            path: path.into(),
            fallback_paths: Vec::new(),
            formatter: Formatter::Text,
            placeholder: None,
        }
    }

    /// Replace the formatter.
    #[must_use]
    pub fn format(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Add a fallback path.
    #[must_use]
    pub fn or(mut self, path: impl Into<String>) -> Self {
        self.fallback_paths.push(path.into());
        self
    }

    /// Override the placeholder for this column.
    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }
}

/// Renders column values for rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Presenter {
    placeholder: String,
    now: Option<NaiveDateTime>,
}

impl Default for Presenter {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            now: None,
        }
    }
}

impl Presenter {
    /// Presenter with the default placeholder and the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the placeholder.
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Pin "now" for relative timestamps.
    #[must_use]
    pub const fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    /// Display value of one column for one entity. Never fails.
    #[must_use]
    pub fn present<E: Entity>(&self, entity: &E, column: &ColumnSpec) -> String {
        let value = std::iter::once(&column.path)
            .chain(column.fallback_paths.iter())
            .find_map(|path| entity.field(path));
        if column.formatter == Formatter::Duration {
            return value.map_or_else(|| format_duration(None), format_duration_value);
        }
        let placeholder = column.placeholder.as_deref().unwrap_or(&self.placeholder);
        let Some(value) = value else {
            return placeholder.to_string();
        };
        let rendered = match &column.formatter {
            Formatter::Text | Formatter::Duration => value_text(value),
            Formatter::Timestamp(style) => Some(self.format_timestamp(value, style)),
            Formatter::Boolean { yes, no } => Some(if is_truthy(value) { yes } else { no }.clone()),
        };
        rendered
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| placeholder.to_string())
    }

    /// Display values for every column, in column order.
    #[must_use]
    pub fn present_row<E: Entity>(&self, entity: &E, columns: &[ColumnSpec]) -> Vec<String> {
        columns
            .iter()
            .map(|column| self.present(entity, column))
            .collect()
    }

    fn now(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(|| Utc::now().naive_utc())
    }

    fn format_timestamp(&self, value: &Value, style: &TimestampStyle) -> String {
        let Some(stamp) = parse_timestamp(value) else {
            return value_text(value).unwrap_or_default();
        };
        match style {
            TimestampStyle::Relative => {
                format_relative(stamp, self.now())
                    .unwrap_or_else(|| format_absolute(stamp, DEFAULT_TIMESTAMP_FORMAT))
            }
            TimestampStyle::Absolute(format) => format_absolute(stamp, format),
        }
    }
}

/// `{hours}h {minutes}m` from a count of seconds; leftover seconds are dropped.
#[must_use]
pub fn format_duration(seconds: Option<u64>) -> String {
    let seconds = seconds.unwrap_or(0);
    format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
}

/// [`format_duration`] for a JSON value: integers, floats (truncated), and
/// numeric strings. Negative or non-numeric input counts as zero.
#[must_use]
pub fn format_duration_value(value: &Value) -> String {
    format_duration(seconds_of(value))
}

fn seconds_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().and_then(whole_number)),
        Value::String(text) => text.trim().parse::<f64>().ok().and_then(whole_number),
        _ => None,
    }
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, or unix seconds.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
                return Some(stamp.naive_utc());
            }
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|day| day.and_hms_opt(0, 0, 0))
                })
        }
        Value::Number(number) => number
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|stamp| stamp.naive_utc()),
        _ => None,
    }
}

fn format_relative(stamp: NaiveDateTime, now: NaiveDateTime) -> Option<String> {
    let elapsed = now.signed_duration_since(stamp);
    if elapsed.num_seconds() < 0 {
        return None;
    }
    let text = if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_days() < 1 {
        format!("{}h ago", elapsed.num_hours())
    } else {
        format!("{}d ago", elapsed.num_days())
    };
    Some(text)
}

fn format_absolute(stamp: NaiveDateTime, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", stamp.format(format)).is_err() {
        out.clear();
        let _ = write!(out, "{}", stamp.format(DEFAULT_TIMESTAMP_FORMAT));
    }
    out
}
