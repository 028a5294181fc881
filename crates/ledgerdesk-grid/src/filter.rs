//! Client-side search and filter predicates.
//!
//! # Design
//! - Filtering is a pure function of the page, the screen's [`FilterSchema`], and the
//!   user's [`FilterState`]; it never touches the network.
//! - Every predicate is ANDed. A default [`FilterState`] passes every row.
//! - Results keep the source order, so applying the same state twice is a no-op.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use crate::entity::{Entity, is_truthy, value_text};
use crate::present::parse_timestamp;

/// Boolean test applied by a named flag filter.
pub enum Predicate<E> {
    /// Field equals the value (textual, case-insensitive comparison).
    Equals {
        /// Field path.
        path: String,
        /// Expected value.
        value: Value,
    },
    /// Field is truthy (`true`, non-zero, `"yes"`, `"1"`, `"true"`).
    Truthy {
        /// Field path.
        path: String,
    },
    /// Arbitrary predicate for typed entities.
    Custom(Arc<dyn Fn(&E) -> bool + Send + Sync>),
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Equals { path, value } => Self::Equals {
                path: path.clone(),
                value: value.clone(),
            },
            Self::Truthy { path } => Self::Truthy { path: path.clone() },
            Self::Custom(test) => Self::Custom(Arc::clone(test)),
        }
    }
}

impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { path, value } => f
                .debug_struct("Equals")
                .field("path", path)
                .field("value", value)
                .finish(),
            Self::Truthy { path } => f.debug_struct("Truthy").field("path", path).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<E: Entity> Predicate<E> {
    fn test(&self, entity: &E) -> bool {
        match self {
            Self::Equals { path, value } => match (entity.text(path), value_text(value)) {
                (Some(actual), Some(expected)) => actual.eq_ignore_ascii_case(&expected),
                _ => false,
            },
            Self::Truthy { path } => entity.field(path).is_some_and(is_truthy),
            Self::Custom(test) => test(entity),
        }
    }
}

/// A named categorical toggle such as "only late" or "only converted".
#[derive(Clone, Debug)]
pub struct FlagFilter<E> {
    /// Key used in [`FilterState::flags`].
    pub name: String,
    /// Display label.
    pub label: String,
    /// Row test.
    pub predicate: Predicate<E>,
}

/// What a screen can filter on.
#[derive(Clone, Debug)]
pub struct FilterSchema<E> {
    search_fields: Vec<String>,
    categories: Vec<String>,
    flags: Vec<FlagFilter<E>>,
    date_field: Option<String>,
}

impl<E> Default for FilterSchema<E> {
    fn default() -> Self {
        Self {
            search_fields: Vec::new(),
            categories: Vec::new(),
            flags: Vec::new(),
            date_field: None,
        }
    }
}

impl<E> FilterSchema<E> {
    /// Schema with no filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields searched by the free-text query.
    #[must_use]
    pub fn search<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Field usable as an enum-valued category filter.
    #[must_use]
    pub fn category(mut self, path: impl Into<String>) -> Self {
        self.categories.push(path.into());
        self
    }

    /// Named boolean toggle.
    #[must_use]
    pub fn flag(
        mut self,
        name: impl Into<String>,
        label: impl Into<String>,
        predicate: Predicate<E>,
    ) -> Self {
        self.flags.push(FlagFilter {
            name: name.into(),
            label: label.into(),
            predicate,
        });
        self
    }

    /// Timestamp field tested by date ranges.
    #[must_use]
    pub fn date_field(mut self, path: impl Into<String>) -> Self {
        self.date_field = Some(path.into());
        self
    }

    /// Configured search fields.
    #[must_use]
    pub fn search_fields(&self) -> &[String] {
        &self.search_fields
    }

    /// Configured category fields.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Configured flags.
    #[must_use]
    pub fn flags(&self) -> &[FlagFilter<E>] {
        &self.flags
    }

    /// Configured date field.
    #[must_use]
    pub fn date_field_path(&self) -> Option<&str> {
        self.date_field.as_deref()
    }

    /// Whether `path` was declared as a category field.
    #[must_use]
    pub fn has_category(&self, path: &str) -> bool {
        self.categories.iter().any(|declared| declared == path)
    }

    /// Look up a flag by name.
    #[must_use]
    pub fn find_flag(&self, name: &str) -> Option<&FlagFilter<E>> {
        self.flags.iter().find(|flag| flag.name == name)
    }
}

/// Inclusive date bounds; an open end is unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First accepted day.
    pub from: Option<NaiveDate>,
    /// Last accepted day.
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Whether neither bound is set.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Whether `day` lies inside the bounds.
    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from.is_none_or(|from| day >= from) && self.to.is_none_or(|to| day <= to)
    }
}

/// The user's current filter selections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Free-text query.
    pub query: String,
    /// Category field → accepted values.
    pub categories: BTreeMap<String, BTreeSet<String>>,
    /// Active flag names.
    pub flags: BTreeSet<String>,
    /// Date bounds on the schema's date field.
    pub date_range: DateRange,
}

impl FilterState {
    /// Whether this state filters nothing.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.query.trim().is_empty()
            && self.categories.values().all(BTreeSet::is_empty)
            && self.flags.is_empty()
            && self.date_range.is_open()
    }

    /// Accept `value` for category `path`.
    pub fn accept(&mut self, path: impl Into<String>, value: impl Into<String>) {
        self.categories
            .entry(path.into())
            .or_default()
            .insert(value.into());
    }
}

/// Whether one entity passes every active predicate.
#[must_use]
pub fn matches<E: Entity>(entity: &E, schema: &FilterSchema<E>, state: &FilterState) -> bool {
    matches_query(entity, schema, &state.query)
        && matches_categories(entity, schema, &state.categories)
        && matches_flags(entity, schema, &state.flags)
        && matches_dates(entity, schema, &state.date_range)
}

/// Visible subset of `entities`, in source order.
#[must_use]
pub fn apply<'a, E: Entity>(
    entities: &'a [E],
    schema: &FilterSchema<E>,
    state: &FilterState,
) -> Vec<&'a E> {
    entities
        .iter()
        .filter(|entity| matches(*entity, schema, state))
        .collect()
}

/// Owned variant of [`apply`].
#[must_use]
pub fn apply_owned<E: Entity>(
    entities: Vec<E>,
    schema: &FilterSchema<E>,
    state: &FilterState,
) -> Vec<E> {
    entities
        .into_iter()
        .filter(|entity| matches(entity, schema, state))
        .collect()
}

fn matches_query<E: Entity>(entity: &E, schema: &FilterSchema<E>, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || schema.search_fields.is_empty() {
        return true;
    }
    schema
        .search_fields
        .iter()
        .filter_map(|path| entity.text(path))
        .any(|haystack| haystack.to_lowercase().contains(&needle))
}

fn matches_categories<E: Entity>(
    entity: &E,
    schema: &FilterSchema<E>,
    categories: &BTreeMap<String, BTreeSet<String>>,
) -> bool {
    categories
        .iter()
        .filter(|(_, accepted)| !accepted.is_empty())
        .filter(|(path, _)| {
            let declared = schema.has_category(path);
            if !declared {
                tracing::debug!(category = %path, "ignoring undeclared category");
            }
            declared
        })
        .all(|(path, accepted)| {
            entity.text(path).is_some_and(|actual| {
                accepted
                    .iter()
                    .any(|value| value.eq_ignore_ascii_case(actual.trim()))
            })
        })
}

fn matches_flags<E: Entity>(
    entity: &E,
    schema: &FilterSchema<E>,
    flags: &BTreeSet<String>,
) -> bool {
    flags.iter().all(|name| match schema.find_flag(name) {
        Some(flag) => flag.predicate.test(entity),
        None => {
            tracing::debug!(flag = %name, "ignoring unknown filter flag");
            true
        }
    })
}

fn matches_dates<E: Entity>(entity: &E, schema: &FilterSchema<E>, range: &DateRange) -> bool {
    if range.is_open() {
        return true;
    }
    let Some(path) = schema.date_field.as_deref() else {
        return true;
    };
    entity
        .field(path)
        .and_then(parse_timestamp)
        .is_some_and(|stamp| range.contains(stamp.date()))
}
