//! Page numbering and request parameters.
//!
//! # Design
//! - Screens count pages from zero ([`PageIndex`]); the API counts from one ([`ApiPage`]).
//! - [`PageIndex::to_api`] and [`ApiPage::to_index`] are the only conversions between the two,
//!   so a raw UI index can never reach the network layer.

use std::collections::BTreeMap;

/// Query parameter carrying the one-based page number.
pub const PAGE_PARAM: &str = "page";
/// Query parameter carrying the page size.
pub const PER_PAGE_PARAM: &str = "per_page";
/// Page size used when a screen does not pick one.
pub const DEFAULT_PAGE_SIZE: usize = 10;
/// Upper bound accepted for a single page.
pub const MAX_PAGE_SIZE: usize = 500;

/// Zero-based page position as tracked by a screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(usize);

impl PageIndex {
    /// The first page.
    pub const FIRST: Self = Self(0);

    /// Wrap a zero-based index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Raw zero-based value.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// One-based page number sent to the server.
    #[must_use]
    pub const fn to_api(self) -> ApiPage {
        ApiPage(self.0.saturating_add(1))
    }
}

/// One-based page number as understood by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiPage(usize);

impl ApiPage {
    /// Wrap a server page number.
    #[must_use]
    pub const fn new(page: usize) -> Self {
        Self(page)
    }

    /// Raw one-based value.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Zero-based index for the screen. A server reporting page `0` maps to the first page.
    #[must_use]
    pub const fn to_index(self) -> PageIndex {
        PageIndex(self.0.saturating_sub(1))
    }
}

/// Number of rows requested per page, clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageSize(usize);

impl PageSize {
    /// Clamp a requested size into the supported range.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self(size.clamp(1, MAX_PAGE_SIZE))
    }

    /// Raw size.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(DEFAULT_PAGE_SIZE)
    }
}

/// Server-side filter parameters forwarded verbatim as query pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerQuery(BTreeMap<String, String>);

impl ServerQuery {
    /// Empty query.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Set a parameter. Blank values remove it; pagination keys are refused.
    /// Returns whether the query changed.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let value = value.into();
        let key = key.trim();
        if key.is_empty() || key == PAGE_PARAM || key == PER_PAGE_PARAM {
            return false;
        }
        let value = value.trim();
        if value.is_empty() {
            return self.0.remove(key).is_some();
        }
        self.0.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
    }

    /// Remove a parameter.
    pub fn remove(&mut self, key: &str) -> bool {
        self.0.remove(key).is_some()
    }

    /// Look up a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether no server-side filters are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Everything needed to fetch one page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page index.
    pub index: PageIndex,
    /// Rows per page.
    pub size: PageSize,
    /// Server-side filters.
    pub query: ServerQuery,
}

impl PageRequest {
    /// Request for the given page with no server filters.
    #[must_use]
    pub fn new(index: PageIndex, size: PageSize) -> Self {
        Self {
            index,
            size,
            query: ServerQuery::new(),
        }
    }

    /// Query pairs in wire order: page, page size, then server filters.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            (PAGE_PARAM.to_string(), self.index.to_api().get().to_string()),
            (PER_PAGE_PARAM.to_string(), self.size.get().to_string()),
        ];
        pairs.extend(
            self.query
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );
        pairs
    }
}

/// Number of pages needed for `total` rows; never zero.
#[must_use]
pub fn page_count(total: usize, size: PageSize) -> usize {
    total.div_ceil(size.get()).max(1)
}

/// Clamp an index to the last page that exists for `total` rows.
#[must_use]
pub fn clamp_index(index: PageIndex, total: usize, size: PageSize) -> PageIndex {
    PageIndex(index.get().min(page_count(total, size) - 1))
}
