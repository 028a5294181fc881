//! Command handlers grouped by concern.

pub(crate) mod bulk;
pub(crate) mod list;
pub(crate) mod session;
