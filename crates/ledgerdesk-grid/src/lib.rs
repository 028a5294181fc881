#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    dead_code,
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate, clippy::module_name_repetitions)]

//! Data-grid core shared by the ledgerdesk list screens.
//!
//! Layout:
//! - `client.rs`: authenticated JSON client over a pluggable transport
//! - `auth.rs` / `session.rs`: token storage and the one-shot session-invalid redirect
//! - `envelope.rs` / `paging.rs`: response normalization and page arithmetic
//! - `store.rs`: last-request-wins page store
//! - `filter.rs`, `selection.rs`, `present.rs`: local filtering, bulk actions, cell rendering
//! - `screen.rs`: the pieces above wired into one list screen

pub mod auth;
pub mod client;
pub mod config;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod liveness;
pub mod paging;
pub mod present;
pub mod screen;
pub mod selection;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use auth::{Credentials, FileTokenStore, MemoryTokenStore, TokenStore};
pub use client::{HttpRequest, HttpResponse, Method, ReqwestTransport, ResourceClient, Transport};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use entity::{DecodeEntity, Entity, EntityId, Record};
pub use envelope::{EnvelopeShape, NormalizedPage, normalize};
pub use error::{ConfigError, ErrorKind, RequestError, TokenStoreError, TransportError};
pub use filter::{DateRange, FilterSchema, FilterState, Predicate};
pub use liveness::Liveness;
pub use paging::{ApiPage, PageIndex, PageRequest, PageSize, ServerQuery};
pub use present::{ColumnSpec, Formatter, Presenter, TimestampStyle, format_duration};
pub use screen::{PresentedRow, Screen, ScreenView};
pub use selection::{
    BulkActionError, BulkActionRequest, BulkEndpoint, BulkOutcome, SelectionController,
};
pub use session::{Navigator, SessionGuard};
pub use store::{CollectionStore, LoadFailure, LoadOutcome, LoadState, Page};
