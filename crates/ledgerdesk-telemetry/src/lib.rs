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

//! Telemetry primitives shared across the ledgerdesk workspace.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

pub mod init;

pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, ParseLogFormatError, build_sha, command_span,
    init_logging,
};
