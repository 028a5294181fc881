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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (payloads and client harness), mocks.rs (fake transports and navigators).

pub mod fixtures;
pub mod mocks;
