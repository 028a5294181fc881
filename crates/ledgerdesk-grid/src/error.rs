//! Error types for the data-grid core.
//!
//! # Design
//! - Every network or decoding failure is converted into a [`RequestError`] at the client
//!   boundary so screens never see raw transport errors.
//! - [`ErrorKind`] is the coarse classification screens branch on.

use std::io;

use thiserror::Error;

/// Failure raised by a [`crate::client::Transport`] before any HTTP status is available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// The remote host could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),
    /// Any other transport-level failure.
    #[error("transport failure: {0}")]
    Other(String),
}

/// Typed result of a failed remote resource request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// No auth token was stored; the network was not contacted.
    #[error("not signed in")]
    Unauthenticated,
    /// The server rejected the stored token.
    #[error("session is no longer valid (status {status})")]
    SessionInvalid {
        /// Status code that signalled the invalid session.
        status: u16,
    },
    /// Non-success status that is not a session failure.
    #[error("request failed with status {status}: {message}")]
    Http {
        /// HTTP status code returned by the server.
        status: u16,
        /// Human-readable message extracted from the body.
        message: String,
    },
    /// The transport failed before a status was received.
    #[error("network failure: {0}")]
    Network(#[from] TransportError),
    /// The success body was not valid JSON.
    #[error("response body could not be decoded: {message}")]
    Decode {
        /// Decoder detail.
        message: String,
    },
    /// The envelope reported `status: "error"` on an otherwise successful response.
    #[error("server rejected the request: {message}")]
    Rejected {
        /// Message carried by the envelope.
        message: String,
    },
    /// The request path could not be joined onto the base URL.
    #[error("invalid request path `{path}`")]
    InvalidPath {
        /// Offending path.
        path: String,
    },
}

/// Coarse error taxonomy used by screens to pick a rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No token present at request time.
    Unauthenticated,
    /// Token rejected by the server.
    SessionInvalid,
    /// Transport failure or unclassified non-success response.
    NetworkOrServer,
}

impl RequestError {
    /// Classify the error into the screen-level taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::SessionInvalid { .. } => ErrorKind::SessionInvalid,
            Self::Http { .. }
            | Self::Network(_)
            | Self::Decode { .. }
            | Self::Rejected { .. }
            | Self::InvalidPath { .. } => ErrorKind::NetworkOrServer,
        }
    }

    /// HTTP status attached to the error, when one was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::SessionInvalid { status } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::NetworkOrServer)
    }
}

/// Failure while reading or writing persisted credentials.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// Filesystem operation failed.
    #[error("session store {operation} failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// Credentials could not be serialised.
    #[error("session store encoding failed")]
    Encode {
        /// Source serde error.
        source: serde_json::Error,
    },
}

/// Invalid client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Base URL failed to parse or is not http(s).
    #[error("invalid base URL `{value}`: {reason}")]
    InvalidBaseUrl {
        /// Raw value supplied.
        value: String,
        /// Parser or validation detail.
        reason: String,
    },
    /// Timeout of zero seconds.
    #[error("timeout must be greater than zero")]
    InvalidTimeout,
    /// Session-invalid status outside the 4xx/5xx range.
    #[error("session-invalid status {value} is not an error status")]
    InvalidSessionStatus {
        /// Offending status code.
        value: u16,
    },
    /// Login path did not start with `/`.
    #[error("login path `{value}` must be absolute")]
    InvalidLoginPath {
        /// Offending path.
        value: String,
    },
}
