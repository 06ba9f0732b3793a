//! Client Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only setting the client up can fail. Once built, remote failures are
//! reported as values ([`Fetch`](crate::Fetch), `bool`, `Option`), because
//! nothing a single server response does should abort a run.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A client error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The client certificate or key could not be read or parsed.
    #[display("invalid client identity: {}", _0.display())]
    Identity(#[error(not(source))] PathBuf),
    /// The HTTP client could not be constructed.
    #[display("could not build HTTP client")]
    Build,
    /// An endpoint is not an absolute http(s) URL that paths can be appended to.
    #[display("invalid endpoint URL: {_0}")]
    InvalidUrl(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Every variant needs a configuration change first.
        false
    }
}
