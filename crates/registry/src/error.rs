//! Registry Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A registry error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The catalog file could not be read or written.
    #[display("registry I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The catalog file exists but is not a valid registry document.
    #[display("invalid registry document: {}", _0.display())]
    InvalidDocument(#[error(not(source))] PathBuf),
    /// Application identifiers are exactly 16 ASCII alphanumeric characters.
    #[display("invalid application id: {_0:?}")]
    InvalidAppId(#[error(not(source))] String),
    #[display("invalid task name: {_0:?}")]
    InvalidTask(#[error(not(source))] String),
    #[display("invalid locale code: {_0:?}")]
    InvalidLocale(#[error(not(source))] String),
    #[display("unknown platform: {_0:?}")]
    UnknownPlatform(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
