//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant means the same thing to a caller: the document is not a
/// manifest we understand, so its file list must be skipped.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The manifest body is not valid UTF-8.
    #[display("manifest is not valid UTF-8")]
    InvalidEncoding,
    /// The task sheet is not well-formed XML.
    #[display("malformed XML")]
    MalformedXml,
    /// The document parsed but is not the expected kind of manifest.
    #[display("unexpected document root: {_0}")]
    UnexpectedRoot(#[error(not(source))] String),
    /// A field every manifest of this kind carries is absent.
    #[display("missing required field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A manifest is either parseable or it isn't; fetching the same
        // bytes again changes nothing.
        false
    }
}
