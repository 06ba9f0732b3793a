//! Crawl Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Remote misses never show up here: an absent manifest, a wrong media type
//! or a file that no URL serves are ordinary outcomes reported through
//! [`Discovery`](crate::Discovery) and [`Crawled`](crate::Crawled). What
//! remains are failures of the local stores, which abort the operation.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A crawl error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for crawl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a crawl failure.
///
/// ### Dependency Errors
/// - [`ErrorKind::Registry`]
/// - [`ErrorKind::Queue`]
/// - [`ErrorKind::Storage`]
///
/// ### Operational Errors
/// - [`ErrorKind::Dump`]
/// - [`ErrorKind::Manifest`]
/// - [`ErrorKind::Item`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The registry could not be updated or persisted.
    #[display("registry update failed")]
    Registry,
    /// A work queue operation failed.
    #[display("work queue operation failed")]
    Queue,
    /// The archive or ledger could not be written.
    #[display("archive storage failed")]
    Storage,
    /// A dump file or directory could not be read.
    #[display("could not read dump: {}", _0.display())]
    Dump(#[error(not(source))] PathBuf),
    /// A manifest was served but could not be parsed.
    #[display("manifest could not be parsed")]
    Manifest,
    /// Crawling a single work item failed; the item stays unprocessed.
    #[display("work item {_0} failed")]
    Item(#[error(not(source))] i64),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A failed item is left unprocessed and is picked up again by the
        // next run.
        matches!(self, Self::Item(_))
    }
}
