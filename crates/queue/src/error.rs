use derive_more::{Display, Error};
use std::path::PathBuf;

/// A queue error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for queue operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Queue errors abort the run: without the store there is no way to know
/// what has already been crawled.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not open the queue database at {}", _0.display())]
    Open(#[error(not(source))] PathBuf),
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    #[display("work item not found: {_0}")]
    WorkItemNotFound(#[error(not(source))] i64),
    /// A stored value could not be turned back into its model.
    #[display("invalid queue data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
