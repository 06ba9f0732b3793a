use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Archive and ledger failures. Any of them aborts the work item being
/// crawled; it stays unprocessed and is picked up again by the next run.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Key escapes the archive root or contains a NUL byte.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// A ledger entry could not be encoded.
    #[display("could not encode ledger entry")]
    LedgerEncoding,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Disk-level errors may clear up; bad keys and missing files will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
