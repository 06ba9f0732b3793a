//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the interface every
//! archive write goes through. Manifest and content file names come from
//! remote servers, so every implementation validates paths before use.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Where the crawler puts manifests, content files and the ledger.
///
/// Keys are relative to the backend root and pass through
/// [`validate_path`](crate::validate_path) inside every method, so callers
/// can hand over keys built from remote input.
///
/// ```no_run
/// use std::path::Path;
/// # use spotpass_storage::{backend::StorageBackend, error::Result};
/// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
/// let key = Path::new("2026-10-18/US/en/1122334455667788/news/tasksheet.xml");
/// backend.write(key, b"<TaskSheet/>").await?;
/// assert!(backend.exists(key).await?);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Shown in logs.
    fn name(&self) -> &str;

    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Fails with [`NotFound`](crate::error::ErrorKind::NotFound) for a
    /// missing key.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Store `data` under `path`, replacing whatever was there. Readers see
    /// either the old or the new contents, never a partial write.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Append `data` to `path`, creating it if needed. Each call lands as a
    /// unit, but concurrent appends to one key must be serialised by the
    /// caller.
    async fn append(&self, path: &Path, data: &[u8]) -> Result<()>;
}
