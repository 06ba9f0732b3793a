//! Archive on the local filesystem, through `tokio::fs`.

use crate::error::ErrorKind;
use crate::{StorageBackend, error::Result, path::validate as validate_path};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const PARTIAL_SUFFIX: &str = ".partial";

/// Archive rooted at an absolute directory.
///
/// Writes go to a `.partial` sibling first and are renamed into place, so an
/// interrupted crawl never leaves a truncated file under its final name.
///
/// ```no_run
/// use spotpass_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("archive", "/srv/spotpass/archive")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Open (creating it if needed) an archive rooted at `root`, which must
    /// be absolute.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        // Blocking, but only once per process and before any crawling starts.
        std::fs::create_dir_all(&root).map_err(io_error(&root))?;
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(key)?))
    }

    async fn resolve_for_write(&self, key: &Path) -> Result<PathBuf> {
        let target = self.resolve(key)?;
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).await.map_err(io_error(key))?;
        }
        Ok(target)
    }
}

/// Maps an I/O error on `key` to the kind a caller can act on.
fn io_error(key: &Path) -> impl FnOnce(std::io::Error) -> ErrorKind + '_ {
    move |err| match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_path_buf()),
        _ => ErrorKind::Io(err),
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(OsString::from).unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let target = self.resolve(path)?;
        Ok(fs::try_exists(&target).await.map_err(io_error(path))?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        Ok(fs::read(&target).await.map_err(io_error(path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let target = self.resolve_for_write(path).await?;
        let partial = partial_path(&target);
        fs::write(&partial, data).await.map_err(io_error(path))?;
        fs::rename(&partial, &target).await.map_err(io_error(path))?;
        Ok(())
    }

    async fn append(&self, path: &Path, data: &[u8]) -> Result<()> {
        let target = self.resolve_for_write(path).await?;
        let mut file = OpenOptions::new().create(true).append(true).open(&target).await.map_err(io_error(path))?;
        file.write_all(data).await.map_err(ErrorKind::Io)?;
        // Ledger lines must be durable before their work item is marked processed.
        file.sync_data().await.map_err(ErrorKind::Io)?;
        Ok(())
    }
}
