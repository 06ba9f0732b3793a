//! In-memory archive for tests.

use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Archive held in a sorted map, keyed by validated path.
///
/// ```
/// use spotpass_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("ledger.jsonl", b"{}\n")]);
/// assert!(backend.exists(Path::new("./ledger.jsonl")).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockBackend {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MockBackend {
    /// Pre-populated archive. Panics on an invalid key: broken test setup
    /// should not get as far as an assertion.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let files = files
            .into_iter()
            .map(|(key, data)| {
                let key = key.into();
                match validate_path(&key) {
                    Ok(valid) => (valid, data.into()),
                    Err(_) => panic!("MockBackend::with_files: invalid path {}", key.display()),
                }
            })
            .collect();
        Self { files: RwLock::new(files) }
    }

    /// Every stored key, in order.
    pub async fn paths(&self) -> Vec<PathBuf> {
        self.files.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let key = validate_path(path)?;
        Ok(self.files.read().await.contains_key(&key))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let key = validate_path(path)?;
        match self.files.read().await.get(&key) {
            Some(data) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::NotFound(key)),
        }
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let key = validate_path(path)?;
        self.files.write().await.insert(key, data.to_vec());
        Ok(())
    }

    async fn append(&self, path: &Path, data: &[u8]) -> Result<()> {
        let key = validate_path(path)?;
        self.files.write().await.entry(key).or_default().extend_from_slice(data);
        Ok(())
    }
}
