//! Append-only record of every content file the crawler has fetched.
//!
//! The ledger is a JSON-lines file. Entries are never rewritten or removed;
//! on open, the existing lines are read back so that re-running a crawl over
//! already-recorded content does not produce duplicate lines.

use exn::ResultExt;
use serde::{Deserialize, Serialize};
use spotpass_registry::Platform;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::BackendHandle;
use crate::error::{ErrorKind, Result};

/// One successfully fetched content file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub platform: Platform,
    pub app_id: String,
    pub task: String,
    pub filename: String,
    pub country: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_id: Option<String>,
    /// BLAKE3 hash of the body, hex encoded.
    pub hash: String,
    pub size: u64,
    /// Name of the crawl run the file was archived under.
    pub run: String,
    /// Unix timestamp (seconds).
    pub fetched_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    platform: Platform,
    app_id: String,
    task: String,
    filename: String,
    country: String,
    language: String,
    hash: String,
}
impl From<&LedgerEntry> for EntryKey {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            platform: entry.platform,
            app_id: entry.app_id.clone(),
            task: entry.task.clone(),
            filename: entry.filename.clone(),
            country: entry.country.clone(),
            language: entry.language.clone(),
            hash: entry.hash.clone(),
        }
    }
}

/// Single-writer handle to the ledger file.
pub struct Ledger {
    backend: BackendHandle,
    path: PathBuf,
    recorded: Mutex<HashSet<EntryKey>>,
}

impl Ledger {
    /// Open the ledger at `path` inside `backend`, loading the keys of every
    /// entry already written.
    ///
    /// A line that does not parse (most likely the tail of an interrupted
    /// append) is logged and ignored.
    #[instrument(skip(backend), fields(backend = backend.name()))]
    pub async fn open(backend: BackendHandle, path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut recorded = HashSet::new();
        if backend.exists(&path).await? {
            let data = backend.read(&path).await?;
            for (number, line) in data.split(|b| *b == b'\n').enumerate() {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match serde_json::from_slice::<LedgerEntry>(line) {
                    Ok(entry) => {
                        recorded.insert(EntryKey::from(&entry));
                    },
                    Err(error) => tracing::warn!(line = number + 1, %error, "Ignoring unreadable ledger line"),
                }
            }
        }
        tracing::debug!(entries = recorded.len(), "Opened ledger");
        Ok(Self {
            backend,
            path,
            recorded: Mutex::new(recorded),
        })
    }

    /// Append `entry` unless an identical file is already recorded. Returns
    /// whether a line was written.
    pub async fn record(&self, entry: &LedgerEntry) -> Result<bool> {
        let key = EntryKey::from(entry);
        // Held across the append so lines are never interleaved.
        let mut recorded = self.recorded.lock().await;
        if recorded.contains(&key) {
            tracing::trace!(app_id = %entry.app_id, filename = %entry.filename, "Already in ledger");
            return Ok(false);
        }
        let mut line = serde_json::to_vec(entry).or_raise(|| ErrorKind::LedgerEncoding)?;
        line.push(b'\n');
        self.backend.append(&self.path, &line).await?;
        recorded.insert(key);
        Ok(true)
    }

    pub async fn contains(&self, entry: &LedgerEntry) -> bool {
        self.recorded.lock().await.contains(&EntryKey::from(entry))
    }

    pub async fn len(&self) -> usize {
        self.recorded.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
