use exn::ResultExt;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// Workers hold a connection for one statement at a time; SQLite only has
// one writer anyway.
const POOL_SIZE: u32 = 4;
// Claims, completions and failure records all contend for the WAL writer.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connected and migrated queue store.
///
/// The only way to obtain a [`Repository`](crate::Repository), so no queue
/// operation can run against a store that is not open.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the queue database at `path`, creating the file and its parent
    /// directories if needed, and bring the schema up to date.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).or_raise(|| ErrorKind::Open(dir.to_path_buf()))?;
        }
        let options = Self::options().filename(path).create_if_missing(true);
        Self::open(options, POOL_SIZE).await.or_raise(|| ErrorKind::Open(path.to_path_buf()))
    }

    /// Private in-memory database. Not `cfg(test)`: other crates' tests use it.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every connection to `:memory:` gets its own database.
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, pool_size: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    // `pragma()` entries are sent on every new connection of the pool.
    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
            .auto_vacuum(SqliteAutoVacuum::None)
            .pragma("wal_autocheckpoint", "800")
            .pragma("temp_store", "MEMORY")
    }

    #[instrument("migrating work queue", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for outstanding connections, then close the pool.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
