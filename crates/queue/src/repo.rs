//! Work queue operations.
//!
//! The queue expands the registry across the locale matrix into one row per
//! (platform, app, task, locale). A crawl drains it batch by batch: claim a
//! batch, process each item, mark each processed, repeat until nothing is
//! left to claim.

use exn::ResultExt;
use spotpass_registry::{LocaleMatrix, Platform, Registry};
use sqlx::SqlitePool;
use std::time::Duration;
use time::UtcDateTime;
use tracing::instrument;

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{FailedFile, QueueStats, WorkItem, WorkItemRow};

/// Claims older than this are assumed to belong to a consumer that died.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(60 * 60);

fn now() -> i64 {
    UtcDateTime::now().unix_timestamp()
}

/// Repository for the work queue.
///
/// # Claiming
///
/// [`next_batch`](Self::next_batch) claims rows with a single atomic
/// `UPDATE ... RETURNING`, so any number of consumers can drain the same
/// queue without processing a row twice. A claim is a lease: once it is older
/// than the lease duration (measured from when this repository was created)
/// another consumer may take the row over. Rows claimed through this
/// repository are never handed out again by it, so a drain loop always
/// terminates even when some items keep failing.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    lease: Duration,
    opened_at: i64,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self::new(db, DEFAULT_CLAIM_LEASE)
    }
}
impl Repository {
    pub fn new(db: &Database, lease: Duration) -> Self {
        Self {
            pool: db.pool().clone(),
            lease,
            opened_at: now(),
        }
    }

    fn stale_before(&self) -> i64 {
        let lease = i64::try_from(self.lease.as_secs()).unwrap_or(i64::MAX);
        self.opened_at.saturating_sub(lease)
    }

    /// Insert a work item for every (app, task, locale) combination not
    /// already queued, returning how many rows were added.
    ///
    /// Existing rows, and whether they have been processed, are left alone,
    /// so this is safe to run again whenever the registry grows.
    #[instrument(skip_all, fields(apps = registry.apps().len(), locales = locales.len()))]
    pub async fn build(&self, registry: &Registry, locales: &LocaleMatrix) -> Result<u64> {
        let mut inserted = 0;
        for app in registry.apps() {
            if app.tasks.is_empty() {
                continue;
            }
            // One transaction per app keeps each commit to a few thousand rows.
            let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
            for task in &app.tasks {
                for locale in locales {
                    let result = sqlx::query(include_str!("../queries/insert_work_item.sql"))
                        .bind(app.platform.as_str())
                        .bind(&app.app_id)
                        .bind(task)
                        .bind(&locale.country)
                        .bind(&locale.language)
                        .execute(&mut *tx)
                        .await
                        .or_raise(|| ErrorKind::Database)?;
                    inserted += result.rows_affected();
                }
            }
            tx.commit().await.or_raise(|| ErrorKind::Database)?;
        }
        tracing::info!(inserted, "Work queue built");
        Ok(inserted)
    }

    /// Claim up to `limit` unprocessed items for `platform`, oldest first.
    pub async fn next_batch(&self, platform: Platform, limit: u32) -> Result<Vec<WorkItem>> {
        let rows: Vec<WorkItemRow> = sqlx::query_as(include_str!("../queries/claim_batch.sql"))
            .bind(now())
            .bind(platform.as_str())
            .bind(self.stale_before())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut items = rows.into_iter().map(WorkItem::try_from).collect::<Result<Vec<_>>>()?;
        // RETURNING gives no ordering guarantee.
        items.sort_by_key(|item| item.id);
        tracing::debug!(%platform, claimed = items.len(), "Claimed batch");
        Ok(items)
    }

    /// Hand every claimed but unprocessed item of `platform` back to the
    /// pool, returning how many were released.
    ///
    /// For a consumer that knows it is the only one draining `platform`:
    /// whatever is still claimed was left behind by an interrupted run and
    /// can be taken again straight away rather than once its lease expires.
    pub async fn release_claims(&self, platform: Platform) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/release_claims.sql"))
            .bind(platform.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let released = result.rows_affected();
        if released > 0 {
            tracing::info!(%platform, released, "Released claims left by an earlier run");
        }
        Ok(released)
    }

    /// Mark an item processed. Marking it again is a no-op.
    pub async fn mark_processed(&self, id: i64) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/mark_processed.sql"))
            .bind(id)
            .bind(now())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::WorkItemNotFound(id));
        }
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<WorkItem>> {
        let row: Option<WorkItemRow> = sqlx::query_as(include_str!("../queries/get_work_item.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(WorkItem::try_from).transpose()
    }

    /// Record that `filename` could not be fetched for a work item. Recording
    /// the same file again accumulates its attempt count.
    pub async fn record_failure(
        &self,
        work_item_id: i64,
        filename: &str,
        url: Option<&str>,
        attempts: u32,
        reason: &str,
    ) -> Result<()> {
        sqlx::query(include_str!("../queries/record_failure.sql"))
            .bind(work_item_id)
            .bind(filename)
            .bind(url)
            .bind(i64::from(attempts))
            .bind(reason)
            .bind(now())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn failures(&self, platform: Platform) -> Result<Vec<FailedFile>> {
        sqlx::query_as(include_str!("../queries/list_failures.sql"))
            .bind(platform.as_str())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub async fn stats(&self, platform: Platform) -> Result<QueueStats> {
        sqlx::query_as(include_str!("../queries/stats.sql"))
            .bind(platform.as_str())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }
}
