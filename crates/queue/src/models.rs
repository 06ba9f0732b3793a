use exn::ResultExt;
use spotpass_registry::{Locale, Platform};

use crate::error::{Error, ErrorKind};

/// One (platform, app, task, locale) unit of crawl work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: i64,
    pub platform: Platform,
    pub app_id: String,
    pub task: String,
    pub locale: Locale,
    pub processed: bool,
}

#[derive(sqlx::FromRow)]
pub(crate) struct WorkItemRow {
    id: i64,
    platform: String,
    app_id: String,
    task: String,
    country: String,
    language: String,
    processed: bool,
}
impl TryFrom<WorkItemRow> for WorkItem {
    type Error = Error;
    fn try_from(row: WorkItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            platform: row.platform.parse::<Platform>().or_raise(|| ErrorKind::InvalidData("platform"))?,
            app_id: row.app_id,
            task: row.task,
            locale: Locale::new(row.country, row.language).or_raise(|| ErrorKind::InvalidData("locale"))?,
            processed: row.processed,
        })
    }
}

/// Counts for one platform's slice of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct QueueStats {
    pub total: i64,
    pub processed: i64,
    /// Claimed by a consumer but not yet processed.
    pub claimed: i64,
    pub failed_files: i64,
}
impl QueueStats {
    pub fn pending(&self) -> i64 {
        self.total - self.processed
    }
}

/// A content file that could not be fetched from any URL.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FailedFile {
    pub work_item_id: i64,
    pub filename: String,
    pub url: Option<String>,
    pub attempts: i64,
    pub reason: String,
    pub failed_at: i64,
}
