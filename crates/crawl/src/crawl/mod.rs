//! The resumable content crawler.
//!
//! The primary entry point is [`crawl`], which drains a platform's work queue
//! and streams one [`Crawled`] per item. Each item is handled by
//! [`crawl_item`]: its manifest, every file the manifest names and the
//! response headers of each file are archived under the run directory, and
//! each newly archived file is appended to the ledger.

mod item;
mod stream;

pub use self::item::{Crawled, FileOutcome, ManifestState, crawl_item};
pub use self::stream::{CrawlEvent, crawl};

use time::UtcDateTime;

/// Name of a run started now: the current UTC date, `YYYY-MM-DD`.
pub fn default_run_name() -> String {
    UtcDateTime::now().date().to_string()
}
