//! Discovery and crawling of BOSS task content.
//!
//! - [`ingest`] fills the registry from device dumps.
//! - [`discover`] proves that a task exists by probing every locale.
//! - [`resolve_title_ids`] attaches a title id to every app.
//! - [`crawl`] drains the work queue, archiving manifests and content.

mod crawl;
mod discover;
pub mod error;
mod ingest;
mod template;
mod title;

pub use crate::crawl::{CrawlEvent, Crawled, FileOutcome, ManifestState, crawl, crawl_item, default_run_name};
pub use crate::discover::{Candidate, Discovery, discover, discover_all};
pub use crate::ingest::ingest;
pub use crate::template::{ContentTemplate, UrlPlan, content_urls, plan};
pub use crate::title::{TitleSummary, find_title_id, resolve_title_ids};

use spotpass_client::Client;
use spotpass_queue::Repository;
use spotpass_storage::{BackendHandle, Ledger};

/// Everything a crawl needs.
pub struct Context {
    pub client: Client,
    /// Where manifests, content and header records are archived.
    pub backend: BackendHandle,
    pub ledger: Ledger,
    pub queue: Repository,
    /// Top-level archive directory for this run.
    pub run: String,
    /// Maximum number of work items crawled at once.
    pub concurrency: usize,
    /// Number of work items claimed per batch.
    pub batch_size: u32,
}
