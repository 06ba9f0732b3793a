//! Durable work queue for the content crawler.
//!
//! The queue is the resumability mechanism of the archiver: every
//! (platform, app, task, locale) combination is a row that moves from
//! unclaimed to claimed to processed exactly once. Rebuilding the queue only
//! ever adds rows, so a crawl interrupted at any point picks up where it left
//! off.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{FailedFile, QueueStats, WorkItem};
pub use crate::repo::{DEFAULT_CLAIM_LEASE, Repository};
