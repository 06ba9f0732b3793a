//! Parsers for everything the archiver reads rather than fetches: the two
//! manifest formats served by the BOSS endpoints, and the two kinds of device
//! dump tasks are recovered from.

mod consts;
mod dump;
pub mod error;
mod filelist;
mod models;
mod tasksheet;

use spotpass_registry::Platform;

pub use crate::dump::{parse_task_db, scan_text_dump};
use crate::error::Result;
pub use crate::filelist::parse_filelist;
pub use crate::models::{Manifest, ManifestFile, TaskRef};
pub use crate::tasksheet::parse_tasksheet;

/// Parse a manifest body in the format served for `platform`.
pub fn parse_manifest(platform: Platform, body: &[u8]) -> Result<Manifest> {
    match platform {
        Platform::Ctr => parse_filelist(body),
        Platform::Wup => parse_tasksheet(body),
    }
}

/// Recover task references from a dump in the format produced by
/// `platform`.
pub fn parse_dump(platform: Platform, dump: &[u8]) -> Vec<TaskRef> {
    match platform {
        Platform::Ctr => scan_text_dump(dump),
        Platform::Wup => parse_task_db(dump),
    }
}
