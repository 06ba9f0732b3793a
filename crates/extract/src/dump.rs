//! Offline recovery of `(app_id, task)` pairs from console dumps.

use spotpass_registry::is_app_id;
use tracing::instrument;

use crate::consts::{TEXT_DUMP_REGEX, task_db};
use crate::models::TaskRef;

/// Scan a 3DS BOSS save partition for manifest and content paths.
///
/// Every match is returned in the order it appears, duplicates included;
/// the registry merge is what de-duplicates. Non-UTF-8 regions are skipped
/// over rather than aborting the scan.
#[instrument(skip(dump), fields(size = dump.len()))]
pub fn scan_text_dump(dump: &[u8]) -> Vec<TaskRef> {
    let refs = TEXT_DUMP_REGEX
        .captures_iter(dump)
        .filter_map(|captures| {
            let app_id = std::str::from_utf8(captures.get(1)?.as_bytes()).ok()?;
            let task = std::str::from_utf8(captures.get(2)?.as_bytes()).ok()?;
            Some(TaskRef::new(app_id, task))
        })
        .collect::<Vec<_>>();
    tracing::debug!(matches = refs.len(), "Scanned text dump");
    refs
}

/// Read a NUL-padded field, tolerating dumps shorter than the preallocated
/// size.
fn field(slot: &[u8], range: std::ops::Range<usize>) -> String {
    let end = range.end.min(slot.len());
    let start = range.start.min(end);
    String::from_utf8_lossy(&slot[start..end]).replace('\0', "")
}

/// Parse a Wii U `task.db`.
///
/// Slots whose task or app id is empty are unused. Slots whose app id does
/// not look like a BOSS application id belong to tasks that do not download
/// from the BOSS servers, and are skipped too.
#[instrument(skip(dump), fields(size = dump.len()))]
pub fn parse_task_db(dump: &[u8]) -> Vec<TaskRef> {
    let mut refs = Vec::new();
    for index in 0..task_db::SLOT_COUNT {
        let offset = task_db::HEADER_SIZE + index * task_db::SLOT_SIZE;
        let Some(slot) = dump.get(offset..) else {
            break;
        };
        let slot = &slot[..task_db::SLOT_SIZE.min(slot.len())];
        let task = field(slot, task_db::TASK_FIELD);
        let app_id = field(slot, task_db::APP_ID_FIELD);
        if task.is_empty() || app_id.is_empty() {
            continue;
        }
        if !is_app_id(&app_id) {
            tracing::trace!(slot = index, task, app_id, "Skipping non-download task");
            continue;
        }
        refs.push(TaskRef::new(app_id, task));
    }
    tracing::debug!(tasks = refs.len(), "Parsed task database");
    refs
}
