use exn::{OptionExt, ResultExt};
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::models::{Manifest, ManifestFile};

/// Lines at the top of a file list that describe the list itself.
const HEADER_LINES: usize = 2;

/// Parse a 3DS file list.
///
/// The body is CRLF-delimited; blank lines are ignored, the first two
/// remaining lines are header metadata, and every following line is a
/// tab-separated record whose first field is the file name.
#[instrument(skip(body), fields(size = body.len()))]
pub fn parse_filelist(body: &[u8]) -> Result<Manifest> {
    let text = std::str::from_utf8(body).or_raise(|| ErrorKind::InvalidEncoding)?;
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    for _ in 0..HEADER_LINES {
        lines.next().ok_or_raise(|| ErrorKind::MissingField("header"))?;
    }
    let files = lines
        .filter_map(|line| line.split('\t').next())
        .map(str::trim)
        .filter(|filename| !filename.is_empty())
        .map(ManifestFile::named)
        .collect::<Vec<_>>();
    tracing::trace!(files = files.len(), "Parsed file list");
    Ok(Manifest { title_id: None, files })
}
