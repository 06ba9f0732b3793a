use exn::ResultExt;
use spotpass_client::{Content, Fetch, ManifestSource, Url};
use spotpass_extract::{ManifestFile, parse_manifest};
use spotpass_queue::WorkItem;
use spotpass_registry::Locale;
use spotpass_storage::{LedgerEntry, is_file_name};
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tracing::instrument;

use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::template::content_urls;

/// What became of a work item's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestState {
    /// Nothing is served for this locale.
    Absent,
    /// A manifest was served and archived, but its file list is unreadable.
    Malformed,
    /// The manifest was archived and its files attempted.
    Parsed { title_id: Option<String> },
}

/// What became of one file named by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Downloaded and archived. `recorded` is `false` when the ledger already
    /// held an identical file.
    Fetched { filename: String, url: Url, recorded: bool },
    /// No URL served the file; a failure record was written.
    Failed { filename: String, attempts: u32, reason: String },
}

/// The result of crawling one work item, which is now processed.
#[derive(Debug, Clone)]
pub struct Crawled {
    pub item: WorkItem,
    pub manifest: ManifestState,
    pub files: Vec<FileOutcome>,
}
impl Crawled {
    pub fn fetched(&self) -> usize {
        self.files.iter().filter(|f| matches!(f, FileOutcome::Fetched { .. })).count()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| matches!(f, FileOutcome::Failed { .. })).count()
    }
}

/// `{run}/{country}/{language}/{app_id}/{task}`
pub(crate) fn archive_dir(run: &str, item: &WorkItem) -> PathBuf {
    let Locale { country, language } = &item.locale;
    [run, country.as_str(), language.as_str(), item.app_id.as_str(), item.task.as_str()].iter().collect()
}

/// Crawl a single work item: archive its manifest, fetch and archive every
/// file it names, then mark it processed.
///
/// Missing content never fails an item. An absent or malformed manifest and
/// files no URL serves are all ordinary outcomes, and the item is marked
/// processed regardless. Only a failure of the archive, the ledger or the
/// queue is an error, in which case the item is left unprocessed so the next
/// run tries it again.
#[instrument(
    skip(ctx, item),
    fields(id = item.id, platform = %item.platform, app_id = %item.app_id, task = %item.task, locale = %item.locale)
)]
pub async fn crawl_item(ctx: &Context, item: WorkItem) -> Result<Crawled> {
    let id = item.id;
    crawl_item_inner(ctx, item).await.or_raise(|| ErrorKind::Item(id))
}

async fn crawl_item_inner(ctx: &Context, item: WorkItem) -> Result<Crawled> {
    let platform = item.platform;
    let Some(body) = ctx.client.manifest(platform, &item.app_id, &item.task, &item.locale).await else {
        tracing::trace!("No manifest served");
        return finish(ctx, item, ManifestState::Absent, vec![]).await;
    };

    let dir = archive_dir(&ctx.run, &item);
    ctx.backend
        .write(&dir.join(platform.manifest_filename()), &body)
        .await
        .or_raise(|| ErrorKind::Storage)?;

    let manifest = match parse_manifest(platform, &body) {
        Ok(manifest) => manifest,
        Err(error) => {
            tracing::warn!(%error, "Malformed manifest; skipping its files");
            return finish(ctx, item, ManifestState::Malformed, vec![]).await;
        },
    };
    tracing::debug!(files = manifest.files.len(), "Manifest archived");

    let mut files = Vec::with_capacity(manifest.files.len());
    for file in &manifest.files {
        files.push(fetch_file(ctx, &item, &dir, manifest.title_id.as_deref(), file).await?);
    }
    let state = ManifestState::Parsed {
        title_id: manifest.title_id,
    };
    finish(ctx, item, state, files).await
}

async fn finish(ctx: &Context, item: WorkItem, manifest: ManifestState, files: Vec<FileOutcome>) -> Result<Crawled> {
    ctx.queue.mark_processed(item.id).await.or_raise(|| ErrorKind::Queue)?;
    Ok(Crawled { item, manifest, files })
}

/// Try each candidate URL for `file` in order, stopping at the first that
/// serves it.
async fn fetch_file(
    ctx: &Context,
    item: &WorkItem,
    dir: &Path,
    title_id: Option<&str>,
    file: &ManifestFile,
) -> Result<FileOutcome> {
    let filename = file.filename.as_str();
    let mut attempts = 0;
    let mut last: Option<(Url, String)> = None;

    if is_file_name(filename) {
        let urls = content_urls(ctx.client.endpoints(), item.platform, &item.app_id, &item.task, &item.locale, file);
        for url in urls {
            match ctx.client.fetch(&url).await {
                Fetch::Found(content) => {
                    let recorded = archive(ctx, item, dir, title_id, filename, &content).await?;
                    tracing::debug!(filename, %url, recorded, "File archived");
                    return Ok(FileOutcome::Fetched {
                        filename: filename.to_string(),
                        url,
                        recorded,
                    });
                },
                Fetch::Missing(status) => {
                    tracing::trace!(filename, %url, %status, "Not at this URL");
                    attempts += 1;
                    last = Some((url, format!("HTTP {status}")));
                },
                Fetch::Failed { attempts: tried, reason } => {
                    tracing::debug!(filename, %url, tried, %reason, "Giving up on URL");
                    attempts += tried;
                    last = Some((url, reason));
                },
            }
        }
    }

    let (url, reason) = match last {
        Some((url, reason)) => (Some(url), reason),
        None if is_file_name(filename) => (None, "no usable URL".to_string()),
        None => (None, "unsafe file name".to_string()),
    };
    tracing::warn!(filename, attempts, %reason, "File could not be fetched");
    ctx.queue
        .record_failure(item.id, filename, url.as_ref().map(Url::as_str), attempts, &reason)
        .await
        .or_raise(|| ErrorKind::Queue)?;
    Ok(FileOutcome::Failed {
        filename: filename.to_string(),
        attempts,
        reason,
    })
}

/// Write the body and headers next to the manifest and append the ledger
/// entry. Returns whether the ledger gained a line.
async fn archive(
    ctx: &Context,
    item: &WorkItem,
    dir: &Path,
    title_id: Option<&str>,
    filename: &str,
    content: &Content,
) -> Result<bool> {
    ctx.backend
        .write(&dir.join(format!("{filename}.boss")), &content.body)
        .await
        .or_raise(|| ErrorKind::Storage)?;
    let headers = serde_json::to_vec_pretty(&content.headers).or_raise(|| ErrorKind::Storage)?;
    ctx.backend
        .write(&dir.join(format!("{filename}.boss_headers.json")), &headers)
        .await
        .or_raise(|| ErrorKind::Storage)?;

    let entry = LedgerEntry {
        platform: item.platform,
        app_id: item.app_id.clone(),
        task: item.task.clone(),
        filename: filename.to_string(),
        country: item.locale.country.clone(),
        language: item.locale.language.clone(),
        title_id: title_id.map(str::to_string),
        hash: blake3::hash(&content.body).to_hex().to_string(),
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        size: u64::try_from(content.body.len()).unwrap_or(u64::MAX),
        run: ctx.run.clone(),
        fetched_at: UtcDateTime::now().unix_timestamp(),
    };
    ctx.ledger.record(&entry).await.or_raise(|| ErrorKind::Storage)
}
