use exn::ResultExt;
use spotpass_extract::parse_dump;
use spotpass_registry::{MergeSummary, Platform, Registry};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Merge the task references found in a dump file, or in every dump file of
/// a directory, into the registry.
///
/// Directories are not searched recursively. Only files carrying the
/// platform's dump extension are read, in lexical order, so that repeated
/// runs over the same directory merge tasks in the same order.
#[instrument(skip(registry), fields(path = %path.display()))]
pub async fn ingest(registry: &mut Registry, platform: Platform, path: &Path) -> Result<MergeSummary> {
    let metadata = fs::metadata(path).await.or_raise(|| ErrorKind::Dump(path.to_path_buf()))?;
    let files = match metadata.is_dir() {
        true => dump_files(path, platform).await?,
        false => vec![path.to_path_buf()],
    };

    let mut total = MergeSummary::default();
    for file in &files {
        total += ingest_file(registry, platform, file).await?;
    }
    tracing::info!(files = files.len(), new_apps = total.new_apps, new_tasks = total.new_tasks, "Ingest complete");
    Ok(total)
}

async fn dump_files(dir: &Path, platform: Platform) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await.or_raise(|| ErrorKind::Dump(dir.to_path_buf()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Dump(dir.to_path_buf()))? {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(platform.dump_extension()));
        if matches && entry.file_type().await.is_ok_and(|t| t.is_file()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn ingest_file(registry: &mut Registry, platform: Platform, file: &Path) -> Result<MergeSummary> {
    let dump = fs::read(file).await.or_raise(|| ErrorKind::Dump(file.to_path_buf()))?;
    let refs = parse_dump(platform, &dump);
    let summary = registry
        .merge(platform, refs.iter().map(|r| r.as_pair()))
        .await
        .or_raise(|| ErrorKind::Registry)?;
    match summary.is_empty() {
        true => tracing::info!(file = %file.display(), found = refs.len(), "Nothing new"),
        false => tracing::info!(
            file = %file.display(),
            found = refs.len(),
            new_apps = summary.new_apps,
            new_tasks = summary.new_tasks,
            "Merged dump"
        ),
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT_DUMP: &[u8] = b"\x00\xffhttps://npdl.cdn.nintendowifi.net/p01/nsa/1122334455667788/FGONLYT/x\x00\
        filelist/AAAABBBBCCCCDDDD/news?c=US\x00nsa/1122334455667788/fgonlyt";

    #[tokio::test]
    async fn test_ingest_single_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dump = temp_dir.path().join("memory.txt");
        std::fs::write(&dump, TEXT_DUMP).unwrap();
        let mut registry = Registry::in_memory([]);

        let summary = ingest(&mut registry, Platform::Ctr, &dump).await.unwrap();

        assert_eq!(summary, MergeSummary { new_apps: 2, new_tasks: 2 });
        assert_eq!(registry.get(Platform::Ctr, "1122334455667788").unwrap().tasks, ["FGONLYT"]);
    }

    #[tokio::test]
    async fn test_ingest_directory_filters_by_extension() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("b.bin"), b"nsa/1122334455667788/SECOND").unwrap();
        std::fs::write(temp_dir.path().join("a.BIN"), b"nsa/1122334455667788/FIRST").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"nsa/AAAABBBBCCCCDDDD/IGNORED").unwrap();
        std::fs::create_dir(temp_dir.path().join("nested.bin")).unwrap();
        let mut registry = Registry::in_memory([]);

        let summary = ingest(&mut registry, Platform::Ctr, temp_dir.path()).await.unwrap();

        assert_eq!(summary, MergeSummary { new_apps: 1, new_tasks: 2 });
        assert_eq!(registry.get(Platform::Ctr, "1122334455667788").unwrap().tasks, ["FIRST", "SECOND"]);
        assert!(registry.get(Platform::Ctr, "AAAABBBBCCCCDDDD").is_none());
    }

    #[tokio::test]
    async fn test_empty_task_db_adds_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("empty.db"), vec![0u8; 0x103]).unwrap();
        let mut registry = Registry::in_memory([]);
        let summary = ingest(&mut registry, Platform::Wup, temp_dir.path()).await.unwrap();
        assert!(summary.is_empty());
        assert!(registry.apps().is_empty());
    }

    #[tokio::test]
    async fn test_missing_path() {
        let mut registry = Registry::in_memory([]);
        let err = ingest(&mut registry, Platform::Wup, Path::new("/does/not/exist.db")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Dump(_)));
    }
}
