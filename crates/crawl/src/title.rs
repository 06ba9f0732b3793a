use exn::ResultExt;
use futures::{StreamExt, TryStreamExt};
use spotpass_client::ManifestSource;
use spotpass_extract::parse_tasksheet;
use spotpass_registry::{App, LocaleMatrix, Platform, Registry, TitleId};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::{Error, ErrorKind, Result};

/// Tally of a [`resolve_title_ids`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TitleSummary {
    pub known: usize,
    pub unknown: usize,
}

/// Search for the title id of `app`.
///
/// Only task sheets carry a title id, so the task-sheet endpoint is asked
/// regardless of the app's own platform. Locales are tried in matrix order
/// and, within each locale, every task the app is known to have. The first
/// `TitleId` found wins; exhausting the search yields [`TitleId::Unknown`].
#[instrument(skip(source, locales, app), fields(app_id = %app.app_id, platform = %app.platform))]
pub async fn find_title_id(source: &dyn ManifestSource, locales: &LocaleMatrix, app: &App) -> TitleId {
    for locale in locales {
        for task in &app.tasks {
            let Some(body) = source.manifest(Platform::Wup, &app.app_id, task, locale).await else {
                continue;
            };
            match parse_tasksheet(&body) {
                Ok(manifest) => {
                    if let Some(title_id) = manifest.title_id.filter(|id| !id.is_empty()) {
                        tracing::debug!(%locale, %task, %title_id, "Found title id");
                        return TitleId::Known(title_id);
                    }
                },
                Err(error) => tracing::debug!(%locale, %task, %error, "Unreadable task sheet"),
            }
        }
    }
    TitleId::Unknown
}

/// Find and record a title id for every app (optionally of one platform)
/// that does not have one yet. Apps already marked `unknown` are not
/// searched again.
pub async fn resolve_title_ids(
    source: &dyn ManifestSource,
    registry: &Mutex<Registry>,
    locales: &LocaleMatrix,
    platform: Option<Platform>,
    concurrency: usize,
) -> Result<TitleSummary> {
    let pending: Vec<App> = registry
        .lock()
        .await
        .apps()
        .iter()
        .filter(|app| app.title_id.is_none() && platform.is_none_or(|p| p == app.platform))
        .cloned()
        .collect();
    tracing::info!(apps = pending.len(), "Resolving title ids");

    futures::stream::iter(pending)
        .map(|app| async move {
            let title_id = find_title_id(source, locales, &app).await;
            registry
                .lock()
                .await
                .set_title_id(app.platform, &app.app_id, title_id.clone())
                .await
                .or_raise(|| ErrorKind::Registry)?;
            Ok::<_, Error>(title_id)
        })
        .buffer_unordered(concurrency.max(1))
        .try_fold(TitleSummary::default(), |mut summary, title_id| async move {
            match title_id {
                TitleId::Known(_) => summary.known += 1,
                TitleId::Unknown => summary.unknown += 1,
            }
            Ok(summary)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::tests::{APP, StubSource, locale};

    const SHEET: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<TaskSheet><TitleId>000500001010ec00</TitleId><Files></Files></TaskSheet>"#;

    fn app(tasks: &[&str]) -> App {
        let mut app = App::new(Platform::Ctr, APP);
        app.tasks = tasks.iter().map(|t| t.to_string()).collect();
        app
    }

    fn matrix() -> LocaleMatrix {
        LocaleMatrix::new(["US", "JP"], ["en", "ja"]).unwrap()
    }

    #[tokio::test]
    async fn test_tasks_are_tried_within_each_locale() {
        let source = StubSource::default().serving("param", &locale("US", "ja"), SHEET);
        let title_id = find_title_id(&source, &matrix(), &app(&["news", "param"])).await;
        assert_eq!(title_id, TitleId::Known("000500001010EC00".to_string()));
        let requests: Vec<String> = source.requests().into_iter().map(|(task, l)| format!("{task}@{l}")).collect();
        assert_eq!(requests, ["news@US/en", "param@US/en", "news@US/ja", "param@US/ja"]);
    }

    #[tokio::test]
    async fn test_sheet_without_title_id_keeps_searching() {
        let source = StubSource::default()
            .serving("news", &locale("US", "en"), b"<TaskSheet><Files/></TaskSheet>")
            .serving("news", &locale("JP", "en"), b"not xml at all <")
            .serving("news", &locale("JP", "ja"), SHEET);
        let title_id = find_title_id(&source, &matrix(), &app(&["news"])).await;
        assert!(title_id.is_known());
    }

    #[tokio::test]
    async fn test_no_tasks_means_unknown() {
        let source = StubSource::default();
        assert_eq!(find_title_id(&source, &matrix(), &app(&[])).await, TitleId::Unknown);
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_skips_apps_already_set() {
        let mut done = app(&["news"]);
        done.app_id = "8877665544332211".to_string();
        done.title_id = Some(TitleId::Unknown);
        let mut other = app(&["news"]);
        other.app_id = "AAAABBBBCCCCDDDD".to_string();
        other.platform = Platform::Wup;
        let registry = Mutex::new(Registry::in_memory([app(&["news"]), done, other]));
        let source = StubSource::default().serving("news", &locale("JP", "ja"), SHEET);

        let summary = resolve_title_ids(&source, &registry, &matrix(), Some(Platform::Ctr), 2).await.unwrap();

        assert_eq!(summary, TitleSummary { known: 1, unknown: 0 });
        let registry = registry.lock().await;
        let resolved = registry.get(Platform::Ctr, APP).unwrap();
        assert_eq!(resolved.title_id, Some(TitleId::Known("000500001010EC00".to_string())));
        assert_eq!(registry.get(Platform::Wup, "AAAABBBBCCCCDDDD").unwrap().title_id, None);
    }
}
