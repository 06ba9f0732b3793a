//! Brute-force task discovery.
//!
//! Whether a task exists, and for which locales, is not documented anywhere.
//! The only way to find out is to ask for its manifest in every locale until
//! one answers. An absent task therefore costs one request per locale in the
//! matrix; a present one costs as many requests as it takes to reach the
//! first locale that serves it.

use exn::ResultExt;
use futures::{StreamExt, TryStreamExt};
use spotpass_client::ManifestSource;
use spotpass_registry::{Locale, LocaleMatrix, Platform, Registry};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::{Error, ErrorKind, Result};

/// Outcome of [`discover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// The registry already lists the task; nothing was probed.
    AlreadyKnown,
    /// The first locale, in matrix order, that served a manifest.
    Found(Locale),
    /// No locale served a manifest. The registry is unchanged.
    NotFound,
}
impl Discovery {
    /// Whether the task is known to exist.
    pub fn exists(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// One (app, task) pair to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub platform: Platform,
    pub app_id: String,
    pub task: String,
}
impl Candidate {
    pub fn new(platform: Platform, app_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            platform,
            app_id: app_id.into(),
            task: task.into(),
        }
    }
}

/// Probe `task` for `app_id` in every locale, in matrix order, stopping at
/// the first locale that serves a manifest.
///
/// On success the task is added to the registry (which persists it) before
/// returning. The registry lock is only taken around registry access, never
/// while a probe is in flight, so several discoveries can share one registry.
#[instrument(skip(source, registry, locales), fields(locales = locales.len()))]
pub async fn discover(
    source: &dyn ManifestSource,
    registry: &Mutex<Registry>,
    locales: &LocaleMatrix,
    platform: Platform,
    app_id: &str,
    task: &str,
) -> Result<Discovery> {
    let known = registry.lock().await.get(platform, app_id).is_some_and(|app| app.has_task(task));
    if known {
        tracing::debug!("Task already known; skipping");
        return Ok(Discovery::AlreadyKnown);
    }

    for locale in locales {
        if !source.probe(platform, app_id, task, locale).await {
            continue;
        }
        tracing::info!(%locale, "Task discovered");
        registry
            .lock()
            .await
            .add_task(platform, app_id, task)
            .await
            .or_raise(|| ErrorKind::Registry)?;
        return Ok(Discovery::Found(locale.clone()));
    }

    tracing::debug!("Task not found in any locale");
    Ok(Discovery::NotFound)
}

/// Run [`discover`] for every candidate, at most `concurrency` at a time.
///
/// Results are returned in the order the candidates were given. A registry
/// failure aborts the whole run.
pub async fn discover_all(
    source: &dyn ManifestSource,
    registry: &Mutex<Registry>,
    locales: &LocaleMatrix,
    candidates: Vec<Candidate>,
    concurrency: usize,
) -> Result<Vec<(Candidate, Discovery)>> {
    futures::stream::iter(candidates)
        .map(|candidate| async move {
            let discovery =
                discover(source, registry, locales, candidate.platform, &candidate.app_id, &candidate.task).await?;
            Ok::<_, Error>((candidate, discovery))
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use rstest::rstest;
    use spotpass_registry::App;
    use std::collections::HashMap;

    pub(crate) const APP: &str = "1122334455667788";

    /// Serves a fixed body for the listed (task, locale) pairs and records
    /// every request in order.
    #[derive(Default)]
    pub(crate) struct StubSource {
        pub(crate) served: HashMap<(String, Locale), Vec<u8>>,
        pub(crate) requests: std::sync::Mutex<Vec<(String, Locale)>>,
    }
    impl StubSource {
        pub(crate) fn serving(mut self, task: &str, locale: &Locale, body: &[u8]) -> Self {
            self.served.insert((task.to_string(), locale.clone()), body.to_vec());
            self
        }

        pub(crate) fn requests(&self) -> Vec<(String, Locale)> {
            self.requests.lock().unwrap().clone()
        }
    }
    #[async_trait]
    impl ManifestSource for StubSource {
        async fn probe(&self, platform: Platform, app_id: &str, task: &str, locale: &Locale) -> bool {
            self.manifest(platform, app_id, task, locale).await.is_some()
        }

        async fn manifest(&self, _: Platform, _: &str, task: &str, locale: &Locale) -> Option<Vec<u8>> {
            self.requests.lock().unwrap().push((task.to_string(), locale.clone()));
            self.served.get(&(task.to_string(), locale.clone())).cloned()
        }
    }

    pub(crate) fn locale(country: &str, language: &str) -> Locale {
        Locale::new(country, language).unwrap()
    }

    fn matrix() -> LocaleMatrix {
        LocaleMatrix::new(["US", "JP", "GB"], ["en", "ja"]).unwrap()
    }

    #[rstest]
    #[case::first(locale("US", "en"), 1)]
    #[case::middle(locale("JP", "en"), 3)]
    #[case::last(locale("GB", "ja"), 6)]
    #[tokio::test]
    async fn test_discover_stops_at_first_match(#[case] serving: Locale, #[case] probes: usize) {
        let source = StubSource::default().serving("news", &serving, b"<TaskSheet/>");
        let registry = Mutex::new(Registry::in_memory([]));

        let discovery = discover(&source, &registry, &matrix(), Platform::Wup, APP, "news").await.unwrap();

        assert_eq!(discovery, Discovery::Found(serving));
        assert_eq!(source.requests().len(), probes);
        assert!(registry.lock().await.get(Platform::Wup, APP).unwrap().has_task("news"));
    }

    #[tokio::test]
    async fn test_discover_prefers_matrix_order() {
        let source = StubSource::default()
            .serving("news", &locale("GB", "en"), b"")
            .serving("news", &locale("JP", "ja"), b"");
        let registry = Mutex::new(Registry::in_memory([]));
        let discovery = discover(&source, &registry, &matrix(), Platform::Wup, APP, "news").await.unwrap();
        assert_eq!(discovery, Discovery::Found(locale("JP", "ja")));
    }

    #[tokio::test]
    async fn test_discover_not_found_leaves_registry_alone() {
        let source = StubSource::default();
        let registry = Mutex::new(Registry::in_memory([]));
        let discovery = discover(&source, &registry, &matrix(), Platform::Ctr, APP, "FGONLYT").await.unwrap();
        assert_eq!(discovery, Discovery::NotFound);
        assert!(!discovery.exists());
        assert_eq!(source.requests().len(), 6);
        assert!(registry.lock().await.apps().is_empty());
    }

    #[tokio::test]
    async fn test_known_task_is_not_probed() {
        let mut app = App::new(Platform::Wup, APP);
        app.tasks.push("NEWS".to_string());
        let registry = Mutex::new(Registry::in_memory([app]));
        let source = StubSource::default();
        let discovery = discover(&source, &registry, &matrix(), Platform::Wup, APP, "news").await.unwrap();
        assert_eq!(discovery, Discovery::AlreadyKnown);
        assert!(discovery.exists());
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn test_discover_all_keeps_candidate_order() {
        let source = StubSource::default().serving("param", &locale("GB", "ja"), b"");
        let registry = Mutex::new(Registry::in_memory([]));
        let candidates = vec![
            Candidate::new(Platform::Wup, APP, "news"),
            Candidate::new(Platform::Wup, APP, "param"),
        ];

        let results = discover_all(&source, &registry, &matrix(), candidates.clone(), 4).await.unwrap();

        let (returned, discoveries): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        assert_eq!(returned, candidates);
        assert_eq!(discoveries, [Discovery::NotFound, Discovery::Found(locale("GB", "ja"))]);
        assert_eq!(registry.lock().await.get(Platform::Wup, APP).unwrap().tasks, ["param"]);
    }
}
