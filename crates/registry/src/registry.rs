//! The persisted application catalog.
//!
//! Every mutation is written back to disk before the mutating call returns,
//! so a crash in the middle of a long discovery scan loses at most the probe
//! that was in flight.

use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::{App, Platform, TitleId, is_app_id};

/// Outcome of merging a batch of `(app_id, task)` pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub new_apps: usize,
    pub new_tasks: usize,
}
impl MergeSummary {
    pub fn is_empty(&self) -> bool {
        self.new_apps == 0 && self.new_tasks == 0
    }
}
impl std::ops::AddAssign for MergeSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.new_apps += rhs.new_apps;
        self.new_tasks += rhs.new_tasks;
    }
}

/// Catalog of applications and their known tasks, for both platforms.
///
/// The on-disk document is a JSON array of [`App`]s. `app_id` is unique
/// within a platform.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    path: Option<PathBuf>,
    apps: Vec<App>,
}
impl Registry {
    /// Load the registry stored at `path`; a missing file is an empty registry.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let apps = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidDocument(path.clone()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io(path.clone())),
        };
        let registry = Self { path: Some(path), apps };
        tracing::debug!(apps = registry.apps.len(), "Loaded registry");
        Ok(registry)
    }

    /// A registry that is never written anywhere (useful for testing).
    pub fn in_memory(apps: impl IntoIterator<Item = App>) -> Self {
        Self { path: None, apps: apps.into_iter().collect() }
    }

    pub fn apps(&self) -> &[App] {
        &self.apps
    }

    pub fn apps_for(&self, platform: Platform) -> impl Iterator<Item = &App> {
        self.apps.iter().filter(move |app| app.platform == platform)
    }

    pub fn get(&self, platform: Platform, app_id: &str) -> Option<&App> {
        self.apps.iter().find(|app| app.platform == platform && app.app_id == app_id)
    }

    fn entry(&mut self, platform: Platform, app_id: &str) -> Result<(&mut App, bool)> {
        if !is_app_id(app_id) {
            exn::bail!(ErrorKind::InvalidAppId(app_id.to_string()));
        }
        let position = self.apps.iter().position(|app| app.platform == platform && app.app_id == app_id);
        Ok(match position {
            Some(index) => (&mut self.apps[index], false),
            None => {
                self.apps.push(App::new(platform, app_id));
                let last = self.apps.len() - 1;
                (&mut self.apps[last], true)
            },
        })
    }

    fn insert(&mut self, platform: Platform, app_id: &str, task: &str) -> Result<MergeSummary> {
        if task.is_empty() {
            exn::bail!(ErrorKind::InvalidTask(task.to_string()));
        }
        let (app, created) = self.entry(platform, app_id)?;
        let added = app.push_task(task);
        Ok(MergeSummary {
            new_apps: usize::from(created),
            new_tasks: usize::from(added),
        })
    }

    /// Record that `task` exists for `app_id`, creating the app if needed.
    ///
    /// Returns `true` if the registry changed. Existing tasks are matched
    /// case-insensitively and never re-cased.
    pub async fn add_task(&mut self, platform: Platform, app_id: &str, task: &str) -> Result<bool> {
        let mut staged = self.clone();
        if staged.insert(platform, app_id, task)?.is_empty() {
            return Ok(false);
        }
        self.commit(staged).await?;
        tracing::info!(%platform, app_id, task, "Task added to registry");
        Ok(true)
    }

    /// Batch form of [`add_task`](Self::add_task), used for dump ingestion.
    /// The batch is all-or-nothing: one invalid pair leaves the registry as
    /// it was, and it is persisted once, after the whole batch.
    pub async fn merge(
        &mut self,
        platform: Platform,
        pairs: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    ) -> Result<MergeSummary> {
        let mut staged = self.clone();
        let mut summary = MergeSummary::default();
        for (app_id, task) in pairs {
            summary += staged.insert(platform, app_id.as_ref(), task.as_ref())?;
        }
        if !summary.is_empty() {
            self.commit(staged).await?;
        }
        Ok(summary)
    }

    /// Set the title id of an app. Set-once: returns `false` without
    /// changing anything if the app already has one (including
    /// [`TitleId::Unknown`]) or does not exist.
    pub async fn set_title_id(&mut self, platform: Platform, app_id: &str, title_id: TitleId) -> Result<bool> {
        let mut staged = self.clone();
        let Some(app) = staged.apps.iter_mut().find(|app| app.platform == platform && app.app_id == app_id) else {
            return Ok(false);
        };
        if app.title_id.is_some() {
            return Ok(false);
        }
        tracing::info!(%platform, app_id, %title_id, "Title id recorded");
        app.title_id = Some(title_id);
        self.commit(staged).await?;
        Ok(true)
    }

    /// Persist `staged` and only then make it the current state, so memory
    /// never runs ahead of disk.
    async fn commit(&mut self, staged: Registry) -> Result<()> {
        staged.persist().await?;
        *self = staged;
        Ok(())
    }

    /// Write the whole document next to its destination and rename it into
    /// place, so readers never observe a half-written catalog.
    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&self.apps).or_raise(|| ErrorKind::InvalidDocument(path.clone()))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        }
        let temporary = path.with_extension("json.tmp");
        fs::write(&temporary, &bytes).await.or_raise(|| ErrorKind::Io(temporary.clone()))?;
        fs::rename(&temporary, path).await.or_raise(|| ErrorKind::Io(path.clone()))?;
        Ok(())
    }
}
