use std::fmt::{Display, Formatter, Result as FmtResult};

/// A file advertised by a task manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    pub filename: String,
    /// Absolute download URL. Only task sheets carry one; file list entries
    /// must have their URL reconstructed.
    pub url: Option<String>,
    pub size: Option<u64>,
}
impl ManifestFile {
    pub fn named(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            url: None,
            size: None,
        }
    }
}

/// Parsed form of either manifest format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Upper-cased title id, when the format carries one.
    pub title_id: Option<String>,
    pub files: Vec<ManifestFile>,
}

/// An `(app_id, task)` pair recovered from a device dump.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef {
    pub app_id: String,
    pub task: String,
}
impl TaskRef {
    pub fn new(app_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            task: task.into(),
        }
    }

    pub fn as_pair(&self) -> (&str, &str) {
        (&self.app_id, &self.task)
    }
}
impl Display for TaskRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.app_id, self.task)
    }
}
