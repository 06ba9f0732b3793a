use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::Platform;

const APP_ID_LENGTH: usize = 16;
const UNKNOWN_TITLE_ID: &str = "unknown";

/// Task names compare case-insensitively but are stored verbatim.
///
/// The stored casing is the one used to build URLs, so callers must never
/// normalise a task name before storing it; compare with this instead.
pub fn same_task(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Returns `true` if `id` has the shape of a BOSS application identifier
/// (16 ASCII alphanumeric characters).
pub fn is_app_id(id: &str) -> bool {
    id.len() == APP_ID_LENGTH && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Title identifier of the game owning a BOSS application.
///
/// [`Unknown`](Self::Unknown) is a terminal value: the title was searched for
/// and the server never revealed it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TitleId {
    Known(String),
    Unknown,
}
impl TitleId {
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}
impl From<String> for TitleId {
    fn from(value: String) -> Self {
        match value.eq_ignore_ascii_case(UNKNOWN_TITLE_ID) {
            true => Self::Unknown,
            false => Self::Known(value),
        }
    }
}
impl From<TitleId> for String {
    fn from(value: TitleId) -> Self {
        match value {
            TitleId::Known(id) => id,
            TitleId::Unknown => UNKNOWN_TITLE_ID.to_string(),
        }
    }
}
impl Display for TitleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Known(id) => write!(f, "{id}"),
            Self::Unknown => write!(f, "{UNKNOWN_TITLE_ID}"),
        }
    }
}

/// A BOSS application and the tasks known to exist for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub app_id: String,
    pub platform: Platform,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_id: Option<TitleId>,
}
impl App {
    pub fn new(platform: Platform, app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            platform,
            tasks: Vec::new(),
            title_id: None,
        }
    }

    pub fn has_task(&self, task: &str) -> bool {
        self.tasks.iter().any(|known| same_task(known, task))
    }

    /// Adds `task` unless an equivalent name is already present. Returns
    /// whether the task list changed.
    pub(crate) fn push_task(&mut self, task: &str) -> bool {
        if self.has_task(task) {
            return false;
        }
        self.tasks.push(task.to_string());
        true
    }
}
