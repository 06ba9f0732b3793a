//! Catalog of BOSS applications and the locale matrix they are probed across.
//!
//! The registry is the long-lived state of the archiver: dump ingestion and
//! task discovery add to it, queue builds read from it. It is small enough to
//! be held in memory and rewritten in full on every change.

mod app;
pub mod error;
mod locale;
mod platform;
mod registry;

pub use crate::app::{App, TitleId, is_app_id, same_task};
pub use crate::locale::{COUNTRIES, LANGUAGES, Locale, LocaleMatrix};
pub use crate::platform::Platform;
pub use crate::registry::{MergeSummary, Registry};
