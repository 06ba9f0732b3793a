pub mod backend;
pub mod error;
mod ledger;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::ledger::{Ledger, LedgerEntry};
pub use crate::path::{is_file_name, validate as validate_path};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
