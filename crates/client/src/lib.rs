//! HTTP access to the BOSS servers.
//!
//! Two kinds of request are made: manifest requests against a platform's
//! manifest endpoint, whose answer is judged by status and media type alone,
//! and content downloads, which are retried with backoff.

mod client;
pub mod error;
mod fetch;
mod source;

pub use crate::client::{Client, Endpoints};
pub use crate::fetch::{Content, Fetch};
pub use crate::source::ManifestSource;
pub use reqwest::{StatusCode, Url};
