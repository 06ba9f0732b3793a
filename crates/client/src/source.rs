use async_trait::async_trait;
use spotpass_registry::{Locale, Platform};

/// Anything that can answer "does this task have a manifest for this
/// locale?".
///
/// [`Client`](crate::Client) is the real implementation; discovery is written
/// against this trait so that it can be driven by a stub in tests.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// A single manifest request, never retried. `true` only if the server
    /// answered 2xx with the platform's manifest media type; every other
    /// outcome, including transport errors, is `false`.
    async fn probe(&self, platform: Platform, app_id: &str, task: &str, locale: &Locale) -> bool;

    /// As [`probe`](Self::probe), but keeps the body of a positive answer.
    async fn manifest(&self, platform: Platform, app_id: &str, task: &str, locale: &Locale) -> Option<Vec<u8>>;
}
