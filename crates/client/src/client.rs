use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{StatusCode, Url};
use spotpass_config::{EndpointConfig, NetworkConfig};
use spotpass_registry::{Locale, Platform};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::fetch::{Content, Fetch, collect_headers, has_media_type};
use crate::source::ManifestSource;

const USER_AGENT: &str = concat!("spotpass/", env!("CARGO_PKG_VERSION"));
// Caps the exponential backoff at 64 times the base delay.
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

/// Base URLs of the three BOSS endpoints, validated once up front so that
/// building a request URL cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub ctr_filelist: Url,
    pub ctr_content: Url,
    pub wup_tasksheet: Url,
}
impl Endpoints {
    pub fn from_config(config: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            ctr_filelist: Self::parse(&config.ctr_filelist)?,
            ctr_content: Self::parse(&config.ctr_content)?,
            wup_tasksheet: Self::parse(&config.wup_tasksheet)?,
        })
    }

    fn parse(raw: &str) -> Result<Url> {
        let url = Url::parse(raw).or_raise(|| ErrorKind::InvalidUrl(raw.to_string()))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            exn::bail!(ErrorKind::InvalidUrl(raw.to_string()));
        }
        Ok(url)
    }

    fn join<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = base.clone();
        // Infallible: every base was checked by `parse`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `GET {base}/{app_id}/{task}?c={country}&l={language}`
    pub fn manifest_url(&self, platform: Platform, app_id: &str, task: &str, locale: &Locale) -> Url {
        let base = match platform {
            Platform::Ctr => &self.ctr_filelist,
            Platform::Wup => &self.wup_tasksheet,
        };
        let mut url = Self::join(base, [app_id, task]);
        url.query_pairs_mut()
            .append_pair("c", &locale.country)
            .append_pair("l", &locale.language);
        url
    }

    /// 3DS content URL: the content base followed by `segments`.
    pub fn content_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        Self::join(&self.ctr_content, segments)
    }
}

/// HTTP client for both platforms' BOSS servers.
///
/// Every request presents the configured client certificate. Server
/// certificates are NOT verified: the BOSS servers present certificates
/// issued by a private authority, so this is a deliberate transport
/// exception rather than an oversight.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    endpoints: Endpoints,
    retries: u32,
    backoff: Duration,
}

impl Client {
    pub fn new(network: &NetworkConfig, endpoints: &EndpointConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(true)
            .timeout(network.timeout())
            .user_agent(USER_AGENT);
        match (&network.certificate, &network.key) {
            (Some(certificate), Some(key)) => builder = builder.identity(Self::identity(certificate, key)?),
            (None, None) => tracing::warn!("No client certificate configured; BOSS servers will refuse requests"),
            (Some(path), None) | (None, Some(path)) => exn::bail!(ErrorKind::Identity(path.clone())),
        }
        Ok(Self {
            http: builder.build().or_raise(|| ErrorKind::Build)?,
            endpoints: Endpoints::from_config(endpoints)?,
            retries: network.retries.max(1),
            backoff: network.retry_backoff(),
        })
    }

    /// Certificate and key as one PEM bundle, the form rustls identities are
    /// loaded from.
    fn identity(certificate: &Path, key: &Path) -> Result<reqwest::Identity> {
        let mut pem = std::fs::read(certificate).or_raise(|| ErrorKind::Identity(certificate.to_path_buf()))?;
        pem.push(b'\n');
        pem.extend(std::fs::read(key).or_raise(|| ErrorKind::Identity(key.to_path_buf()))?);
        reqwest::Identity::from_pem(&pem).or_raise(|| ErrorKind::Identity(certificate.to_path_buf()))
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
        self.backoff.saturating_mul(1 << doublings)
    }

    async fn manifest_response(
        &self,
        platform: Platform,
        app_id: &str,
        task: &str,
        locale: &Locale,
    ) -> Option<reqwest::Response> {
        let url = self.endpoints.manifest_url(platform, app_id, task, locale);
        match self.http.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                let found = status.is_success() && has_media_type(response.headers(), platform.manifest_media_type());
                tracing::trace!(%url, status = status.as_u16(), found, "Manifest request");
                found.then_some(response)
            },
            Err(error) => {
                tracing::debug!(%url, %error, "Manifest request failed");
                None
            },
        }
    }

    /// Download one content URL, retrying transport errors, 5xx and 429 with
    /// exponential backoff up to the configured number of attempts.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Fetch {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let reason = match self.http.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    let status = response.status().as_u16();
                    let headers = collect_headers(response.headers());
                    match response.bytes().await {
                        Ok(body) => {
                            return Fetch::Found(Content {
                                url: url.clone(),
                                status,
                                headers,
                                body: body.to_vec(),
                            });
                        },
                        Err(error) => format!("reading body: {error}"),
                    }
                },
                Ok(response) if is_retryable(response.status()) => format!("HTTP {}", response.status()),
                Ok(response) => return Fetch::Missing(response.status()),
                Err(error) => error.to_string(),
            };
            if attempt >= self.retries {
                return Fetch::Failed { attempts: attempt, reason };
            }
            let delay = self.backoff_for(attempt);
            tracing::debug!(attempt, %reason, ?delay, "Retrying content fetch");
            tokio::time::sleep(delay).await;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl ManifestSource for Client {
    async fn probe(&self, platform: Platform, app_id: &str, task: &str, locale: &Locale) -> bool {
        // Dropping the response without reading the body; only the headers
        // decide a probe.
        self.manifest_response(platform, app_id, task, locale).await.is_some()
    }

    async fn manifest(&self, platform: Platform, app_id: &str, task: &str, locale: &Locale) -> Option<Vec<u8>> {
        let response = self.manifest_response(platform, app_id, task, locale).await?;
        match response.bytes().await {
            Ok(body) => Some(body.to_vec()),
            Err(error) => {
                tracing::warn!(%platform, app_id, task, %locale, %error, "Manifest body could not be read");
                None
            },
        }
    }
}
