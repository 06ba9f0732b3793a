//! Configuration for the archiver.
//!
//! Sources are layered with [`figment`], later sources overriding earlier
//! ones:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. a TOML, YAML or JSON file (an explicit path, or `config.toml` in the
//!    platform configuration directory if it exists),
//! 3. environment variables prefixed `SPOTPASS_`, using `__` to separate
//!    nested keys (`SPOTPASS_NETWORK__CONCURRENCY=4`).

pub mod error;

use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use spotpass_registry::{COUNTRIES, LANGUAGES, LocaleMatrix, Platform};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ErrorKind, Result};

const ENV_PREFIX: &str = "SPOTPASS_";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub queue: QueueConfig,
    pub archive: ArchiveConfig,
    pub network: NetworkConfig,
    pub endpoints: EndpointConfig,
    pub locales: LocaleConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON catalog of known applications and tasks.
    pub path: PathBuf,
}
impl Default for RegistryConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("data/apps.json") }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// SQLite database holding the work queue.
    pub path: PathBuf,
    /// Work items claimed per drain iteration.
    pub batch_size: u32,
    /// Seconds after which an unfinished claim may be taken by another run.
    pub claim_lease_secs: u64,
}
impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/tasks.db"),
            batch_size: 50,
            claim_lease_secs: 60 * 60,
        }
    }
}
impl QueueConfig {
    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory every run is archived under.
    pub root: PathBuf,
    /// Ledger file, relative to the archive root.
    pub ledger: PathBuf,
}
impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/archive"),
            ledger: PathBuf::from("ledger.jsonl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// PEM client certificate presented to both platforms' servers.
    pub certificate: Option<PathBuf>,
    /// PEM private key matching `certificate`.
    pub key: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Upper bound on concurrent requests-in-flight units (apps being
    /// discovered, or work items being crawled).
    pub concurrency: usize,
    /// Attempts per content URL before the file is recorded as failed.
    pub retries: u32,
    /// Base delay of the exponential backoff between content attempts.
    pub retry_backoff_ms: u64,
}
impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            certificate: None,
            key: None,
            timeout_secs: 30,
            concurrency: 16,
            retries: 5,
            retry_backoff_ms: 500,
        }
    }
}
impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// 3DS file list base URL.
    pub ctr_filelist: String,
    /// 3DS content base URL.
    pub ctr_content: String,
    /// Wii U task sheet base URL.
    pub wup_tasksheet: String,
}
impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            ctr_filelist: "https://npfl.c.app.nintendowifi.net/p01/filelist".to_string(),
            ctr_content: "https://npdl.cdn.nintendowifi.net/p01/nsa".to_string(),
            wup_tasksheet: "https://npts.app.nintendo.net/p01/tasksheet/1".to_string(),
        }
    }
}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    pub countries: Vec<String>,
    pub languages: Vec<String>,
}
impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            countries: COUNTRIES.iter().map(|c| c.to_string()).collect(),
            languages: LANGUAGES.iter().map(|l| l.to_string()).collect(),
        }
    }
}
impl LocaleConfig {
    pub fn matrix(&self) -> Result<LocaleMatrix> {
        LocaleMatrix::new(&self.countries, &self.languages)
            .or_raise(|| ErrorKind::invalid("locales", "locale codes must be two alphanumeric characters"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Candidate task names probed for every platform A app.
    pub ctr: Vec<String>,
    /// Candidate task names probed for every platform B app.
    pub wup: Vec<String>,
}
impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ctr: vec!["FGONLYT".to_string()],
            wup: vec!["news".to_string(), "param".to_string()],
        }
    }
}
impl DiscoveryConfig {
    pub fn candidates(&self, platform: Platform) -> &[String] {
        match platform {
            Platform::Ctr => &self.ctr,
            Platform::Wup => &self.wup,
        }
    }
}

impl Config {
    /// Load and validate the configuration.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let figment = Self::figment(path)?;
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        let file = match path {
            Some(path) if !path.exists() => exn::bail!(ErrorKind::MissingFile(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Loading configuration file");
            figment = match file.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(&file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(&file)),
                Some("json") => figment.merge(Json::file(&file)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(file)),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// `config.toml` inside the platform's configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "spotpass").map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.network.certificate, &self.network.key) {
            (Some(_), None) => exn::bail!(ErrorKind::invalid("network.key", "a certificate requires a key")),
            (None, Some(_)) => exn::bail!(ErrorKind::invalid("network.certificate", "a key requires a certificate")),
            _ => {},
        }
        if self.network.concurrency == 0 {
            exn::bail!(ErrorKind::invalid("network.concurrency", "must be at least 1"));
        }
        if self.network.retries == 0 {
            exn::bail!(ErrorKind::invalid("network.retries", "must be at least 1"));
        }
        if self.queue.batch_size == 0 {
            exn::bail!(ErrorKind::invalid("queue.batch_size", "must be at least 1"));
        }
        for (field, url) in [
            ("endpoints.ctr_filelist", &self.endpoints.ctr_filelist),
            ("endpoints.ctr_content", &self.endpoints.ctr_content),
            ("endpoints.wup_tasksheet", &self.endpoints.wup_tasksheet),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                exn::bail!(ErrorKind::invalid(field, format!("not an http(s) URL: {url}")));
            }
        }
        if self.locales.matrix()?.is_empty() {
            exn::bail!(ErrorKind::invalid("locales", "at least one country and one language are required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.locales.matrix().unwrap().len(), COUNTRIES.len() * LANGUAGES.len());
        assert_eq!(config.discovery.candidates(Platform::Wup), ["news", "param"]);
    }

    #[test]
    fn test_file_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "spotpass.toml",
                r#"
                    [network]
                    concurrency = 4
                    retries = 2

                    [locales]
                    countries = ["US", "JP"]
                    languages = ["en", "ja"]
                "#,
            )?;
            jail.set_env("SPOTPASS_QUEUE__BATCH_SIZE", "7");
            let config = Config::load(Some(Path::new("spotpass.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.network.concurrency, 4);
            assert_eq!(config.network.retries, 2);
            assert_eq!(config.network.timeout_secs, 30);
            assert_eq!(config.queue.batch_size, 7);
            assert_eq!(config.locales.matrix().map_err(|e| e.to_string())?.len(), 4);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingFile(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, "").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[rstest]
    #[case::half_mtls(|c: &mut Config| c.network.certificate = Some(PathBuf::from("client.crt")))]
    #[case::zero_concurrency(|c: &mut Config| c.network.concurrency = 0)]
    #[case::zero_retries(|c: &mut Config| c.network.retries = 0)]
    #[case::zero_batch(|c: &mut Config| c.queue.batch_size = 0)]
    #[case::bad_endpoint(|c: &mut Config| c.endpoints.ctr_content = "ftp://example.com".to_string())]
    #[case::bad_locale(|c: &mut Config| c.locales.countries = vec!["USA".to_string()])]
    #[case::no_languages(|c: &mut Config| c.locales.languages.clear())]
    fn test_validation_failures(#[case] mutate: fn(&mut Config)) {
        let mut config = Config::default();
        mutate(&mut config);
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { .. }));
    }
}
