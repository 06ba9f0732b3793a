//! Content URL reconstruction.
//!
//! File lists name their files but not where to download them from. A file
//! lives under the content base at one of several locale-specific paths, and
//! which one is only discovered by trying them.

use exn::ResultExt;
use spotpass_client::{Endpoints, ManifestSource, Url};
use spotpass_extract::{ManifestFile, parse_manifest};
use spotpass_registry::{Locale, Platform};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::{ErrorKind, Result};

/// A content path layout under `{content_base}/{app_id}/{task}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentTemplate {
    /// `{app_id}/{task}/{filename}`
    Bare,
    /// `{app_id}/{task}/{language}/{filename}`
    Language,
    /// `{app_id}/{task}/{country}/{filename}`
    Country,
    /// `{app_id}/{task}/{language}_{country}/{filename}`
    LanguageCountry,
    /// `{app_id}/{task}/{country}/{language}/{filename}`
    CountryLanguage,
}
impl ContentTemplate {
    /// Every template, least locale-specific first. This is the order in
    /// which they are tried.
    pub const ORDER: [Self; 5] =
        [Self::Bare, Self::Language, Self::Country, Self::LanguageCountry, Self::CountryLanguage];

    fn locale_segments(&self, locale: &Locale) -> Vec<String> {
        let Locale { country, language } = locale;
        match self {
            Self::Bare => vec![],
            Self::Language => vec![language.clone()],
            Self::Country => vec![country.clone()],
            Self::LanguageCountry => vec![format!("{language}_{country}")],
            Self::CountryLanguage => vec![country.clone(), language.clone()],
        }
    }

    pub fn url(&self, endpoints: &Endpoints, app_id: &str, task: &str, locale: &Locale, filename: &str) -> Url {
        let locale = self.locale_segments(locale);
        let segments = [app_id, task].into_iter().chain(locale.iter().map(String::as_str)).chain([filename]);
        endpoints.content_url(segments)
    }
}
impl Display for ContentTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let layout = match self {
            Self::Bare => "{app_id}/{task}/{filename}",
            Self::Language => "{app_id}/{task}/{language}/{filename}",
            Self::Country => "{app_id}/{task}/{country}/{filename}",
            Self::LanguageCountry => "{app_id}/{task}/{language}_{country}/{filename}",
            Self::CountryLanguage => "{app_id}/{task}/{country}/{language}/{filename}",
        };
        write!(f, "{layout}")
    }
}

/// Every URL the crawler would try for `file`, in order.
///
/// Task sheets name one absolute URL per file; it is used verbatim, and an
/// unparsable one yields no candidates at all.
pub fn content_urls(
    endpoints: &Endpoints,
    platform: Platform,
    app_id: &str,
    task: &str,
    locale: &Locale,
    file: &ManifestFile,
) -> Vec<Url> {
    match (platform, &file.url) {
        (Platform::Wup, Some(url)) => Url::parse(url).into_iter().collect(),
        (Platform::Wup, None) => vec![],
        (Platform::Ctr, _) => ContentTemplate::ORDER
            .iter()
            .map(|template| template.url(endpoints, app_id, task, locale, &file.filename))
            .collect(),
    }
}

/// The URLs a crawl of one (app, task, locale) would request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPlan {
    pub manifest: Url,
    /// `None` when no manifest is served for this locale.
    pub files: Option<Vec<(String, Vec<Url>)>>,
}

/// Fetch the manifest for one (app, task, locale) and work out every content
/// URL that would be tried, without downloading any content.
pub async fn plan(
    source: &dyn ManifestSource,
    endpoints: &Endpoints,
    platform: Platform,
    app_id: &str,
    task: &str,
    locale: &Locale,
) -> Result<UrlPlan> {
    let manifest = endpoints.manifest_url(platform, app_id, task, locale);
    let Some(body) = source.manifest(platform, app_id, task, locale).await else {
        return Ok(UrlPlan { manifest, files: None });
    };
    let parsed = parse_manifest(platform, &body).or_raise(|| ErrorKind::Manifest)?;
    let files = parsed
        .files
        .iter()
        .map(|file| (file.filename.clone(), content_urls(endpoints, platform, app_id, task, locale, file)))
        .collect();
    Ok(UrlPlan {
        manifest,
        files: Some(files),
    })
}
