//! Locales and the ordered locale matrix.
//!
//! Which (country, language) pairs a task answers to is undocumented, so both
//! discovery and crawling walk the full matrix. The walk order is part of the
//! contract: discovery reports the *first* matching locale in matrix order.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::{ErrorKind, Result};

/// Every country code the consoles can report, in probe order.
pub const COUNTRIES: &[&str] = &[
    "GB", "US", "IT", "NL", "DE", "CA", "FR", "HU", "CR", "AU", "BR", "RO", "CL", "MX", "RU", "ES", "JP", "CZ", "PT",
    "MT", "AR", "SE", "PL", "IE", "BE", "HT", "NO", "FI", "GR", "BO", "AT", "VE", "PA", "PE", "GF", "SA", "CO", "LT",
    "NA", "CH", "CY", "RS", "KY", "GP", "DK", "KR", "LU", "SV", "VA", "GT", "SK", "HR", "ZA", "DO", "UY", "LV", "HN",
    "JM", "TR", "IN", "ER", "AW", "NZ", "EC", "TW", "EE", "CN", "SI", "AI", "BG", "NI", "IS", "MQ", "BZ", "BA", "MY",
    "AZ", "ZW", "AL", "IM", "VG", "VI", "BM", "GY", "SR", "MS", "TC", "BB", "TT", "AG", "BS", "DM", "GD", "AN", "PY",
    "KN", "LC", "VC", "BW", "LS", "LI", "MK", "ME", "MZ", "SZ", "ZM", "MR", "ML", "NE", "TD", "SD", "DJ", "SO", "AD",
    "GI", "JE", "MC", "HK", "MO", "ID", "SG", "TH", "PH", "AE", "EG", "OM", "QA", "KW", "SY", "BH", "JO", "SM",
];

/// Every language code the consoles can report, in probe order.
pub const LANGUAGES: &[&str] = &["en", "it", "de", "fr", "es", "pt", "ru", "ja", "nl", "ko", "zh", "tw"];

/// A (country, language) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Locale {
    pub country: String,
    pub language: String,
}
impl Locale {
    /// Both codes must be exactly two ASCII alphanumeric characters. Casing is
    /// preserved; the remote service is queried with the codes as given.
    pub fn new(country: impl Into<String>, language: impl Into<String>) -> Result<Self> {
        let country = country.into();
        let language = language.into();
        for code in [&country, &language] {
            if !is_locale_code(code) {
                exn::bail!(ErrorKind::InvalidLocale(code.clone()));
            }
        }
        Ok(Self { country, language })
    }
}
impl Display for Locale {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.country, self.language)
    }
}

fn is_locale_code(code: &str) -> bool {
    code.len() == 2 && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Fixed, ordered set of locales.
///
/// Built country-major: every language of the first country, then every
/// language of the second, and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleMatrix {
    locales: Vec<Locale>,
}
impl LocaleMatrix {
    /// Cross product of `countries` × `languages`, preserving both orders.
    /// Duplicate pairs are dropped (first occurrence wins).
    pub fn new(
        countries: impl IntoIterator<Item = impl AsRef<str>>,
        languages: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let languages: Vec<String> = languages.into_iter().map(|l| l.as_ref().to_string()).collect();
        let mut locales = Vec::new();
        for country in countries {
            for language in &languages {
                locales.push(Locale::new(country.as_ref(), language.as_str())?);
            }
        }
        Ok(Self::from_locales(locales))
    }

    /// Use an explicit list of locales, in the order given.
    pub fn from_locales(locales: impl IntoIterator<Item = Locale>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let locales = locales.into_iter().filter(|l| seen.insert(l.clone())).collect();
        Self { locales }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Locale> {
        self.locales.iter()
    }

    pub fn len(&self) -> usize {
        self.locales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }
}
impl Default for LocaleMatrix {
    fn default() -> Self {
        // The built-in lists are valid by construction.
        let locales = COUNTRIES
            .iter()
            .flat_map(|c| LANGUAGES.iter().map(move |l| Locale { country: c.to_string(), language: l.to_string() }));
        Self::from_locales(locales)
    }
}
impl<'a> IntoIterator for &'a LocaleMatrix {
    type Item = &'a Locale;
    type IntoIter = std::slice::Iter<'a, Locale>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
