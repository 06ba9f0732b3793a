use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use std::collections::BTreeMap;

/// A successfully downloaded content file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub url: Url,
    pub status: u16,
    /// Response headers, lower-cased names; repeated headers are joined with
    /// `", "`.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

/// Outcome of fetching one content URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    Found(Content),
    /// The server answered with a status that retrying will not change.
    Missing(StatusCode),
    /// Every attempt failed with a transport error or a retryable status.
    Failed { attempts: u32, reason: String },
}

pub(crate) fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.to_string());
    }
    collected
}

/// `true` if the `Content-Type` header names `expected`, ignoring parameters
/// such as `charset`.
pub(crate) fn has_media_type(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, HeaderValue, SET_COOKIE};
    use rstest::rstest;

    #[rstest]
    #[case("text/plain", "text/plain", true)]
    #[case("text/plain; charset=utf-8", "text/plain", true)]
    #[case("Application/XML", "application/xml", true)]
    #[case("text/html", "text/plain", false)]
    #[case("text/plainish", "text/plain", false)]
    fn test_has_media_type(#[case] header: &str, #[case] expected: &str, #[case] matches: bool) {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(header).unwrap());
        assert_eq!(has_media_type(&headers, expected), matches);
    }

    #[test]
    fn test_missing_content_type() {
        assert!(!has_media_type(&HeaderMap::new(), "text/plain"));
    }

    #[test]
    fn test_collect_headers_joins_repeats() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        let collected = collect_headers(&headers);
        assert_eq!(collected["set-cookie"], "a=1, b=2");
        assert_eq!(collected["content-type"], "application/octet-stream");
    }
}
