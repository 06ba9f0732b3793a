//! Archive key validation.
//!
//! Every key handed to a backend is relative to the backend root. Parts of
//! a key (file names from manifests, task names from dumps) are remote input,
//! so keys are checked component by component before they touch a backend.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates an archive key and returns it in normal form.
///
/// Keys may only contain plain names. `.` components and repeated or
/// trailing separators are dropped; a `..` anywhere, a root, a prefix or a
/// NUL byte rejects the key with [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
/// Unlike lexical normalisation, `a/../b` is rejected rather than resolved
/// to `b`: nothing the archiver writes needs a parent reference.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use spotpass_storage::validate_path;
///
/// assert_eq!(
///     validate_path("2026-10-18//US/./en/1122334455667788/news/").unwrap(),
///     Path::new("2026-10-18/US/en/1122334455667788/news"),
/// );
/// assert!(validate_path("US/en/../../escape").is_err());
/// assert!(validate_path("/etc/passwd").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut key = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(name) if is_clean(name) => key.push(name),
            Component::CurDir => {},
            _ => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
        }
    }
    if key.as_os_str().is_empty() {
        exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
    }
    Ok(key)
}

/// Whether `name` can be stored as-is as the last component of a key: a
/// single plain component with no separators, NUL bytes or dot segments.
pub fn is_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(first)), None) => is_clean(first) && first == OsStr::new(name),
        _ => false,
    }
}

// NULs pass through `Path::components()` on Unix but truncate in syscalls.
fn is_clean(name: &OsStr) -> bool {
    !name.as_encoded_bytes().contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ledger.jsonl", "ledger.jsonl")]
    #[case("US/en/news.boss", "US/en/news.boss")]
    #[case("a//b/./c", "a/b/c")]
    #[case("US/en///", "US/en")]
    #[case("./filelist.txt", "filelist.txt")]
    fn test_valid_keys(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(validate(key).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case::parent("..")]
    #[case::escape("../etc/passwd")]
    #[case::escape_deeper("a/../../b")]
    #[case::resolvable("a/../b")]
    #[case::trailing_parent("a/b/..")]
    #[case::absolute("/srv/archive/file")]
    #[case::nul("a\0b")]
    #[case::empty("")]
    #[case::only_dots("./.")]
    #[case::only_slashes("//")]
    fn test_invalid_keys(#[case] key: &str) {
        let err = validate(key).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(p) if p == Path::new(key)));
    }

    #[cfg(windows)]
    #[test]
    fn test_backslash_separators() {
        assert_eq!(validate("a\\b/c").unwrap(), Path::new("a/b/c"));
        assert!(!is_file_name("a\\b"));
    }

    #[rstest]
    #[case("file.bin", true)]
    #[case("PH M#1", true)]
    #[case("..hidden", true)]
    #[case("../escape", false)]
    #[case("nested/file", false)]
    #[case("trailing/", false)]
    #[case("/absolute", false)]
    #[case("./file", false)]
    #[case(".", false)]
    #[case("..", false)]
    #[case("nul\0byte", false)]
    #[case("", false)]
    fn test_is_file_name(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_file_name(name), expected);
    }
}
