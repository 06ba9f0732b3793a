use exn::ResultExt;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::models::{Manifest, ManifestFile};

const ROOT: &str = "TaskSheet";

#[derive(Default)]
struct PartialFile {
    filename: Option<String>,
    url: Option<String>,
    size: Option<u64>,
}
impl PartialFile {
    fn finish(self) -> Result<ManifestFile> {
        let Some(filename) = self.filename.filter(|f| !f.is_empty()) else {
            exn::bail!(ErrorKind::MissingField("File/Filename"));
        };
        let Some(url) = self.url.filter(|u| !u.is_empty()) else {
            exn::bail!(ErrorKind::MissingField("File/Url"));
        };
        Ok(ManifestFile {
            filename,
            url: Some(url),
            size: self.size,
        })
    }
}

/// Parse a Wii U task sheet.
///
/// Files are read from `TaskSheet/Files/File` (zero, one or many entries),
/// each of which must name its `Filename` and absolute `Url`. The title id
/// at `TaskSheet/TitleId` is upper-cased.
#[instrument(skip(body), fields(size = body.len()))]
pub fn parse_tasksheet(body: &[u8]) -> Result<Manifest> {
    let text = std::str::from_utf8(body).or_raise(|| ErrorKind::InvalidEncoding)?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut manifest = Manifest::default();
    let mut current: Option<PartialFile> = None;
    let mut seen_root = false;

    loop {
        match reader.read_event().or_raise(|| ErrorKind::MalformedXml)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if path.is_empty() {
                    if name != ROOT {
                        exn::bail!(ErrorKind::UnexpectedRoot(name));
                    }
                    seen_root = true;
                }
                path.push(name);
                if path == [ROOT, "Files", "File"] {
                    current = Some(PartialFile::default());
                }
            },
            Event::End(_) => {
                if path == [ROOT, "Files", "File"]
                    && let Some(file) = current.take()
                {
                    manifest.files.push(file.finish()?);
                }
                path.pop();
            },
            Event::Empty(e) if path.is_empty() => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name != ROOT {
                    exn::bail!(ErrorKind::UnexpectedRoot(name));
                }
                seen_root = true;
            },
            Event::Text(e) => {
                let value = e.unescape().or_raise(|| ErrorKind::MalformedXml)?.trim().to_string();
                match (path.as_slice(), current.as_mut()) {
                    ([root, tag], _) if root == ROOT && tag == "TitleId" => {
                        manifest.title_id = Some(value.to_ascii_uppercase());
                    },
                    ([root, files, file, tag], Some(partial)) if root == ROOT && files == "Files" && file == "File" => {
                        match tag.as_str() {
                            "Filename" => partial.filename = Some(value),
                            "Url" => partial.url = Some(value),
                            "Size" => partial.size = value.parse().ok(),
                            _ => {},
                        }
                    },
                    _ => {},
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if !seen_root {
        exn::bail!(ErrorKind::MissingField(ROOT));
    }
    tracing::trace!(files = manifest.files.len(), title_id = ?manifest.title_id, "Parsed task sheet");
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TaskSheet>
  <TitleId>0005000010101e00</TitleId>
  <TaskId>news</TaskId>
  <ServiceStatus>open</ServiceStatus>
  <Files>
    <File>
      <Filename>00001</Filename>
      <DataId>123</DataId>
      <Url>https://npdi.cdn.nintendowifi.net/p01/data/1/1122334455667788/123/abc</Url>
      <Size>4096</Size>
    </File>
    <File>
      <Filename>00002</Filename>
      <Url>https://npdi.cdn.nintendowifi.net/p01/data/1/1122334455667788/124/def?a=1&amp;b=2</Url>
    </File>
  </Files>
</TaskSheet>"#;

    #[test]
    fn test_parses_files_and_title_id() {
        let manifest = parse_tasksheet(SHEET.as_bytes()).unwrap();
        assert_eq!(manifest.title_id.as_deref(), Some("0005000010101E00"));
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files[0].filename, "00001");
        assert_eq!(manifest.files[0].size, Some(4096));
        assert_eq!(
            manifest.files[1].url.as_deref(),
            Some("https://npdi.cdn.nintendowifi.net/p01/data/1/1122334455667788/124/def?a=1&b=2")
        );
        assert_eq!(manifest.files[1].size, None);
    }

    #[test]
    fn test_sheet_without_files() {
        let body = b"<TaskSheet><TitleId>00050000101C9500</TitleId></TaskSheet>";
        let manifest = parse_tasksheet(body).unwrap();
        assert!(manifest.files.is_empty());
        assert_eq!(manifest.title_id.as_deref(), Some("00050000101C9500"));
    }

    #[rstest]
    #[case::wrong_root(b"<Error><Code>404</Code></Error>".as_slice(), ErrorKind::UnexpectedRoot("Error".to_string()))]
    #[case::empty(b"".as_slice(), ErrorKind::MissingField("TaskSheet"))]
    #[case::file_without_url(
        b"<TaskSheet><Files><File><Filename>a</Filename></File></Files></TaskSheet>".as_slice(),
        ErrorKind::MissingField("File/Url")
    )]
    #[case::mismatched(b"<TaskSheet><Files></TaskSheet>".as_slice(), ErrorKind::MalformedXml)]
    fn test_malformed(#[case] body: &[u8], #[case] expected: ErrorKind) {
        let err = parse_tasksheet(body).unwrap_err();
        assert_eq!(&*err, &expected);
    }
}
