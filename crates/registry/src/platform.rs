use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// Console ecosystem a BOSS application belongs to.
///
/// The two platforms differ in every remote detail: manifest endpoint,
/// manifest format, expected media type, and how content URLs are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Nintendo 3DS. Plain-text file lists; content URLs are reconstructed.
    Ctr,
    /// Wii U. XML task sheets that carry absolute content URLs.
    Wup,
}
impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Ctr, Platform::Wup];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ctr => "ctr",
            Platform::Wup => "wup",
        }
    }

    /// Media type prefix a valid manifest response must carry.
    pub fn manifest_media_type(&self) -> &'static str {
        match self {
            Platform::Ctr => "text/plain",
            Platform::Wup => "application/xml",
        }
    }

    /// Name under which the raw manifest body is archived.
    pub fn manifest_filename(&self) -> &'static str {
        match self {
            Platform::Ctr => "filelist.txt",
            Platform::Wup => "tasksheet.xml",
        }
    }

    /// Extension of the device dumps that feed this platform's registry.
    pub fn dump_extension(&self) -> &'static str {
        match self {
            Platform::Ctr => "bin",
            Platform::Wup => "db",
        }
    }
}
impl FromStr for Platform {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "ctr" | "3ds" => Self::Ctr,
            "wup" | "wiiu" => Self::Wup,
            _ => exn::bail!(ErrorKind::UnknownPlatform(s.to_string())),
        })
    }
}
impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
