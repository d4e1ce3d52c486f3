//! Working out which font a url refers to, and what kind of font it is.

use std::{
    fmt::{self, Display},
    path::Path,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Matches the fonts we are willing to subset.
pub const DEFAULT_FONT_EXTENSIONS: &str = r"(?i)\.(woff2?|ttf|eot|otf)$";

/// Drop `?query` and `#fragment` from a url.
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// The last path segment of a url or path, query and fragment removed.
pub fn file_name(url: &str) -> &str {
    let url = strip_query(url);
    url.rsplit(['/', '\\']).next().unwrap_or(url)
}

/// A stable key for "the same underlying font".
///
/// Built from the file name alone, with trailing content hashes and version
/// tags dropped, so `inter-latin-400-normal.3f9a2b1c.woff2` and
/// `inter-latin-400-normal.woff2?v=2` are one font.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FontIdentity(String);

impl FontIdentity {
    pub fn from_file_name(url: &str) -> FontIdentity {
        let name = file_name(url);
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, ext.to_ascii_lowercase()),
            _ => (name, String::new()),
        };
        let stem = strip_hashes(stem);
        if ext.is_empty() {
            FontIdentity(stem.to_string())
        } else {
            FontIdentity(format!("{stem}.{ext}"))
        }
    }

    pub fn from_path(path: &Path) -> FontIdentity {
        FontIdentity::from_file_name(&path.to_string_lossy())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity without its extension
    pub fn stem(&self) -> &str {
        self.0.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(&self.0)
    }

    /// Lowercase, possibly empty
    pub fn extension(&self) -> &str {
        self.0.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
    }
}

impl Display for FontIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_hashes(mut stem: &str) -> &str {
    loop {
        if let Some((head, tail)) = stem.rsplit_once('.') {
            if !head.is_empty() && looks_like_dotted_hash(tail) {
                stem = head;
                continue;
            }
        }
        if let Some((head, tail)) = stem.rsplit_once('-') {
            if !head.is_empty() && looks_like_dashed_hash(tail) {
                stem = head;
                continue;
            }
        }
        return stem;
    }
}

fn hash_chars(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

// name.3f9a2b1c.woff2, name.v2.woff2, name.deadbeef.woff2
fn looks_like_dotted_hash(segment: &str) -> bool {
    hash_chars(segment)
        && (segment.bytes().any(|b| b.is_ascii_digit())
            || (segment.len() >= 8 && segment.bytes().all(|b| b.is_ascii_hexdigit())))
}

// name-3f9a2b1c.woff2, but not name-semibold.woff2 or name-400.woff2
fn looks_like_dashed_hash(segment: &str) -> bool {
    hash_chars(segment)
        && segment.len() >= 8
        && segment.bytes().any(|b| b.is_ascii_digit())
        && segment.bytes().any(|b| b.is_ascii_alphabetic())
}

/// The binary flavour to ask the subsetter for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Woff,
    Woff2,
    TrueType,
    OpenType,
    Eot,
}

impl TargetFormat {
    /// Unrecognized extensions get woff2.
    pub fn from_extension(ext: &str) -> TargetFormat {
        match ext.to_ascii_lowercase().as_str() {
            "woff" => TargetFormat::Woff,
            "woff2" => TargetFormat::Woff2,
            "ttf" => TargetFormat::TrueType,
            "otf" => TargetFormat::OpenType,
            "eot" => TargetFormat::Eot,
            _ => TargetFormat::Woff2,
        }
    }

    /// As used in `format(...)` hints
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Woff => "woff",
            TargetFormat::Woff2 => "woff2",
            TargetFormat::TrueType => "truetype",
            TargetFormat::OpenType => "opentype",
            TargetFormat::Eot => "embedded-opentype",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Woff => "woff",
            TargetFormat::Woff2 => "woff2",
            TargetFormat::TrueType => "ttf",
            TargetFormat::OpenType => "otf",
            TargetFormat::Eot => "eot",
        }
    }
}

impl Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which `src` urls are fonts worth subsetting.
#[derive(Debug, Clone)]
pub struct FontExtensions(Regex);

impl FontExtensions {
    pub fn new(pattern: &str) -> Result<FontExtensions, Error> {
        Regex::new(pattern)
            .map(FontExtensions)
            .map_err(|source| Error::BadPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.0.is_match(strip_query(url))
    }
}
