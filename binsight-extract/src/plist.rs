//! Apple PropertyList support.
//!
//! macOS application bundles describe themselves in `Contents/Info.plist`.
//! For an executable inside a bundle, the plist's `CFBundleName`,
//! `CFBundleDisplayName` and `CFBundleShortVersionString` entries take
//! precedence over anything recovered from the binary itself.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use elementtree::Element;
use thiserror::Error;

/// The error type for handling an [`InfoPlist`].
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct PlistError {
    kind: PlistErrorKind,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl From<elementtree::Error> for PlistError {
    fn from(source: elementtree::Error) -> Self {
        Self {
            kind: PlistErrorKind::Xml,
            source: Some(Box::new(source)),
        }
    }
}

impl From<PlistErrorKind> for PlistError {
    fn from(kind: PlistErrorKind) -> Self {
        Self { kind, source: None }
    }
}

/// Error kind for [`PlistError`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlistErrorKind {
    /// The plist did not have the expected XML schema.
    Schema,
    /// There was an XML parsing error.
    Xml,
}

impl fmt::Display for PlistErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "XML structure did not match expected schema"),
            Self::Xml => write!(f, "Invalid XML"),
        }
    }
}

/// A parsed `Info.plist` dictionary.
///
/// Only top-level string values are captured; nested arrays and dictionaries
/// are not needed for component identification.
#[derive(Clone, Debug)]
pub struct InfoPlist {
    map: HashMap<String, String>,
}

impl InfoPlist {
    /// Tests whether the buffer could contain a property list.
    pub fn test(bytes: &[u8]) -> bool {
        bytes.starts_with(b"<?xml") || bytes.starts_with(b"<plist")
    }

    /// Parses the plist, creating a new in-memory representation of it.
    pub fn parse(data: &[u8]) -> Result<Self, PlistError> {
        let mut map = HashMap::new();
        let plist = Element::from_reader(Cursor::new(data))?;

        let dict = plist
            .find("dict")
            .ok_or(PlistError::from(PlistErrorKind::Schema))?;

        let mut last_key = None;
        for element in dict.children() {
            match last_key.take() {
                None => {
                    if element.tag().name() != "key" {
                        return Err(PlistError::from(PlistErrorKind::Schema));
                    }
                    last_key = Some(element.text().to_string());
                }
                Some(key) => {
                    if element.tag().name() == "string" {
                        map.insert(key, element.text().to_string());
                    }
                }
            }
        }

        Ok(Self { map })
    }

    /// Locates and parses the `Info.plist` for a bundle executable.
    ///
    /// Returns `None` when the path is not inside an `.app` bundle or the
    /// plist is missing or malformed.
    pub fn for_bundle_executable(path: &Path) -> Option<Self> {
        let plist_path = bundle_plist_path(path)?;
        let data = std::fs::read(plist_path).ok()?;
        Self::parse(&data).ok()
    }

    /// Looks up an arbitrary string entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// The `CFBundleName` entry.
    pub fn bundle_name(&self) -> Option<&str> {
        self.get("CFBundleName")
    }

    /// The `CFBundleDisplayName` entry.
    pub fn display_name(&self) -> Option<&str> {
        self.get("CFBundleDisplayName")
    }

    /// The `CFBundleShortVersionString` entry.
    pub fn short_version(&self) -> Option<&str> {
        self.get("CFBundleShortVersionString")
    }
}

/// Derives the `Info.plist` path for an executable inside an `.app` bundle.
pub(crate) fn bundle_plist_path(path: &Path) -> Option<PathBuf> {
    let text = path.to_string_lossy();

    if let Some(pos) = text.find(".app/Contents/MacOS/") {
        let bundle_root = &text[..pos + 4];
        return Some(PathBuf::from(format!("{bundle_root}/Contents/Info.plist")));
    }

    if text.ends_with(".app") {
        return Some(path.join("Contents/Info.plist"));
    }

    None
}
