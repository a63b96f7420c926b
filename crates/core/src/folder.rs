//! Folder identifiers supplied by clients.
//!
//! A [`FolderName`] is the lexical half of the path guard: it accepts only
//! relative, normal path segments, so joining it onto the base directory can
//! never name anything outside that directory. The filesystem half (existence
//! and symlink confinement) lives in the storage crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A validated, relative folder identifier (e.g. `42/factura-100`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FolderName {
    /// Normalized form, segments joined with `/`.
    normalized: String,
}

impl FolderName {
    /// Parse and validate a raw folder identifier.
    ///
    /// Rejects empty input, NUL bytes, any `..` sequence, absolute paths
    /// (leading separator or drive prefix) and `.` segments. Both `/` and `\`
    /// are accepted as separators; empty segments are dropped.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        if raw.trim().is_empty() {
            return Err(crate::Error::InvalidPath(
                "folder name cannot be empty".to_string(),
            ));
        }

        if raw.contains('\0') {
            return Err(crate::Error::InvalidPath(
                "folder name contains a NUL byte".to_string(),
            ));
        }

        // Rejected anywhere, including inside a segment such as `a..b`
        if raw.contains("..") {
            return Err(crate::Error::InvalidPath(format!(
                "path traversal not allowed: {raw}"
            )));
        }

        if raw.starts_with('/') || raw.starts_with('\\') || has_drive_prefix(raw) {
            return Err(crate::Error::InvalidPath(format!(
                "absolute paths not allowed: {raw}"
            )));
        }

        let mut segments = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" => continue,
                "." => {
                    return Err(crate::Error::InvalidPath(format!(
                        "contains unsafe path component: {raw}"
                    )));
                }
                s if s.trim().is_empty() => {
                    return Err(crate::Error::InvalidPath(format!(
                        "contains blank path component: {raw}"
                    )));
                }
                s => segments.push(s),
            }
        }

        if segments.is_empty() {
            return Err(crate::Error::InvalidPath(
                "folder name has no path components".to_string(),
            ));
        }

        // Every component must also be Normal for the host platform.
        let normalized = segments.join("/");
        for component in Path::new(&normalized).components() {
            if !matches!(component, std::path::Component::Normal(_)) {
                return Err(crate::Error::InvalidPath(format!(
                    "contains unsafe path component: {raw}"
                )));
            }
        }

        Ok(Self { normalized })
    }

    /// The normalized identifier, segments joined with `/`.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.normalized.split('/')
    }

    /// Join onto a base directory. The result is lexically confined to `base`.
    pub fn join_onto(&self, base: &Path) -> PathBuf {
        let mut path = base.to_path_buf();
        for segment in self.segments() {
            path.push(segment);
        }
        path
    }

    /// Name offered to the client for the archive of this folder.
    pub fn download_name(&self) -> String {
        format!("{}.{}", sanitize_name(&self.normalized), crate::ARCHIVE_EXTENSION)
    }
}

fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl TryFrom<String> for FolderName {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<FolderName> for String {
    fn from(value: FolderName) -> Self {
        value.normalized
    }
}

impl fmt::Debug for FolderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FolderName({self})")
    }
}

impl fmt::Display for FolderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Used for both the `Content-Disposition` filename and the cache file
/// prefix, so the result is always safe inside a quoted header value and
/// as a single path segment.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_folder() {
        let name = FolderName::parse("42/factura-100").unwrap();
        assert_eq!(name.as_str(), "42/factura-100");
        assert_eq!(name.segments().collect::<Vec<_>>(), vec!["42", "factura-100"]);
    }

    #[test]
    fn test_parse_normalizes_separators() {
        let name = FolderName::parse("42\\factura-100/").unwrap();
        assert_eq!(name.as_str(), "42/factura-100");

        let name = FolderName::parse("42//factura-100").unwrap();
        assert_eq!(name.as_str(), "42/factura-100");
    }

    #[test]
    fn test_traversal_rejected() {
        for raw in [
            "..",
            "../etc",
            "42/../../etc/passwd",
            "42/..",
            "..\\windows",
            "a..b",
        ] {
            assert!(
                matches!(FolderName::parse(raw), Err(crate::Error::InvalidPath(_))),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_absolute_rejected() {
        for raw in ["/etc/passwd", "\\\\server\\share", "C:\\Windows", "c:/x"] {
            assert!(
                FolderName::parse(raw).is_err(),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_empty_and_dot_rejected() {
        for raw in ["", "   ", "/", ".", "./42", "42/./x", "42/ /x", "a\0b"] {
            assert!(
                FolderName::parse(raw).is_err(),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_join_onto_stays_under_base() {
        let base = Path::new("/srv/descarga");
        let name = FolderName::parse("42/factura-100").unwrap();
        let joined = name.join_onto(base);
        assert_eq!(joined, Path::new("/srv/descarga/42/factura-100"));
        assert!(joined.starts_with(base));
    }

    #[test]
    fn test_download_name_sanitized() {
        let name = FolderName::parse("42/factura 100").unwrap();
        assert_eq!(name.download_name(), "42_factura_100.zip");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("abc-DEF_1.2"), "abc-DEF_1.2");
        assert_eq!(sanitize_name("a b/c\"d"), "a_b_c_d");
        assert_eq!(sanitize_name("fáctura"), "f_ctura");
    }

    #[test]
    fn test_serde_validates() {
        let ok: FolderName = serde_json::from_str("\"42/x\"").unwrap();
        assert_eq!(ok.as_str(), "42/x");
        assert!(serde_json::from_str::<FolderName>("\"../x\"").is_err());
    }
}
