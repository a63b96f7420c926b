//! Directory fingerprints and the cache keys derived from them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Cheap, change-sensitive summary of a directory's state.
///
/// Holds the latest modification time (nanoseconds since the UNIX epoch)
/// seen across the directory itself and its immediate entries. Only
/// compared and hashed; never persisted on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// Fingerprint of a single modification time. Pre-epoch times clamp to zero.
    pub fn from_system_time(time: SystemTime) -> Self {
        Self(
            time.duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
        )
    }

    /// Raw nanosecond value.
    pub fn as_nanos(&self) -> u128 {
        self.0
    }

    /// Fold another modification time in, keeping the later one.
    pub fn observe(self, time: SystemTime) -> Self {
        self.max(Self::from_system_time(time))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic identifier of a cached archive.
///
/// `sha256(source_path || "|" || fingerprint)`, rendered as 64 lowercase hex
/// characters. Equal keys name content-equivalent archives.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Length of the hex rendering.
    pub const HEX_LEN: usize = 64;

    /// Derive the key for a source directory in a given state.
    pub fn derive(source: &Path, fingerprint: Fingerprint) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_os_str().as_encoded_bytes());
        hasher.update(b"|");
        hasher.update(fingerprint.to_string().as_bytes());
        Self(hasher.finalize().into())
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != Self::HEX_LEN {
            return Err(crate::Error::InvalidCacheKey(format!(
                "expected {} hex chars, got {}",
                Self::HEX_LEN,
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| crate::Error::InvalidCacheKey(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Encode as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// File name of the cached archive for this key:
    /// `<sanitized download name>.<key hex>.zip`.
    pub fn archive_file_name(&self, download_name: &str) -> String {
        format!(
            "{}.{}.{}",
            crate::sanitize_name(download_name),
            self.to_hex(),
            crate::ARCHIVE_EXTENSION
        )
    }

    /// Recover the key from a cached archive's file name, if it has one.
    pub fn from_archive_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", crate::ARCHIVE_EXTENSION))?;
        let (_, hex) = stem.rsplit_once('.')?;
        Self::from_hex(hex).ok()
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({self})")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
