//! Directory fingerprinting.
//!
//! A fingerprint is the latest modification time across a directory and its
//! immediate entries. Adding or removing an entry bumps the directory's own
//! mtime; rewriting a file bumps that file's. Changes two levels deep are
//! invisible, so watched folders should stay flat.

use crate::error::StorageResult;
use folio_core::Fingerprint;
use std::path::Path;
use tracing::instrument;

/// Compute the fingerprint of `dir` on the blocking pool.
#[instrument(fields(dir = %dir.display()))]
pub async fn fingerprint(dir: &Path) -> StorageResult<Fingerprint> {
    let dir = dir.to_path_buf();
    let fp = tokio::task::spawn_blocking(move || fingerprint_sync(&dir)).await??;
    Ok(fp)
}

/// Synchronous fingerprint scan (single level, symlinks not followed).
pub fn fingerprint_sync(dir: &Path) -> std::io::Result<Fingerprint> {
    let mut fp = Fingerprint::from_system_time(std::fs::metadata(dir)?.modified()?);

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        // DirEntry::metadata does not traverse symlinks
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            // Removed between read_dir and stat; the directory mtime covers it
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        };
        fp = fp.observe(metadata.modified()?);
    }

    Ok(fp)
}
