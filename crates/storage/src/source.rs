//! Source folder resolution.
//!
//! The filesystem half of the path guard. [`FolderName`] already guarantees
//! the joined path is lexically inside the base directory; here we also
//! require the folder to exist and refuse folders whose canonical location
//! escapes the base through a symlink.

use crate::error::{StorageError, StorageResult};
use folio_core::FolderName;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// A folder under the base directory that exists and is a directory.
#[derive(Clone, Debug)]
pub struct SourceDirectory {
    name: FolderName,
    path: PathBuf,
}

impl SourceDirectory {
    /// The validated folder identifier.
    pub fn name(&self) -> &FolderName {
        &self.name
    }

    /// Absolute (base-joined) path of the folder.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Resolve a folder identifier under `base`.
///
/// Runs the filesystem checks on the blocking pool so `canonicalize` and
/// `symlink_metadata` do not stall the runtime.
#[instrument(skip(base), fields(folder = %name))]
pub async fn resolve_source_dir(base: &Path, name: &FolderName) -> StorageResult<SourceDirectory> {
    let base = base.to_path_buf();
    let name = name.clone();
    tokio::task::spawn_blocking(move || resolve_source_dir_sync(&base, name)).await?
}

fn resolve_source_dir_sync(base: &Path, name: FolderName) -> StorageResult<SourceDirectory> {
    let path = name.join_onto(base);

    match std::fs::symlink_metadata(&path) {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(format!("folder does not exist: {name}")));
        }
        Err(err) => {
            return Err(StorageError::Io(std::io::Error::new(
                err.kind(),
                format!("failed to stat folder: {err}"),
            )));
        }
    }

    let base_canonical = base.canonicalize().map_err(|e| {
        StorageError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to canonicalize base directory: {e}"),
        ))
    })?;

    let canonical = match path.canonicalize() {
        Ok(canonical) => canonical,
        // Dangling symlink
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(format!("folder does not exist: {name}")));
        }
        Err(err) => {
            return Err(StorageError::Io(std::io::Error::new(
                err.kind(),
                format!("failed to canonicalize folder: {err}"),
            )));
        }
    };

    if !canonical.starts_with(&base_canonical) {
        return Err(StorageError::InvalidPath(format!(
            "resolved path escapes base directory: {name}"
        )));
    }

    if !canonical.is_dir() {
        return Err(StorageError::NotFound(format!("not a directory: {name}")));
    }

    Ok(SourceDirectory { name, path })
}

/// Recursively delete a source folder.
#[instrument(skip(source), fields(folder = %source.name()))]
pub async fn remove_source_dir(source: SourceDirectory) -> StorageResult<()> {
    tokio::fs::remove_dir_all(source.path())
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                StorageError::NotFound(format!("folder does not exist: {}", source.name()))
            }
            _ => StorageError::Io(e),
        })?;
    tracing::info!("Source folder removed");
    Ok(())
}
