//! Archive building.
//!
//! Builders materialize a folder's current contents into a single archive
//! at a destination path. The destination only ever appears complete: data
//! is written to a unique temp file next to it, fsynced, then renamed.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use time::OffsetDateTime;
use uuid::Uuid;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Marker embedded in the name of in-progress build files.
pub const TEMP_MARKER: &str = ".tmp.";

/// Entries at or above this size need zip64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Builds an archive from a source folder.
#[async_trait]
pub trait ArchiveBuilder: Send + Sync {
    /// Materialize `source` into an archive published at `dest`.
    /// Returns the archive size in bytes.
    async fn build(&self, source: &Path, dest: &Path) -> StorageResult<u64>;

    /// Get the builder name for logging.
    fn builder_name(&self) -> &'static str;
}

/// Zip archive builder.
///
/// Every regular file under the source folder is written at the archive
/// root; nested files are flattened and colliding names get ` (n)`
/// suffixes. Level 0 stores entries as-is, which suits already-compressed
/// documents such as PDFs.
#[derive(Clone, Debug, Default)]
pub struct ZipBuilder {
    compression_level: u8,
}

impl ZipBuilder {
    /// Create a builder with the given compression level (0-9).
    pub fn new(compression_level: u8) -> Self {
        Self {
            compression_level: compression_level.min(9),
        }
    }

    fn file_options(&self, entry: &SourceEntry) -> SimpleFileOptions {
        let options = SimpleFileOptions::default()
            .large_file(entry.len >= ZIP64_THRESHOLD)
            .last_modified_time(dos_time(entry.modified))
            .unix_permissions(0o644);

        if self.compression_level == 0 {
            options.compression_method(CompressionMethod::Stored)
        } else {
            options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(self.compression_level)))
        }
    }

    fn build_sync(&self, source: &Path, dest: &Path) -> StorageResult<u64> {
        let entries = collect_entries(source)
            .map_err(|e| StorageError::Build(format!("failed to list {}: {e}", source.display())))?;

        let temp_path = temp_path_for(dest);
        if let Err(err) = self.write_archive(&entries, &temp_path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err);
        }

        if let Err(e) = std::fs::rename(&temp_path, dest) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::Build(format!(
                "failed to publish {}: {e}",
                dest.display()
            )));
        }

        let size = std::fs::metadata(dest)?.len();
        tracing::debug!(
            dest = %dest.display(),
            entries = entries.len(),
            size = size,
            "Archive published"
        );
        Ok(size)
    }

    fn write_archive(&self, entries: &[SourceEntry], temp_path: &Path) -> StorageResult<()> {
        let file = File::create(temp_path).map_err(build_error)?;
        let mut zip = zip::ZipWriter::new(BufWriter::new(file));

        for entry in entries {
            zip.start_file(entry.archive_name.as_str(), self.file_options(entry))
                .map_err(build_error)?;
            let mut input = File::open(&entry.path).map_err(|e| {
                StorageError::Build(format!("failed to open {}: {e}", entry.path.display()))
            })?;
            std::io::copy(&mut input, &mut zip).map_err(|e| {
                StorageError::Build(format!("failed to read {}: {e}", entry.path.display()))
            })?;
        }

        let mut writer = zip.finish().map_err(build_error)?;
        writer.flush().map_err(build_error)?;
        let file = writer.into_inner().map_err(|e| build_error(e.into_error()))?;
        // Data must be durable before the rename makes it visible
        file.sync_all().map_err(build_error)?;
        Ok(())
    }
}

fn build_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Build(e.to_string())
}

#[async_trait]
impl ArchiveBuilder for ZipBuilder {
    async fn build(&self, source: &Path, dest: &Path) -> StorageResult<u64> {
        let builder = self.clone();
        let source = source.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || builder.build_sync(&source, &dest)).await?
    }

    fn builder_name(&self) -> &'static str {
        "zip"
    }
}

/// Unique temp path beside `dest`: `.<name>.tmp.<uuid>`.
pub fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}{TEMP_MARKER}{}", Uuid::new_v4()))
}

/// A file to be written into the archive.
#[derive(Debug)]
struct SourceEntry {
    path: PathBuf,
    archive_name: String,
    modified: SystemTime,
    len: u64,
}

/// Collect every regular file below `source`, sorted by relative path,
/// with flattened, collision-free archive names. Symlinks are skipped.
fn collect_entries(source: &Path) -> std::io::Result<Vec<SourceEntry>> {
    let mut files = Vec::new();
    let mut stack = vec![source.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                let metadata = entry.metadata()?;
                files.push((entry.path(), metadata.modified()?, metadata.len()));
            }
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut used = HashSet::new();
    Ok(files
        .into_iter()
        .map(|(path, modified, len)| {
            let archive_name = unique_name(&path, &mut used);
            SourceEntry {
                path,
                archive_name,
                modified,
                len,
            }
        })
        .collect())
}

/// `name.ext`, then `name (1).ext`, `name (2).ext`, ... until unused.
fn unique_name(path: &Path, used: &mut HashSet<String>) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archivo".to_string());

    if used.insert(file_name.clone()) {
        return file_name;
    }

    let as_path = Path::new(&file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut i = 1;
    loop {
        let candidate = format!("{stem} ({i}){ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        i += 1;
    }
}

/// Convert to a zip (MS-DOS) timestamp, clamped to its 1980..=2107 range.
fn dos_time(time: SystemTime) -> zip::DateTime {
    let t = OffsetDateTime::from(time);
    let year = t.year().clamp(1980, 2107) as u16;
    zip::DateTime::from_date_and_time(
        year,
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
    )
    .unwrap_or_default()
}
