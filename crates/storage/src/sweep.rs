//! Cache sweeping.
//!
//! Keyed archives are never overwritten by a newer folder state; a change
//! produces a new key. Sweeping deletes archives nobody has rebuilt for
//! `max_age`, plus temp files abandoned by crashed builds.

use crate::builder::TEMP_MARKER;
use crate::cache::CacheStore;
use crate::error::StorageResult;
use folio_core::CacheKey;
use serde::Serialize;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::instrument;

/// Outcome of one sweep pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub scanned: u64,
    pub deleted: u64,
    pub bytes_reclaimed: u64,
    pub errors: u64,
}

enum Candidate {
    Archive(CacheKey),
    Temp,
}

fn classify(file_name: &str) -> Option<Candidate> {
    if file_name.starts_with('.') && file_name.contains(TEMP_MARKER) {
        return Some(Candidate::Temp);
    }
    CacheKey::from_archive_file_name(file_name).map(Candidate::Archive)
}

impl CacheStore {
    /// Delete cached archives older than `max_age` and temp files older than
    /// `temp_grace`, measured from `now`. Files that do not look like cache
    /// output are left alone, as are archives whose key is being built.
    #[instrument(skip(self))]
    pub async fn sweep(
        &self,
        now: SystemTime,
        max_age: Duration,
        temp_grace: Duration,
    ) -> StorageResult<SweepStats> {
        let mut stats = SweepStats::default();
        let mut entries = fs::read_dir(self.cache_dir()).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(candidate) = classify(&file_name) else {
                continue;
            };
            stats.scanned += 1;

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                // Renamed or deleted since read_dir
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(file = %file_name, error = %e, "Failed to stat cache file");
                    stats.errors += 1;
                    continue;
                }
            };

            let limit = match &candidate {
                Candidate::Archive(key) if self.is_building(key) => continue,
                Candidate::Archive(_) => max_age,
                Candidate::Temp => temp_grace,
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= limit {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    tracing::debug!(file = %file_name, age_secs = age.as_secs(), "Swept cache file");
                    stats.deleted += 1;
                    stats.bytes_reclaimed += metadata.len();
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(file = %file_name, error = %e, "Failed to delete cache file");
                    stats.errors += 1;
                }
            }
        }

        tracing::info!(
            scanned = stats.scanned,
            deleted = stats.deleted,
            bytes_reclaimed = stats.bytes_reclaimed,
            errors = stats.errors,
            "Cache sweep complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::config::ArchiveConfig;
    use folio_core::Fingerprint;
    use std::path::Path;

    const HOUR: Duration = Duration::from_secs(3600);

    async fn store(cache_dir: &Path) -> CacheStore {
        let config = ArchiveConfig {
            cache_dir: cache_dir.to_path_buf(),
            ..Default::default()
        };
        CacheStore::from_config(&config).await.unwrap()
    }

    fn key(n: u64) -> CacheKey {
        let fp = Fingerprint::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(n));
        CacheKey::derive(Path::new("/srv/descarga/42"), fp)
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        let archive = key(1).archive_file_name("42.zip");
        let temp = format!(".{archive}.tmp.0000");
        std::fs::write(dir.path().join(&archive), b"zipdata").unwrap();
        std::fs::write(dir.path().join(&temp), b"partial").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        // Two hours on: the temp file is past its grace, the archive is not
        let now = SystemTime::now() + 2 * HOUR;
        let stats = store.sweep(now, 24 * HOUR, HOUR).await.unwrap();
        assert_eq!(
            stats,
            SweepStats {
                scanned: 2,
                deleted: 1,
                bytes_reclaimed: 7,
                errors: 0,
            }
        );
        assert!(dir.path().join(&archive).exists());
        assert!(!dir.path().join(&temp).exists());

        // Two days on: the archive goes too
        let now = SystemTime::now() + 48 * HOUR;
        let stats = store.sweep(now, 24 * HOUR, HOUR).await.unwrap();
        assert_eq!(stats.deleted, 1);
        assert!(!dir.path().join(&archive).exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_sweep_skips_keys_being_built() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        let archive = key(2).archive_file_name("42.zip");
        std::fs::write(dir.path().join(&archive), b"zipdata").unwrap();
        store.in_flight.insert(key(2), Default::default());

        let now = SystemTime::now() + 48 * HOUR;
        let stats = store.sweep(now, HOUR, HOUR).await.unwrap();
        assert_eq!(stats.deleted, 0);
        assert!(dir.path().join(&archive).exists());
    }

    #[tokio::test]
    async fn test_sweep_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let stats = store.sweep(SystemTime::now(), HOUR, HOUR).await.unwrap();
        assert_eq!(stats, SweepStats::default());
    }

    #[test]
    fn test_classify() {
        let name = key(3).archive_file_name("x.zip");
        assert!(matches!(classify(&name), Some(Candidate::Archive(k)) if k == key(3)));
        assert!(matches!(classify(&format!(".{name}.tmp.abc")), Some(Candidate::Temp)));
        assert!(classify("random.zip").is_none());
        assert!(classify(".hidden").is_none());
    }
}
