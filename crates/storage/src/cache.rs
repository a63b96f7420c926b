//! On-disk archive cache.
//!
//! Archives are keyed by [`CacheKey`] (source path + fingerprint), so a
//! folder change produces a new key and old archives simply stop being
//! referenced. Within one key an archive is reused until its TTL lapses.

use crate::builder::{ArchiveBuilder, ZipBuilder};
use crate::error::{StorageError, StorageResult};
use crate::fingerprint::fingerprint;
use crate::source::SourceDirectory;
use dashmap::DashMap;
use folio_core::CacheKey;
use folio_core::config::ArchiveConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::instrument;

/// A ready-to-serve archive.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub cache_key: CacheKey,
    pub archive_path: PathBuf,
    /// Modification time of the published archive.
    pub created_at: SystemTime,
    pub size_bytes: u64,
    /// True when an existing archive was reused.
    pub hit: bool,
    /// Wall time of the build, for misses.
    pub build_duration: Option<Duration>,
}

/// Keyed archive cache backed by a directory.
pub struct CacheStore {
    cache_dir: PathBuf,
    ttl: Option<Duration>,
    builder: Arc<dyn ArchiveBuilder>,
    build_lock: bool,
    /// Keys with a build in flight. Holds the per-key lock when
    /// `build_lock` is on.
    pub(crate) in_flight: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl CacheStore {
    /// Create a cache store, creating the cache directory if needed.
    pub async fn new(config: &ArchiveConfig, builder: Arc<dyn ArchiveBuilder>) -> StorageResult<Self> {
        let cache_dir = config.cache_dir.clone();
        fs::create_dir_all(&cache_dir).await.map_err(|e| {
            StorageError::Build(format!(
                "failed to create cache directory {}: {e}",
                cache_dir.display()
            ))
        })?;

        tracing::info!(
            cache_dir = %cache_dir.display(),
            builder = builder.builder_name(),
            ttl_ms = config.ttl_ms,
            build_lock = config.build_lock,
            "Archive cache initialized"
        );

        Ok(Self {
            cache_dir,
            ttl: config.ttl(),
            builder,
            build_lock: config.build_lock,
            in_flight: DashMap::new(),
        })
    }

    /// Create a cache store using the zip builder from configuration.
    pub async fn from_config(config: &ArchiveConfig) -> StorageResult<Self> {
        Self::new(config, Arc::new(ZipBuilder::new(config.compression_level))).await
    }

    /// Directory holding the cached archives.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Whether a build for `key` is currently running.
    pub fn is_building(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Return a fresh archive for `source`, building one if needed.
    ///
    /// `download_name` only affects the cached file name; the key alone
    /// decides reuse.
    #[instrument(skip(self, source), fields(folder = %source.name()))]
    pub async fn get_or_build(
        &self,
        source: &SourceDirectory,
        download_name: &str,
    ) -> StorageResult<CacheEntry> {
        let fp = fingerprint(source.path()).await?;
        let key = CacheKey::derive(source.path(), fp);
        let archive_path = self.cache_dir.join(key.archive_file_name(download_name));

        if let Some(entry) = self.lookup(key, &archive_path).await? {
            tracing::debug!(key = %key, "Archive cache hit");
            return Ok(entry);
        }

        let guard = InFlight::register(&self.in_flight, key);
        let _lock = if self.build_lock {
            let lock = guard.lock.lock().await;
            // Another request may have published it while we waited
            if let Some(entry) = self.lookup(key, &archive_path).await? {
                tracing::debug!(key = %key, "Archive built by concurrent request");
                return Ok(entry);
            }
            Some(lock)
        } else {
            None
        };

        self.build(source, key, archive_path).await
    }

    async fn lookup(&self, key: CacheKey, path: &Path) -> StorageResult<Option<CacheEntry>> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };
        let created_at = metadata.modified()?;

        if !self.is_fresh(created_at) {
            tracing::debug!(key = %key, "Cached archive expired");
            return Ok(None);
        }

        Ok(Some(CacheEntry {
            cache_key: key,
            archive_path: path.to_path_buf(),
            created_at,
            size_bytes: metadata.len(),
            hit: true,
            build_duration: None,
        }))
    }

    fn is_fresh(&self, created_at: SystemTime) -> bool {
        match self.ttl {
            None => true,
            // Archives dated in the future count as brand new
            Some(ttl) => SystemTime::now()
                .duration_since(created_at)
                .unwrap_or_default()
                < ttl,
        }
    }

    async fn build(
        &self,
        source: &SourceDirectory,
        key: CacheKey,
        archive_path: PathBuf,
    ) -> StorageResult<CacheEntry> {
        fs::create_dir_all(&self.cache_dir).await.map_err(|e| {
            StorageError::Build(format!("failed to create cache directory: {e}"))
        })?;

        let started = Instant::now();
        let size_bytes = self.builder.build(source.path(), &archive_path).await?;
        let build_duration = started.elapsed();
        let created_at = fs::metadata(&archive_path).await?.modified()?;

        tracing::info!(
            key = %key,
            size = size_bytes,
            duration_ms = build_duration.as_millis() as u64,
            "Archive built"
        );

        Ok(CacheEntry {
            cache_key: key,
            archive_path,
            created_at,
            size_bytes,
            hit: false,
            build_duration: Some(build_duration),
        })
    }

    /// Verify the cache directory is usable.
    pub async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.cache_dir).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("cache directory not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::other(
                "cache directory is not a directory",
            )));
        }

        Ok(())
    }
}

/// Registration of an in-flight build. Removes the map entry once the last
/// interested request is gone, including when a request is cancelled.
struct InFlight<'a> {
    map: &'a DashMap<CacheKey, Arc<Mutex<()>>>,
    key: CacheKey,
    lock: Arc<Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn register(map: &'a DashMap<CacheKey, Arc<Mutex<()>>>, key: CacheKey) -> Self {
        let lock = map.entry(key).or_default().clone();
        Self { map, key, lock }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // Our clone plus the map's own
        self.map
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) <= 2);
    }
}
