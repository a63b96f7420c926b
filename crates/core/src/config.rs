//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Smallest accepted read chunk size (4 KiB).
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Largest accepted read chunk size (8 MiB).
pub const MAX_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Allow cross-origin requests from any origin (default: true).
    /// The document UI is usually served from a different origin.
    #[serde(default = "default_cors_permissive")]
    pub cors_permissive: bool,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_cors_permissive() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
            cors_permissive: default_cors_permissive(),
        }
    }
}

/// Archive cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory under which folder identifiers are resolved.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Directory where built archives persist across requests.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Milliseconds before a cached archive is rebuilt even without a
    /// fingerprint change. 0 disables time-based expiry.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// Zip compression level, 0-9. 0 stores entries uncompressed.
    #[serde(default)]
    pub compression_level: u8,
    /// Serialize concurrent builds of the same cache key (default: true).
    /// When false, concurrent first requests may each build the archive;
    /// atomic publication still guarantees readers never see a partial file.
    #[serde(default = "default_build_lock")]
    pub build_lock: bool,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("./descarga")
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("zip-cache")
}

fn default_ttl_ms() -> u64 {
    24 * 60 * 60 * 1000 // 24 hours
}

fn default_build_lock() -> bool {
    true
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            cache_dir: default_cache_dir(),
            ttl_ms: default_ttl_ms(),
            compression_level: 0,
            build_lock: default_build_lock(),
        }
    }
}

impl ArchiveConfig {
    /// Cache TTL, or None when time-based expiry is disabled.
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_ms > 0).then(|| Duration::from_millis(self.ttl_ms))
    }

    /// Validate archive configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.compression_level > 9 {
            return Err(format!(
                "archive.compression_level {} is out of range (0-9)",
                self.compression_level
            ));
        }

        if self.base_dir.as_os_str().is_empty() {
            return Err("archive.base_dir cannot be empty".to_string());
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err("archive.cache_dir cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Archive delivery configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Bytes/second ceiling per streamed response. 0 disables throttling.
    #[serde(default = "default_max_rate_bps")]
    pub max_rate_bps: u64,
    /// Size of each read from the archive file, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_max_rate_bps() -> u64 {
    16 * 1024 * 1024 // ~16 MB/s
}

fn default_chunk_size() -> usize {
    64 * 1024
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_rate_bps: default_max_rate_bps(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl DeliveryConfig {
    /// Read chunk size clamped to the supported range.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
    }

    /// Validate delivery configuration.
    /// Returns warnings for settings that are allowed but probably unintended.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.chunk_size != self.effective_chunk_size() {
            warnings.push(format!(
                "delivery.chunk_size={} is outside {}..={} and will be clamped to {}",
                self.chunk_size,
                MIN_CHUNK_SIZE,
                MAX_CHUNK_SIZE,
                self.effective_chunk_size()
            ));
        }

        if self.max_rate_bps > 0 && self.max_rate_bps < 1024 {
            warnings.push(format!(
                "delivery.max_rate_bps={} is below 1 KiB/s; downloads will be very slow",
                self.max_rate_bps
            ));
        }

        Ok(warnings)
    }
}

/// Cache reaper configuration.
///
/// The reaper removes archives superseded by newer cache keys, which are
/// otherwise never deleted, and temp files left behind by interrupted builds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Enable periodic sweeps (default: true).
    #[serde(default = "default_reaper_enabled")]
    pub enabled: bool,
    /// Seconds between sweeps (default: 1 hour).
    #[serde(default = "default_reaper_interval_secs")]
    pub interval_secs: u64,
    /// Archives not modified for this many seconds are deleted (default: 7 days).
    #[serde(default = "default_reaper_max_age_secs")]
    pub max_age_secs: u64,
    /// Orphaned build temp files older than this are deleted (default: 1 hour).
    #[serde(default = "default_reaper_temp_grace_secs")]
    pub temp_grace_secs: u64,
}

fn default_reaper_enabled() -> bool {
    true
}

fn default_reaper_interval_secs() -> u64 {
    3600
}

fn default_reaper_max_age_secs() -> u64 {
    7 * 24 * 3600
}

fn default_reaper_temp_grace_secs() -> u64 {
    3600
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: default_reaper_enabled(),
            interval_secs: default_reaper_interval_secs(),
            max_age_secs: default_reaper_max_age_secs(),
            temp_grace_secs: default_reaper_temp_grace_secs(),
        }
    }
}

impl ReaperConfig {
    /// Interval between sweeps.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Maximum archive age.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// Grace period for orphaned temp files.
    pub fn temp_grace(&self) -> Duration {
        Duration::from_secs(self.temp_grace_secs)
    }

    /// Validate reaper configuration.
    /// Returns warnings for configs that are allowed but likely wrong,
    /// and errors for configs that would panic at runtime.
    pub fn validate(&self, archive: &ArchiveConfig) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if !self.enabled {
            return Ok(warnings);
        }

        // tokio::time::interval panics on a zero period
        if self.interval_secs == 0 {
            return Err("reaper.interval_secs cannot be 0. Use a value >= 1 second.".to_string());
        }

        if archive.ttl().is_none() {
            warnings.push(format!(
                "archive.ttl_ms=0 keeps archives fresh forever, but reaper.max_age_secs={} \
                 still deletes them. A download racing a sweep is retried once.",
                self.max_age_secs
            ));
        }

        if let Some(ttl) = archive.ttl()
            && self.max_age() < ttl
        {
            warnings.push(format!(
                "reaper.max_age_secs={} is shorter than archive.ttl_ms={}. \
                 Archives may be deleted while still considered fresh, \
                 forcing needless rebuilds.",
                self.max_age_secs, archive.ttl_ms
            ));
        }

        Ok(warnings)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Archive cache configuration.
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Delivery (streaming) configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Cache reaper configuration.
    #[serde(default)]
    pub reaper: ReaperConfig,
}

impl AppConfig {
    /// Create a test configuration rooted at the given directories.
    ///
    /// **For testing only.** Throttling and the reaper are disabled.
    pub fn for_testing(base_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig::default(),
            archive: ArchiveConfig {
                base_dir: base_dir.into(),
                cache_dir: cache_dir.into(),
                ..Default::default()
            },
            delivery: DeliveryConfig {
                max_rate_bps: 0,
                ..Default::default()
            },
            reaper: ReaperConfig {
                enabled: false,
                ..Default::default()
            },
        }
    }

    /// Validate the whole configuration.
    /// Returns accumulated warnings, or the first error.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        self.archive.validate()?;
        let mut warnings = self.delivery.validate()?;
        warnings.extend(self.reaper.validate(&self.archive)?);
        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_legacy_behavior() {
        let config = AppConfig::default();
        assert_eq!(config.archive.ttl_ms, 86_400_000);
        assert_eq!(config.archive.compression_level, 0);
        assert_eq!(config.delivery.max_rate_bps, 16 * 1024 * 1024);
        assert!(config.archive.build_lock);
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn test_ttl_zero_disables_expiry() {
        let config = ArchiveConfig {
            ttl_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.ttl(), None);

        let config = ArchiveConfig {
            ttl_ms: 1500,
            ..Default::default()
        };
        assert_eq!(config.ttl(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let json = r#"{"archive": {"cache_dir": "/var/cache/folio", "ttl_ms": 0}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.archive.cache_dir, PathBuf::from("/var/cache/folio"));
        assert_eq!(config.archive.ttl_ms, 0);
        assert_eq!(config.archive.base_dir, PathBuf::from("./descarga"));
        assert_eq!(config.delivery.chunk_size, 64 * 1024);
        assert!(config.reaper.enabled);
    }

    #[test]
    fn test_compression_level_out_of_range() {
        let config = ArchiveConfig {
            compression_level: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_size_clamped_with_warning() {
        let config = DeliveryConfig {
            chunk_size: 10,
            ..Default::default()
        };
        assert_eq!(config.effective_chunk_size(), MIN_CHUNK_SIZE);
        assert_eq!(config.validate().unwrap().len(), 1);
    }

    #[test]
    fn test_reaper_zero_interval_rejected() {
        let reaper = ReaperConfig {
            interval_secs: 0,
            ..Default::default()
        };
        assert!(reaper.validate(&ArchiveConfig::default()).is_err());

        let disabled = ReaperConfig {
            enabled: false,
            interval_secs: 0,
            ..Default::default()
        };
        assert!(disabled.validate(&ArchiveConfig::default()).is_ok());
    }

    #[test]
    fn test_reaper_max_age_below_ttl_warns() {
        let reaper = ReaperConfig {
            max_age_secs: 60,
            ..Default::default()
        };
        let warnings = reaper.validate(&ArchiveConfig::default()).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("max_age_secs"));
    }

    #[test]
    fn test_reaper_without_ttl_warns() {
        let archive = ArchiveConfig {
            ttl_ms: 0,
            ..Default::default()
        };
        let warnings = ReaperConfig::default().validate(&archive).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ttl_ms=0"));

        let disabled = ReaperConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(disabled.validate(&archive).unwrap().is_empty());
    }
}
