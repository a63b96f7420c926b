//! Application state shared across handlers.

use folio_core::config::AppConfig;
use folio_storage::CacheStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Archive cache.
    pub cache: Arc<CacheStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Logs configuration warnings. Configuration errors are the caller's
    /// to reject before this point (see [`AppConfig::validate`]).
    pub fn new(config: AppConfig, cache: Arc<CacheStore>) -> Self {
        if let Ok(warnings) = config.validate() {
            for warning in warnings {
                tracing::warn!("Configuration warning: {}", warning);
            }
        }

        Self {
            config: Arc::new(config),
            cache,
        }
    }

    /// Build state with a zip-backed cache from configuration.
    pub async fn from_config(config: AppConfig) -> folio_storage::StorageResult<Self> {
        let cache = Arc::new(CacheStore::from_config(&config.archive).await?);
        Ok(Self::new(config, cache))
    }
}
