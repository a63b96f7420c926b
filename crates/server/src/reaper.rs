//! Periodic cache sweeping.

use crate::metrics;
use folio_storage::CacheStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

/// Spawn a background task that sweeps the archive cache every `interval`.
///
/// The first sweep runs immediately so leftovers from a previous run are
/// reclaimed at startup.
pub fn spawn_reaper(
    cache: Arc<CacheStore>,
    interval: Duration,
    max_age: Duration,
    temp_grace: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match cache.sweep(SystemTime::now(), max_age, temp_grace).await {
                Ok(stats) => {
                    metrics::CACHE_SWEPT_FILES.inc_by(stats.deleted);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Cache sweep failed");
                }
            }
        }
    })
}
