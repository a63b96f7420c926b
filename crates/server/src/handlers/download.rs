//! Folder archive download.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::range::{DeliveryOptions, serve_file};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use folio_core::FolderName;
use folio_storage::{CacheEntry, SourceDirectory, StorageError, resolve_source_dir};
use serde::Deserialize;
use tracing::instrument;

/// Query for GET /descargar-zip.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Folder identifier relative to the base directory.
    pub carpeta: Option<String>,
}

/// GET /descargar-zip?carpeta=<name> - Download a folder as a zip archive.
///
/// Builds (or reuses) the folder's cached archive and serves it with
/// range support. HEAD returns the same headers without a body.
#[instrument(skip(state, headers), fields(folder = ?query.carpeta))]
pub async fn download_folder(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let raw = query
        .carpeta
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("missing query parameter: carpeta".to_string())
        })?;

    let name = FolderName::parse(&raw)?;
    let source = resolve_source_dir(&state.config.archive.base_dir, &name).await?;
    let download_name = name.download_name();

    let delivery = &state.config.delivery;
    let options = DeliveryOptions {
        download_name: &download_name,
        chunk_size: delivery.effective_chunk_size(),
        max_rate_bps: delivery.max_rate_bps,
        head_only: method == Method::HEAD,
    };

    let entry = ready_archive(&state, &source, &download_name).await?;
    match serve_file(&headers, &entry.archive_path, options).await {
        Err(ApiError::Storage(StorageError::NotFound(_))) => {
            tracing::warn!(key = %entry.cache_key, "Archive vanished before delivery, retrying");
            let entry = ready_archive(&state, &source, &download_name).await?;
            serve_file(&headers, &entry.archive_path, options).await
        }
        result => result,
    }
}

/// Look up or build the folder's archive, recording cache metrics.
async fn ready_archive(
    state: &AppState,
    source: &SourceDirectory,
    download_name: &str,
) -> ApiResult<CacheEntry> {
    let entry = match state.cache.get_or_build(source, download_name).await {
        Ok(entry) => entry,
        Err(e) => {
            if matches!(e, StorageError::Build(_) | StorageError::Join(_)) {
                metrics::ARCHIVE_BUILD_FAILURES.inc();
            }
            return Err(e.into());
        }
    };

    if entry.hit {
        metrics::CACHE_HITS.inc();
    } else {
        metrics::CACHE_MISSES.inc();
        metrics::ARCHIVE_BUILDS.inc();
        if let Some(duration) = entry.build_duration {
            metrics::ARCHIVE_BUILD_DURATION.observe(duration.as_secs_f64());
        }
    }

    tracing::debug!(
        key = %entry.cache_key,
        hit = entry.hit,
        size = entry.size_bytes,
        "Archive ready"
    );
    Ok(entry)
}
