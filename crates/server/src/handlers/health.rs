//! Health check.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /v1/health - Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let base_dir = &state.config.archive.base_dir;
    let base_ok = tokio::fs::metadata(base_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !base_ok {
        return Err(ApiError::Internal(format!(
            "base directory not accessible: {}",
            base_dir.display()
        )));
    }

    state.cache.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
