//! Source folder management.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use folio_core::FolderName;
use folio_storage::{remove_source_dir, resolve_source_dir};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Query for GET /eliminar-carpeta.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFolderQuery {
    /// Folder identifier relative to the base directory.
    pub nombre_carpeta: Option<String>,
    /// Must be `si` to proceed.
    pub confirmacion: Option<String>,
}

/// Folder removal response.
#[derive(Debug, Serialize)]
pub struct RemoveFolderResponse {
    pub message: &'static str,
    pub folder: String,
}

/// GET /eliminar-carpeta?nombreCarpeta=<name>&confirmacion=si - Delete a
/// source folder and everything in it.
#[instrument(skip(state), fields(folder = ?query.nombre_carpeta))]
pub async fn remove_folder(
    State(state): State<AppState>,
    Query(query): Query<RemoveFolderQuery>,
) -> ApiResult<Json<RemoveFolderResponse>> {
    let raw = query
        .nombre_carpeta
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("missing query parameter: nombreCarpeta".to_string())
        })?;

    let name = FolderName::parse(&raw)?;
    let source = resolve_source_dir(&state.config.archive.base_dir, &name).await?;

    if query.confirmacion.as_deref() != Some("si") {
        return Err(ApiError::BadRequest(
            "confirm the removal by sending confirmacion=si".to_string(),
        ));
    }

    remove_source_dir(source).await?;

    Ok(Json(RemoveFolderResponse {
        message: "folder removed",
        folder: name.as_str().to_string(),
    }))
}
