//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // GET also answers HEAD
        .route("/descargar-zip", get(handlers::download_folder))
        .route("/eliminar-carpeta", get(handlers::remove_folder))
        .route("/v1/health", get(handlers::health_check));

    // Conditionally add metrics endpoint based on config.
    // When enabled, restrict it to the Prometheus scrapers at the network level.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    if state.config.server.cors_permissive {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
