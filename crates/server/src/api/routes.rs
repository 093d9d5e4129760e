use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::{catalog, downloads, files, handlers, lifecycle};
use super::middleware::{liveness_gate, metrics_middleware};
use crate::state::AppState;

/// Page served at `/`.
pub const PLAYER_PAGE: &str = "player.html";

pub fn create_router(state: Arc<AppState>) -> Router {
    let ui_dir = state.config().server.ui_dir.clone();

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Downloads
        .route("/download", get(downloads::download).post(downloads::download))
        .route("/remove", post(downloads::remove))
        // Catalog
        .route("/catalog", get(catalog::list_catalog))
        .route("/catalog/stats", get(catalog::get_stats))
        .route("/catalog/repair", post(catalog::repair))
        .route("/filestats", get(catalog::file_stats))
        // Lifecycle
        .route("/heartbeat", get(lifecycle::heartbeat))
        .route("/shutdown", post(lifecycle::shutdown));

    // Paths used by the legacy player page
    let compat_routes = Router::new()
        .route("/download", get(downloads::download).post(downloads::download))
        .route("/playlist", get(catalog::list_catalog))
        .route("/filestats", get(catalog::file_stats))
        .route("/remove", post(downloads::remove))
        .route("/heartbeat", get(lifecycle::heartbeat))
        .route("/shutdown", post(lifecycle::shutdown))
        .route("/mucache/{filename}", get(files::stream_media));

    // Serve the player UI; unknown paths fall through to the UI directory
    let player = ServeFile::new(ui_dir.join(PLAYER_PAGE));
    let serve_dir = ServeDir::new(&ui_dir);

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(compat_routes)
        .route("/media/{filename}", get(files::stream_media))
        .route("/metrics", get(handlers::metrics))
        .route_service("/", player)
        .fallback_service(serve_dir)
        .layer(middleware::from_fn_with_state(state.clone(), liveness_gate))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
