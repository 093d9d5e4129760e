//! Heartbeat and shutdown handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode};
use tracing::info;

use mucache_core::ShutdownReason;

use crate::state::AppState;

/// GET /api/v1/heartbeat
pub async fn heartbeat(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    state.liveness().heartbeat();
    (StatusCode::OK, "alive")
}

/// POST /api/v1/shutdown
///
/// Responds first; the server drains once the response is written.
pub async fn shutdown(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state
        .liveness()
        .request_shutdown(ShutdownReason::ClientRequest)
    {
        info!("Shutdown requested by client");
    }
    (StatusCode::OK, "Shutting down...")
}
