//! Metrics and liveness middleware.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::error::ApiError;
use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
    REQUESTS_REJECTED_SHUTDOWN,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Refuse new requests once shutdown has started.
pub async fn liveness_gate(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let liveness = state.liveness();
    if liveness.is_active() {
        return next.run(request).await;
    }

    debug!(
        "Rejecting {} {} while {}",
        request.method(),
        request.uri().path(),
        liveness.state().as_str()
    );
    REQUESTS_REJECTED_SHUTDOWN.inc();
    ApiError::new(
        StatusCode::SERVICE_UNAVAILABLE,
        "shutting_down",
        "server is shutting down",
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use mucache_core::{
        testing::{fixtures, MockStrategy},
        CacheStore, Config, DownloadOrchestrator, LivenessMonitor, ShutdownReason,
    };
    use tower::ServiceExt;

    async fn dummy_handler() -> &'static str {
        "OK"
    }

    fn create_test_state(dir: &std::path::Path) -> Arc<AppState> {
        let config = Config {
            cache: fixtures::cache_config(dir),
            ..Config::default()
        };
        let store = Arc::new(CacheStore::open(&config.cache).unwrap());
        let dispatcher = fixtures::single_strategy_dispatcher(
            Arc::new(MockStrategy::succeeding("mock", 20_000, "x")),
            10_000,
        );
        let orchestrator = Arc::new(DownloadOrchestrator::new(store, dispatcher));
        let liveness = Arc::new(LivenessMonitor::new(config.liveness.clone()));
        Arc::new(AppState::new(config, orchestrator, liveness))
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/test", get(dummy_handler))
            .layer(middleware::from_fn_with_state(state.clone(), liveness_gate))
            .layer(middleware::from_fn(metrics_middleware))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_active_server_passes_requests() {
        let dir = tempfile::tempdir().unwrap();
        let state = create_test_state(dir.path());

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_shutting_down_returns_503() {
        let dir = tempfile::tempdir().unwrap();
        let state = create_test_state(dir.path());
        state
            .liveness()
            .request_shutdown(ShutdownReason::ClientRequest);

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
