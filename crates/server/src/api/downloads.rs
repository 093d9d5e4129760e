//! Download and remove handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use mucache_core::Platform;

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UrlParams {
    #[serde(default)]
    pub url: Option<String>,
}

impl UrlParams {
    fn require(self) -> Result<String, ApiError> {
        self.url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::bad_request("invalid_url", "missing url parameter"))
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub filename: String,
    pub title: String,
    pub platform: Platform,
    pub source_url: String,
    #[serde(rename = "fromCache")]
    pub from_cache: bool,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub success: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET|POST /api/v1/download?url=
///
/// Returns the cached entry, downloading it first when needed. The request
/// stays open for the whole download.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UrlParams>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let url = params.require()?;
    let outcome = state.orchestrator().fetch(&url).await?;

    Ok(Json(DownloadResponse {
        filename: outcome.entry.filename,
        title: outcome.entry.title,
        platform: outcome.entry.platform,
        source_url: outcome.entry.source_url,
        from_cache: outcome.from_cache,
        success: true,
    }))
}

/// POST /api/v1/remove?url=
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UrlParams>,
) -> Result<Json<RemoveResponse>, ApiError> {
    let url = params.require()?;
    if state.orchestrator().remove(&url)? {
        info!("Removed {} from cache", url);
        Ok(Json(RemoveResponse { success: true }))
    } else {
        Err(ApiError::not_found(format!("{} is not cached", url)))
    }
}
