//! Catalog API handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use mucache_core::{
    CacheEntry, CatalogQuery, CatalogStats, FileStats, Platform, RepairReport, SortKey,
};

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQueryParams {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl CatalogQueryParams {
    fn into_query(self) -> Result<CatalogQuery, ApiError> {
        let platform = match self.platform.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(name) => Some(Platform::parse(name).ok_or_else(|| {
                ApiError::bad_request("invalid_query", format!("unknown platform '{}'", name))
            })?),
        };
        let sort = match self.sort.as_deref() {
            None | Some("") => SortKey::default(),
            Some(key) => SortKey::parse(key).ok_or_else(|| {
                ApiError::bad_request("invalid_query", format!("unknown sort key '{}'", key))
            })?,
        };
        Ok(CatalogQuery {
            platform,
            search: self.search.filter(|s| !s.trim().is_empty()),
            sort,
            limit: self.limit,
        })
    }
}

/// A catalog entry as served to the player, with `url` mirroring `source_url`.
#[derive(Debug, Serialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: CacheEntry,
    pub url: String,
}

impl From<CacheEntry> for EntryView {
    fn from(entry: CacheEntry) -> Self {
        let url = entry.source_url.clone();
        Self { entry, url }
    }
}

#[derive(Debug, Deserialize)]
pub struct FilenameParams {
    #[serde(default)]
    pub filename: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/catalog
///
/// Entries whose files exist, filtered and sorted.
pub async fn list_catalog(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CatalogQueryParams>,
) -> Result<Json<Vec<EntryView>>, ApiError> {
    let query = params.into_query()?;
    let entries = state.orchestrator().list(&query)?;
    Ok(Json(entries.into_iter().map(EntryView::from).collect()))
}

/// GET /api/v1/catalog/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<CatalogStats>, ApiError> {
    Ok(Json(state.orchestrator().stats()?))
}

/// POST /api/v1/catalog/repair
pub async fn repair(State(state): State<Arc<AppState>>) -> Result<Json<RepairReport>, ApiError> {
    Ok(Json(state.orchestrator().repair().await?))
}

/// GET /api/v1/filestats?filename=
pub async fn file_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilenameParams>,
) -> Result<Json<FileStats>, ApiError> {
    let filename = params
        .filename
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::bad_request("invalid_filename", "missing filename parameter"))?;
    Ok(Json(state.store().file_stats(&filename)?))
}
