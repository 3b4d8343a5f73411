use axum::{extract::State, response::Json};
use tracing::info;

use crate::error::Result;
use crate::state::AppState;
use crate::sync::types::{SourceSyncStatus, SyncReport, SyncRequest};

/// Sync trigger endpoint handler.
///
/// Handles POST requests to `/api/sync`, returning one report per source.
/// A source that could not be reached appears with its `error` set; the
/// request only fails when no source could be synced.
pub async fn sync_handler(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<Vec<SyncReport>>> {
    info!("Sync requested for {:?} (force: {})", request.source, request.force);
    let reports = state.synchronizer.sync(request.source, request.force).await?;
    Ok(Json(reports))
}

/// Sync status endpoint handler.
///
/// Handles GET requests to `/api/sync/status` with record counts and the
/// last sync time per source.
pub async fn status_handler(State(state): State<AppState>) -> Result<Json<Vec<SourceSyncStatus>>> {
    Ok(Json(state.synchronizer.status().await?))
}
