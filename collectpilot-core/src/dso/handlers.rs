use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::dso::calculator::DsoMetricResponse;
use crate::error::Result;
use crate::state::AppState;

/// Query parameters for `/api/dso/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Number of snapshots to return (default 50, max 500)
    pub limit: Option<i64>,
}

/// Current DSO endpoint handler.
///
/// Handles GET requests to `/api/dso`. Returns the latest stored snapshot,
/// or an unsaved calculation over today's invoices when none exists yet.
pub async fn current_handler(State(state): State<AppState>) -> Result<Json<DsoMetricResponse>> {
    Ok(Json(state.dso.current().await?.into()))
}

/// DSO recalculation endpoint handler.
///
/// Handles POST requests to `/api/dso/recalculate`, appending a new
/// snapshot to the DSO history.
///
/// # Returns
///
/// The stored snapshot with its improvement over the previous one.
pub async fn recalculate_handler(
    State(state): State<AppState>,
) -> Result<Json<DsoMetricResponse>> {
    Ok(Json(state.dso.recalculate().await?.into()))
}

/// DSO history endpoint handler.
///
/// Handles GET requests to `/api/dso/history`, newest snapshot first.
pub async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<DsoMetricResponse>>> {
    let history = state.dso.history(query.limit).await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}
