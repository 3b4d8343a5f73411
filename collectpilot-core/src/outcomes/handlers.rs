use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::models::outcome::{OutcomeQuery, RecordOutcome};
use crate::models::CollectionOutcome;
use crate::outcomes::analytics::OutcomeAnalytics;
use crate::state::AppState;

/// Query parameters for `/api/outcomes/analytics`.
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// Window length in days (default 30)
    pub days: Option<i64>,
}

/// Outcome recording endpoint handler.
///
/// Handles POST requests to `/api/outcomes`. A received payment also marks
/// the invoice paid.
///
/// # Returns
///
/// `201 Created` with the stored outcome.
pub async fn record_handler(
    State(state): State<AppState>,
    Json(request): Json<RecordOutcome>,
) -> Result<(StatusCode, Json<CollectionOutcome>)> {
    let outcome = state.outcomes.record_outcome(&request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Handles GET requests to `/api/outcomes`.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(query): Query<OutcomeQuery>,
) -> Result<Json<Vec<CollectionOutcome>>> {
    Ok(Json(state.outcomes.list_outcomes(&query).await?))
}

/// Outcome correction endpoint handler.
///
/// Handles PATCH requests to `/api/outcomes/:id`, replacing the recorded
/// values.
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RecordOutcome>,
) -> Result<Json<CollectionOutcome>> {
    Ok(Json(state.outcomes.update_outcome(id, &request).await?))
}

/// Analytics endpoint handler.
///
/// Handles GET requests to `/api/outcomes/analytics`, returning the summary
/// and every breakdown for the window in one payload.
pub async fn analytics_handler(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<OutcomeAnalytics>> {
    Ok(Json(state.outcomes.analytics(query.days).await?))
}
