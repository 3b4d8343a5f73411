use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::models::recommendation::{
    CreateRecommendation, RecommendationFilter, UpdateRecommendationDraft,
};
use crate::models::Recommendation;
use crate::recommendations::generator::GenerationReport;
use crate::state::AppState;

/// Batch generation request body.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    /// Maximum number of overdue invoices to cover
    pub limit: Option<i64>,
}

/// Handles GET requests to `/api/recommendations`.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(filter): Query<RecommendationFilter>,
) -> Result<Json<Vec<Recommendation>>> {
    Ok(Json(state.recommendations.list(&filter).await?))
}

/// Recommendation generation endpoint handler.
///
/// Handles POST requests to `/api/recommendations` for one customer and
/// invoice pair.
///
/// # Returns
///
/// `201 Created` with the pending recommendation.
pub async fn create_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateRecommendation>,
) -> Result<(StatusCode, Json<Recommendation>)> {
    let rec = state
        .recommendations
        .generate(request.customer_id, request.invoice_id)
        .await?;
    Ok((StatusCode::CREATED, Json(rec)))
}

/// Batch generation endpoint handler.
///
/// Handles POST requests to `/api/recommendations/generate`, covering
/// overdue invoices that have no active recommendation yet.
pub async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerationReport>> {
    Ok(Json(
        state
            .recommendations
            .generate_for_overdue(request.limit)
            .await?,
    ))
}

/// Handles GET requests to `/api/recommendations/:id`.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Recommendation>> {
    Ok(Json(state.recommendations.get(id).await?))
}

/// Draft edit endpoint handler.
///
/// Handles PATCH requests to `/api/recommendations/:id`. Only pending
/// recommendations can be edited.
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateRecommendationDraft>,
) -> Result<Json<Recommendation>> {
    Ok(Json(
        state
            .recommendations
            .update_draft(id, &update.draft_content)
            .await?,
    ))
}
