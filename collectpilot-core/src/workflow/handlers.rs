use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::error::Result;
use crate::models::approval::DecisionRequest;
use crate::models::Approval;
use crate::state::AppState;
use crate::workflow::approval::DecisionResult;

/// Decision endpoint handler.
///
/// Handles POST requests to `/api/recommendations/:id/decision` for
/// approving, rejecting or modifying a pending recommendation.
///
/// # Arguments
///
/// * `id` - Recommendation being decided
/// * `request` - Deciding user, action, optional modified content and
///   whether to execute right away
///
/// # Returns
///
/// The recommendation and the recorded approval. When immediate execution
/// failed the recommendation carries the failure in `execution_error`.
pub async fn decision_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResult>> {
    Ok(Json(state.workflow.decide(id, &request).await?))
}

/// Execution endpoint handler.
///
/// Handles POST requests to `/api/recommendations/:id/execute` to run, or
/// retry, the collection action of an approved recommendation.
pub async fn execute_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DecisionResult>> {
    Ok(Json(state.workflow.execute(id).await?))
}

/// Approval audit endpoint handler.
///
/// Handles GET requests to `/api/recommendations/:id/approvals`, oldest
/// decision first.
pub async fn approvals_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Approval>>> {
    Ok(Json(state.workflow.approvals(id).await?))
}
