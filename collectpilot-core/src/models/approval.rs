use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::recommendation::RecommendationStatus;

/// Human decision on a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    #[sqlx(rename = "approved")]
    Approved,

    #[sqlx(rename = "rejected")]
    Rejected,

    #[sqlx(rename = "modified")]
    Modified,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::Approved => "approved",
            ApprovalAction::Rejected => "rejected",
            ApprovalAction::Modified => "modified",
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(ApprovalAction::Approved),
            "rejected" => Ok(ApprovalAction::Rejected),
            "modified" => Ok(ApprovalAction::Modified),
            other => Err(AppError::invalid_action(other)),
        }
    }
}

impl From<ApprovalAction> for RecommendationStatus {
    fn from(action: ApprovalAction) -> Self {
        match action {
            ApprovalAction::Approved => RecommendationStatus::Approved,
            ApprovalAction::Rejected => RecommendationStatus::Rejected,
            ApprovalAction::Modified => RecommendationStatus::Modified,
        }
    }
}

/// Audit record of one decision. Maps to the `approvals` table.
///
/// Immutable once written apart from `executed_at`, which is stamped when the
/// collection action runs and is never earlier than `approved_at`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Approval {
    pub id: Uuid,

    pub recommendation_id: Uuid,

    /// Acting user
    pub user_id: Uuid,

    pub action: ApprovalAction,

    pub modified_content: Option<String>,

    pub approved_at: DateTime<Utc>,

    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewApproval {
    pub recommendation_id: Uuid,
    pub user_id: Uuid,
    pub action: ApprovalAction,
    pub modified_content: Option<String>,
    pub approved_at: DateTime<Utc>,
}

/// Decision request body. `action` stays a string so an unknown value is
/// reported as an invalid action rather than a body parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub user_id: Uuid,
    pub action: String,
    pub modified_content: Option<String>,
    #[serde(default)]
    pub execute_now: bool,
}
