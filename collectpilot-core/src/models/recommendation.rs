use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Collection strategy suggested by the scoring capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[sqlx(rename = "gentle_reminder")]
    GentleReminder,

    #[sqlx(rename = "urgent_notice")]
    UrgentNotice,

    #[sqlx(rename = "personal_outreach")]
    PersonalOutreach,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::GentleReminder => "gentle_reminder",
            Strategy::UrgentNotice => "urgent_notice",
            Strategy::PersonalOutreach => "personal_outreach",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[sqlx(rename = "low")]
    Low,

    #[sqlx(rename = "medium")]
    Medium,

    #[sqlx(rename = "high")]
    High,
}

/// Recommendation lifecycle status.
///
/// `pending -> {approved, rejected, modified}`, `approved|modified -> executed`.
/// `rejected` and `executed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    #[sqlx(rename = "pending")]
    Pending,

    #[sqlx(rename = "approved")]
    Approved,

    #[sqlx(rename = "rejected")]
    Rejected,

    #[sqlx(rename = "modified")]
    Modified,

    #[sqlx(rename = "executed")]
    Executed,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Approved => "approved",
            RecommendationStatus::Rejected => "rejected",
            RecommendationStatus::Modified => "modified",
            RecommendationStatus::Executed => "executed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RecommendationStatus::Rejected | RecommendationStatus::Executed)
    }

    /// Approved or modified, waiting for (or retrying) execution.
    pub fn is_executable(&self) -> bool {
        matches!(self, RecommendationStatus::Approved | RecommendationStatus::Modified)
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RecommendationStatus::Pending),
            "approved" => Ok(RecommendationStatus::Approved),
            "rejected" => Ok(RecommendationStatus::Rejected),
            "modified" => Ok(RecommendationStatus::Modified),
            "executed" => Ok(RecommendationStatus::Executed),
            other => Err(AppError::validation(format!(
                "Unknown recommendation status: {}",
                other
            ))),
        }
    }
}

/// AI-generated collection action for one (customer, invoice) pair.
///
/// Maps to the `recommendations` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recommendation {
    pub id: Uuid,

    pub customer_id: Uuid,

    pub invoice_id: Uuid,

    pub strategy: Strategy,

    /// 0-100
    pub confidence: i32,

    pub risk_assessment: RiskLevel,

    pub draft_content: String,

    pub reasoning: String,

    pub status: RecommendationStatus,

    /// Message from the most recent failed execution attempt
    pub execution_error: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Values needed to persist a freshly scored recommendation.
#[derive(Debug, Clone)]
pub struct NewRecommendation {
    pub customer_id: Uuid,
    pub invoice_id: Uuid,
    pub strategy: Strategy,
    pub confidence: i32,
    pub risk_assessment: RiskLevel,
    pub draft_content: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecommendation {
    pub customer_id: Uuid,
    pub invoice_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecommendationDraft {
    pub draft_content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationFilter {
    pub status: Option<RecommendationStatus>,
    pub limit: Option<i64>,
}
