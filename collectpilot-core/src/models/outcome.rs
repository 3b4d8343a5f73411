use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::customer::AccountHealth;
use crate::models::recommendation::Strategy;

/// How the customer reacted to the collection action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum CustomerResponse {
    #[sqlx(rename = "positive")]
    Positive,

    #[sqlx(rename = "neutral")]
    Neutral,

    #[sqlx(rename = "negative")]
    Negative,

    #[sqlx(rename = "disputed")]
    Disputed,

    #[sqlx(rename = "no_response")]
    NoResponse,
}

/// Realized result of a collection action. Maps to `collection_outcomes`.
///
/// `days_to_payment` and `amount_collected` are only set when
/// `payment_received` is true.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CollectionOutcome {
    pub id: Uuid,

    /// Absent for manually recorded outcomes
    pub recommendation_id: Option<Uuid>,

    pub invoice_id: Uuid,

    pub payment_received: bool,

    pub days_to_payment: Option<i32>,

    pub customer_response: Option<CustomerResponse>,

    pub amount_collected: Option<Decimal>,

    pub collected_at: DateTime<Utc>,

    pub impact_notes: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Outcome request body (create and corrective update share this shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub recommendation_id: Option<Uuid>,
    pub invoice_id: Uuid,
    pub payment_received: bool,
    pub days_to_payment: Option<i32>,
    pub amount_collected: Option<Decimal>,
    pub customer_response: Option<CustomerResponse>,
    pub notes: Option<String>,
    pub collected_at: Option<DateTime<Utc>>,
}

/// Normalized outcome ready to be written.
#[derive(Debug, Clone)]
pub struct NewOutcome {
    pub recommendation_id: Option<Uuid>,
    pub invoice_id: Uuid,
    pub payment_received: bool,
    pub days_to_payment: Option<i32>,
    pub customer_response: Option<CustomerResponse>,
    pub amount_collected: Option<Decimal>,
    pub collected_at: DateTime<Utc>,
    pub impact_notes: Option<String>,
}

/// Outcome joined with the recommendation, invoice and customer fields the
/// analytics aggregations group on.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutcomeRecord {
    pub outcome_id: Uuid,
    pub payment_received: bool,
    pub days_to_payment: Option<i32>,
    pub amount_collected: Option<Decimal>,
    pub collected_at: DateTime<Utc>,
    pub invoice_amount: Decimal,
    pub account_health: AccountHealth,
    pub strategy: Option<Strategy>,
    pub confidence: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutcomeQuery {
    pub days: Option<i64>,
    pub limit: Option<i64>,
}
