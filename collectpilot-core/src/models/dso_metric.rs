use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Point-in-time DSO snapshot. Maps to the append-only `dso_metrics` table.
///
/// Values are kept at full precision; rounding happens only when a
/// response is built.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DsoMetric {
    pub id: Uuid,

    /// Amount-weighted average days overdue
    pub current_dso: Decimal,

    /// Previous snapshot DSO minus this one; positive means faster collection
    pub improvement: Decimal,

    pub total_outstanding: Decimal,

    pub working_capital_impact: Decimal,

    pub invoice_count: i32,

    pub calculated_at: DateTime<Utc>,
}
