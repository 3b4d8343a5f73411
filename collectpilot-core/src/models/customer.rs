use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// External system a record was pulled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[sqlx(rename = "crm")]
    Crm,

    #[sqlx(rename = "erp")]
    Erp,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Crm, Source::Erp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Crm => "crm",
            Source::Erp => "erp",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crm" => Ok(Source::Crm),
            "erp" => Ok(Source::Erp),
            other => Err(AppError::validation(format!("Unknown source: {}", other))),
        }
    }
}

/// Coarse risk classification of a billed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum AccountHealth {
    #[sqlx(rename = "good")]
    #[serde(rename = "good")]
    Good,

    #[sqlx(rename = "at-risk")]
    #[serde(rename = "at-risk")]
    AtRisk,

    #[sqlx(rename = "churning")]
    #[serde(rename = "churning")]
    Churning,
}

impl AccountHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountHealth::Good => "good",
            AccountHealth::AtRisk => "at-risk",
            AccountHealth::Churning => "churning",
        }
    }
}

impl fmt::Display for AccountHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One settled (or partially settled) invoice in a customer's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub invoice_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
}

impl PaymentRecord {
    /// Days between due date and payment, zero when paid early or unpaid.
    pub fn days_late(&self) -> i64 {
        match self.paid_date {
            Some(paid) => (paid - self.due_date).num_days().max(0),
            None => 0,
        }
    }
}

/// Customer model representing a billed account synchronized from a CRM or ERP.
///
/// Maps to the `customers` table. `(source, external_id)` is unique; rows are
/// never deleted, only deactivated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: Uuid,

    /// Identifier of the account in its source system
    pub external_id: String,

    pub source: Source,

    pub name: String,

    pub account_health: AccountHealth,

    /// Lifetime revenue reported by the source
    pub total_revenue: Decimal,

    /// Past payments, oldest first
    pub payment_history: Json<Vec<PaymentRecord>>,

    pub is_active: bool,

    pub last_synced_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Average days late across the recorded payment history.
    pub fn average_days_late(&self) -> Option<f64> {
        let history = &self.payment_history.0;
        if history.is_empty() {
            return None;
        }
        let total: i64 = history.iter().map(PaymentRecord::days_late).sum();
        Some(total as f64 / history.len() as f64)
    }
}

/// Canonical customer shape produced by an adapter and written by the synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertCustomer {
    pub external_id: String,
    pub source: Source,
    pub name: String,
    pub account_health: AccountHealth,
    pub total_revenue: Decimal,
    pub payment_history: Vec<PaymentRecord>,
    pub synced_at: DateTime<Utc>,
}

/// Query parameters for listing customers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerFilter {
    #[serde(default)]
    pub include_inactive: bool,
    pub source: Option<Source>,
}
