use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::customer::Source;

/// Invoice status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[sqlx(rename = "pending")]
    Pending,

    #[sqlx(rename = "overdue")]
    Overdue,

    #[sqlx(rename = "partial")]
    Partial,

    #[sqlx(rename = "paid")]
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
        }
    }

    /// Pending and overdue invoices count toward DSO.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, InvoiceStatus::Pending | InvoiceStatus::Overdue)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(InvoiceStatus::Pending),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "partial" => Ok(InvoiceStatus::Partial),
            "paid" => Ok(InvoiceStatus::Paid),
            other => Err(AppError::validation(format!("Unknown invoice status: {}", other))),
        }
    }
}

/// Whole days past due, never negative.
pub fn days_overdue(due_date: NaiveDate, today: NaiveDate) -> i32 {
    (today - due_date).num_days().max(0) as i32
}

/// Invoice model representing a billable obligation owned by one customer.
///
/// Maps to the `invoices` table. `invoice_number` is unique; `days_overdue`
/// is derived and refreshed on every sync and read.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,

    /// Owning customer
    pub customer_id: Uuid,

    /// Invoice number (unique)
    pub invoice_number: String,

    pub amount: Decimal,

    pub due_date: NaiveDate,

    pub paid_date: Option<NaiveDate>,

    pub status: InvoiceStatus,

    pub days_overdue: i32,

    /// Source system the invoice was synchronized from
    pub source: Source,

    pub created_at: DateTime<Utc>,

    pub synced_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Recomputes `days_overdue` for `today` and promotes pending to overdue
    /// once the due date has passed.
    pub fn refresh_derived(&mut self, today: NaiveDate) {
        if self.status == InvoiceStatus::Paid {
            self.days_overdue = 0;
            return;
        }
        self.days_overdue = days_overdue(self.due_date, today);
        if self.status == InvoiceStatus::Pending && self.days_overdue > 0 {
            self.status = InvoiceStatus::Overdue;
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.status.is_outstanding()
    }
}

/// Canonical invoice shape written by the synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertInvoice {
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub days_overdue: i32,
    pub source: Source,
    pub synced_at: DateTime<Utc>,
}

/// Manual invoice status update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInvoiceStatus {
    pub status: InvoiceStatus,
    pub paid_date: Option<NaiveDate>,
}

/// Query parameters for listing invoices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(status: InvoiceStatus, due: NaiveDate) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            invoice_number: "INV-001".to_string(),
            amount: Decimal::new(100, 0),
            due_date: due,
            paid_date: None,
            status,
            days_overdue: 0,
            source: Source::Crm,
            created_at: now,
            synced_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_days_overdue_never_negative() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(days_overdue(NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(), today), 0);
        assert_eq!(days_overdue(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), today), 9);
    }

    #[test]
    fn test_refresh_promotes_pending_past_due() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut inv = invoice(InvoiceStatus::Pending, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        inv.refresh_derived(today);
        assert_eq!(inv.status, InvoiceStatus::Overdue);
        assert_eq!(inv.days_overdue, 5);
    }

    #[test]
    fn test_refresh_leaves_paid_alone() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut inv = invoice(InvoiceStatus::Paid, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        inv.refresh_derived(today);
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert_eq!(inv.days_overdue, 0);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Overdue".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Overdue);
        assert!("void".parse::<InvoiceStatus>().is_err());
    }
}
