use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::models::customer::Source;

/// Which source(s) a sync request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTarget {
    Crm,
    Erp,
    All,
}

impl SyncTarget {
    pub fn single(&self) -> Option<Source> {
        match self {
            SyncTarget::Crm => Some(Source::Crm),
            SyncTarget::Erp => Some(Source::Erp),
            SyncTarget::All => None,
        }
    }
}

/// Sync request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub source: SyncTarget,

    /// Rewrite existing records even when they were synced recently
    #[serde(default)]
    pub force: bool,
}

/// Kind of record a per-record sync failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Customer,
    Invoice,
}

/// One record that could not be synchronized. The rest of the batch continues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecordError {
    pub kind: RecordKind,

    /// External id (customers) or invoice number (invoices)
    pub key: String,

    pub message: String,
}

impl SyncRecordError {
    pub fn new(kind: RecordKind, key: impl Into<String>, error: &AppError) -> Self {
        Self {
            kind,
            key: key.into(),
            message: error.to_string(),
        }
    }
}

/// Result of synchronizing one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub source: Source,
    pub force: bool,
    pub customers_created: usize,
    pub customers_updated: usize,
    pub customers_skipped: usize,
    pub invoices_created: usize,
    pub invoices_updated: usize,
    pub invoices_skipped: usize,
    pub errors: Vec<SyncRecordError>,

    /// Set when the source could not be reached and nothing was synced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn new(source: Source, force: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            source,
            force,
            customers_created: 0,
            customers_updated: 0,
            customers_skipped: 0,
            invoices_created: 0,
            invoices_updated: 0,
            invoices_skipped: 0,
            errors: Vec::new(),
            error: None,
            started_at,
            finished_at: started_at,
        }
    }

    /// Report for a source whose sync aborted.
    pub fn failed(source: Source, force: bool, started_at: DateTime<Utc>, error: &AppError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(source, force, started_at)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Number of rows written during the run.
    pub fn mutations(&self) -> usize {
        self.customers_created + self.customers_updated + self.invoices_created + self.invoices_updated
    }
}

/// What an upsert did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped,
}

/// Per-source freshness summary.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SourceSyncStatus {
    pub source: Source,
    pub customer_count: i64,
    pub invoice_count: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
}
