//! Persistence for the five engine entities plus the DSO time series.
//!
//! Implementations:
//! - `PostgresStore`: sqlx-backed storage with uniqueness constraints and
//!   conditional updates inside transactions
//! - `MemoryStore`: lock-guarded maps with the same semantics, for tests and
//!   database-less local runs

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::approval::NewApproval;
use crate::models::customer::{CustomerFilter, UpsertCustomer};
use crate::models::invoice::{InvoiceFilter, UpsertInvoice};
use crate::models::outcome::NewOutcome;
use crate::models::recommendation::{NewRecommendation, RecommendationFilter};
use crate::models::{
    Approval, CollectionOutcome, Customer, DsoMetric, Invoice, InvoiceStatus, OutcomeRecord,
    Recommendation, Source,
};
use crate::sync::types::SourceSyncStatus;

/// Interface every component persists through.
///
/// Workflow transitions (`record_decision`, `mark_executed`) are conditional:
/// they return `None` when the recommendation is not in the required state, so
/// two concurrent decisions can never both be accepted.
#[async_trait]
pub trait Store: Send + Sync {
    /// Verifies the backing store is reachable.
    async fn ping(&self) -> Result<()>;

    async fn find_customer_by_external_id(
        &self,
        source: Source,
        external_id: &str,
    ) -> Result<Option<Customer>>;

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>>;

    /// Inserts a customer; an existing `(source, external_id)` row is overwritten.
    async fn insert_customer(&self, customer: &UpsertCustomer) -> Result<Customer>;

    async fn update_customer(&self, id: Uuid, customer: &UpsertCustomer) -> Result<Customer>;

    async fn list_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>>;

    /// Marks a customer inactive. Customers are never deleted.
    async fn deactivate_customer(&self, id: Uuid) -> Result<Option<Customer>>;

    async fn sync_status(&self) -> Result<Vec<SourceSyncStatus>>;

    async fn find_invoice_by_number(&self, invoice_number: &str) -> Result<Option<Invoice>>;

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>>;

    /// Inserts an invoice; an existing `invoice_number` row is overwritten.
    async fn insert_invoice(&self, invoice: &UpsertInvoice) -> Result<Invoice>;

    async fn update_invoice(&self, id: Uuid, invoice: &UpsertInvoice) -> Result<Invoice>;

    /// Invoices matching the filter, with `days_overdue` and the
    /// pending→overdue promotion evaluated as of `today`. The status filter and
    /// the limit apply to that derived status.
    async fn list_invoices(&self, filter: &InvoiceFilter, today: NaiveDate)
        -> Result<Vec<Invoice>>;

    /// Invoices in `pending` or `overdue` status.
    async fn outstanding_invoices(&self) -> Result<Vec<Invoice>>;

    async fn set_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        paid_date: Option<NaiveDate>,
    ) -> Result<Option<Invoice>>;

    async fn insert_dso_metric(&self, metric: &DsoMetric) -> Result<DsoMetric>;

    async fn latest_dso_metric(&self) -> Result<Option<DsoMetric>>;

    /// Snapshots newest first.
    async fn list_dso_metrics(&self, limit: i64) -> Result<Vec<DsoMetric>>;

    /// Inserts a pending recommendation.
    ///
    /// Fails with `Conflict` while a pending, approved or modified
    /// recommendation exists for the same customer and invoice.
    async fn insert_recommendation(&self, rec: &NewRecommendation) -> Result<Recommendation>;

    async fn get_recommendation(&self, id: Uuid) -> Result<Option<Recommendation>>;

    async fn list_recommendations(
        &self,
        filter: &RecommendationFilter,
    ) -> Result<Vec<Recommendation>>;

    /// A pending, approved or modified recommendation for the pair, if any.
    async fn find_active_recommendation(
        &self,
        customer_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Recommendation>>;

    /// Replaces the draft of a pending recommendation.
    async fn update_recommendation_draft(
        &self,
        id: Uuid,
        draft_content: &str,
    ) -> Result<Option<Recommendation>>;

    /// Atomically moves a pending recommendation to the decided status and
    /// writes the approval record. `None` when it was no longer pending.
    async fn record_decision(
        &self,
        approval: &NewApproval,
    ) -> Result<Option<(Recommendation, Approval)>>;

    /// Claims the right to run the collection action of an approved/modified
    /// recommendation. `false` when it is not executable or another claim
    /// newer than `stale_before` holds it.
    async fn claim_execution(
        &self,
        recommendation_id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool>;

    /// Atomically moves an approved/modified recommendation to executed and
    /// stamps the approval. `None` when it was not executable. Releases the
    /// execution claim.
    async fn mark_executed(
        &self,
        recommendation_id: Uuid,
        approval_id: Uuid,
        executed_at: DateTime<Utc>,
    ) -> Result<Option<(Recommendation, Approval)>>;

    /// Stores the last execution failure and releases the execution claim.
    async fn set_execution_error(&self, recommendation_id: Uuid, error: Option<&str>)
        -> Result<()>;

    /// Decisions on a recommendation, oldest first.
    async fn list_approvals(&self, recommendation_id: Uuid) -> Result<Vec<Approval>>;

    /// Writes an outcome; when payment was received the owning invoice becomes
    /// `paid` with `paid_date` set from `collected_at`, in the same transaction.
    async fn insert_outcome(&self, outcome: &NewOutcome) -> Result<CollectionOutcome>;

    async fn get_outcome(&self, id: Uuid) -> Result<Option<CollectionOutcome>>;

    /// Corrective rewrite with the same invoice coupling as `insert_outcome`.
    async fn update_outcome(
        &self,
        id: Uuid,
        outcome: &NewOutcome,
    ) -> Result<Option<CollectionOutcome>>;

    /// Outcomes collected at or after `since`, newest first.
    async fn list_outcomes(&self, since: DateTime<Utc>, limit: i64)
        -> Result<Vec<CollectionOutcome>>;

    /// Outcomes since `since` joined with strategy, confidence, health and invoice amount.
    async fn outcome_records(&self, since: DateTime<Utc>) -> Result<Vec<OutcomeRecord>>;
}
