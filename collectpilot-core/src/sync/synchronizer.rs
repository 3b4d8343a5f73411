use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use crate::adapters::{with_timeout, Adapters, ExternalAccount, ExternalInvoice, SourceInvoiceStatus};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::customer::{Source, UpsertCustomer};
use crate::models::invoice::{days_overdue, UpsertInvoice};
use crate::models::InvoiceStatus;
use crate::store::Store;
use crate::sync::types::{
    RecordKind, SourceSyncStatus, SyncRecordError, SyncReport, SyncTarget, UpsertOutcome,
};

/// Whether an existing record may be rewritten.
///
/// A forced sync always rewrites; otherwise the record must be older than
/// the staleness threshold.
pub fn needs_refresh(
    last_synced_at: DateTime<Utc>,
    now: DateTime<Utc>,
    force: bool,
    stale_after: chrono::Duration,
) -> bool {
    force || now - last_synced_at > stale_after
}

/// Maps source payment state plus days overdue onto the local status.
///
/// Precedence: paid, partially paid, overdue (positive days), pending.
pub fn derive_status(source_status: SourceInvoiceStatus, days_overdue: i32) -> InvoiceStatus {
    match source_status {
        SourceInvoiceStatus::Paid => InvoiceStatus::Paid,
        SourceInvoiceStatus::PartiallyPaid => InvoiceStatus::Partial,
        SourceInvoiceStatus::Open if days_overdue > 0 => InvoiceStatus::Overdue,
        SourceInvoiceStatus::Open => InvoiceStatus::Pending,
    }
}

/// Pulls accounts and invoices from the external systems into the local store.
///
/// Records are processed sequentially; a failure on one record is captured in
/// the report and the batch continues, while a failure reaching the source
/// aborts the batch with one error.
///
/// Every run pulls the full invoice list. The staleness guard alone decides
/// which records are written, so a change skipped inside the window is picked
/// up by the first run after it.
pub struct Synchronizer {
    store: Arc<dyn Store>,
    adapters: Adapters,
    stale_after: chrono::Duration,
    timeout: Duration,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn Store>, adapters: Adapters, config: &Config) -> Self {
        Self {
            store,
            adapters,
            stale_after: config.sync_stale_after,
            timeout: config.external_timeout,
        }
    }

    pub fn adapters(&self) -> &Adapters {
        &self.adapters
    }

    /// Synchronizes one source, or every configured source for `SyncTarget::All`.
    ///
    /// Each source runs in turn and gets one report. A source that could not
    /// be reached is reported with its aggregate error and the next source
    /// still runs.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no adapter serves the target, or the
    /// aggregate error of the last failure when no source could be synced.
    pub async fn sync(&self, target: SyncTarget, force: bool) -> Result<Vec<SyncReport>> {
        let sources = match target.single() {
            Some(source) => vec![source],
            None => self.adapters.configured(),
        };
        if sources.is_empty() {
            return Err(AppError::configuration("No external systems configured"));
        }

        let mut reports = Vec::with_capacity(sources.len());
        let mut last_error = None;
        for source in sources {
            match self.sync_source(source, force).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    reports.push(SyncReport::failed(source, force, Utc::now(), &e));
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if reports.iter().all(SyncReport::is_failed) => Err(e),
            _ => Ok(reports),
        }
    }

    pub async fn sync_source(&self, source: Source, force: bool) -> Result<SyncReport> {
        self.sync_source_at(source, force, Utc::now()).await
    }

    /// Same as `sync_source` with an explicit clock reading.
    #[instrument(skip(self))]
    pub(crate) async fn sync_source_at(
        &self,
        source: Source,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<SyncReport> {
        let adapter = self.adapters.get(source)?;
        info!("Starting {} sync (force: {})", source, force);

        let accounts = with_timeout(
            self.timeout,
            &format!("{} list_accounts", source),
            adapter.list_accounts(),
        )
        .await
        .map_err(|e| aborted(source, "accounts", e))?;

        let invoices = with_timeout(
            self.timeout,
            &format!("{} list_invoices", source),
            adapter.list_invoices(None),
        )
        .await
        .map_err(|e| aborted(source, "invoices", e))?;

        let mut report = SyncReport::new(source, force, now);

        for account in accounts {
            let key = account.external_id.clone();
            match self.upsert_customer(source, account, force, now).await {
                Ok(UpsertOutcome::Created) => report.customers_created += 1,
                Ok(UpsertOutcome::Updated) => report.customers_updated += 1,
                Ok(UpsertOutcome::Skipped) => report.customers_skipped += 1,
                Err(e) => {
                    warn!("Failed to sync {} customer {}: {}", source, key, e);
                    report.errors.push(SyncRecordError::new(RecordKind::Customer, key, &e));
                }
            }
        }

        for invoice in invoices {
            let key = invoice.invoice_number.clone();
            match self.upsert_invoice(source, invoice, force, now).await {
                Ok(UpsertOutcome::Created) => report.invoices_created += 1,
                Ok(UpsertOutcome::Updated) => report.invoices_updated += 1,
                Ok(UpsertOutcome::Skipped) => report.invoices_skipped += 1,
                Err(e) => {
                    warn!("Failed to sync {} invoice {}: {}", source, key, e);
                    report.errors.push(SyncRecordError::new(RecordKind::Invoice, key, &e));
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "{} sync finished: {} mutations, {} errors",
            source,
            report.mutations(),
            report.errors.len()
        );
        Ok(report)
    }

    pub async fn status(&self) -> Result<Vec<SourceSyncStatus>> {
        self.store.sync_status().await
    }

    async fn upsert_customer(
        &self,
        source: Source,
        account: ExternalAccount,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        if account.external_id.trim().is_empty() {
            return Err(AppError::validation("Account has no external id"));
        }

        let existing = self
            .store
            .find_customer_by_external_id(source, &account.external_id)
            .await?;

        let upsert = UpsertCustomer {
            external_id: account.external_id,
            source,
            name: account.name,
            account_health: account.account_health,
            total_revenue: account.total_revenue,
            payment_history: account.payment_history,
            synced_at: now,
        };

        match existing {
            None => {
                self.store.insert_customer(&upsert).await?;
                Ok(UpsertOutcome::Created)
            }
            Some(customer) if needs_refresh(customer.last_synced_at, now, force, self.stale_after) => {
                self.store.update_customer(customer.id, &upsert).await?;
                Ok(UpsertOutcome::Updated)
            }
            Some(_) => Ok(UpsertOutcome::Skipped),
        }
    }

    async fn upsert_invoice(
        &self,
        source: Source,
        invoice: ExternalInvoice,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        if invoice.invoice_number.trim().is_empty() {
            return Err(AppError::validation("Invoice has no number"));
        }
        if invoice.amount.is_sign_negative() {
            return Err(AppError::validation(format!(
                "Invoice {} has a negative amount",
                invoice.invoice_number
            )));
        }

        let customer = self
            .store
            .find_customer_by_external_id(source, &invoice.account_external_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "{} account {} for invoice {}",
                    source, invoice.account_external_id, invoice.invoice_number
                ))
            })?;

        let existing = self.store.find_invoice_by_number(&invoice.invoice_number).await?;

        let overdue = days_overdue(invoice.due_date, now.date_naive());
        let mut upsert = UpsertInvoice {
            customer_id: customer.id,
            invoice_number: invoice.invoice_number,
            amount: invoice.amount,
            due_date: invoice.due_date,
            paid_date: invoice.paid_date,
            status: derive_status(invoice.source_status, overdue),
            days_overdue: overdue,
            source,
            synced_at: now,
        };
        if upsert.status == InvoiceStatus::Paid {
            upsert.days_overdue = 0;
        }

        match existing {
            None => {
                self.store.insert_invoice(&upsert).await?;
                Ok(UpsertOutcome::Created)
            }
            Some(current) if needs_refresh(current.synced_at, now, force, self.stale_after) => {
                // Paid invoices never revert.
                if current.status == InvoiceStatus::Paid {
                    upsert.status = InvoiceStatus::Paid;
                    upsert.paid_date = current.paid_date.or(upsert.paid_date);
                    upsert.days_overdue = 0;
                }
                self.store.update_invoice(current.id, &upsert).await?;
                Ok(UpsertOutcome::Updated)
            }
            Some(_) => Ok(UpsertOutcome::Skipped),
        }
    }
}

fn aborted(source: Source, what: &str, e: AppError) -> AppError {
    error!("{} sync aborted while fetching {}: {}", source, what, e);
    AppError::external_service(
        source.as_str(),
        format!("Sync aborted while fetching {}: {}", what, e),
    )
}
