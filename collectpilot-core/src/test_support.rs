//! Fakes and fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::adapters::{
    Adapters, ExternalAccount, ExternalInvoice, ExternalSystemAdapter, SourceInvoiceStatus,
};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::customer::{AccountHealth, Source, UpsertCustomer};
use crate::models::invoice::{days_overdue, UpsertInvoice};
use crate::models::recommendation::{RiskLevel, Strategy};
use crate::models::{Customer, Invoice, InvoiceStatus};
use crate::recommendations::scoring::{RecommendationScorer, ScoringInput, ScoringOutput};
use crate::store::{MemoryStore, Store};

/// Logged call to `log_activity`.
#[derive(Debug, Clone)]
pub struct LoggedActivity {
    pub account_ref: String,
    pub subject: String,
    pub note: String,
}

/// Scriptable in-memory adapter.
pub struct FakeAdapter {
    source: Source,
    accounts: Mutex<Vec<ExternalAccount>>,
    invoices: Mutex<Vec<ExternalInvoice>>,
    fail_listing: AtomicBool,
    fail_activity: AtomicBool,
    activities: Mutex<Vec<LoggedActivity>>,
    activity_delay: Mutex<Option<std::time::Duration>>,
    invoice_since: Mutex<Vec<Option<DateTime<Utc>>>>,
    /// Source-side modification times; `list_invoices(Some(since))` only
    /// returns invoices modified at or after `since`.
    modified_at: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl FakeAdapter {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            accounts: Mutex::new(Vec::new()),
            invoices: Mutex::new(Vec::new()),
            fail_listing: AtomicBool::new(false),
            fail_activity: AtomicBool::new(false),
            activities: Mutex::new(Vec::new()),
            activity_delay: Mutex::new(None),
            invoice_since: Mutex::new(Vec::new()),
            modified_at: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_accounts(&self, accounts: Vec<ExternalAccount>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn set_invoices(&self, invoices: Vec<ExternalInvoice>) {
        *self.invoices.lock().unwrap() = invoices;
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_activity(&self, fail: bool) {
        self.fail_activity.store(fail, Ordering::SeqCst);
    }

    /// Records a source-side modification of an invoice.
    pub fn touch_invoice(&self, invoice_number: &str, at: DateTime<Utc>) {
        self.modified_at
            .lock()
            .unwrap()
            .insert(invoice_number.to_string(), at);
    }

    /// Makes every `log_activity` call take `delay` before answering.
    pub fn set_activity_delay(&self, delay: std::time::Duration) {
        *self.activity_delay.lock().unwrap() = Some(delay);
    }

    pub fn activities(&self) -> Vec<LoggedActivity> {
        self.activities.lock().unwrap().clone()
    }

    pub fn invoice_since_calls(&self) -> Vec<Option<DateTime<Utc>>> {
        self.invoice_since.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExternalSystemAdapter for FakeAdapter {
    fn source(&self) -> Source {
        self.source
    }

    async fn list_accounts(&self) -> Result<Vec<ExternalAccount>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(AppError::external_service(self.source.as_str(), "connection refused"));
        }
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn list_invoices(&self, since: Option<DateTime<Utc>>) -> Result<Vec<ExternalInvoice>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(AppError::external_service(self.source.as_str(), "connection refused"));
        }
        self.invoice_since.lock().unwrap().push(since);
        let invoices = self.invoices.lock().unwrap().clone();
        let Some(since) = since else {
            return Ok(invoices);
        };
        let modified_at = self.modified_at.lock().unwrap();
        Ok(invoices
            .into_iter()
            .filter(|i| modified_at.get(&i.invoice_number).map_or(true, |at| *at >= since))
            .collect())
    }

    async fn log_activity(&self, account_ref: &str, subject: &str, note: &str) -> Result<()> {
        let delay = *self.activity_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_activity.load(Ordering::SeqCst) {
            return Err(AppError::external_service(self.source.as_str(), "activity rejected"));
        }
        self.activities.lock().unwrap().push(LoggedActivity {
            account_ref: account_ref.to_string(),
            subject: subject.to_string(),
            note: note.to_string(),
        });
        Ok(())
    }
}

/// Scorer returning a fixed answer and counting invocations.
pub struct FakeScorer {
    pub confidence: i32,
    pub strategy: Strategy,
    calls: AtomicUsize,
}

impl FakeScorer {
    pub fn new(confidence: i32) -> Self {
        Self {
            confidence,
            strategy: Strategy::UrgentNotice,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecommendationScorer for FakeScorer {
    async fn analyze(&self, input: &ScoringInput) -> Result<ScoringOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ScoringOutput {
            strategy: self.strategy,
            confidence: self.confidence,
            risk_assessment: RiskLevel::Medium,
            draft_content: format!("Please settle invoice {}", input.invoice.invoice_number),
            reasoning: "fixed test answer".to_string(),
        })
    }
}

/// Config with a short external timeout for tests.
pub fn test_config() -> Config {
    Config {
        external_timeout: std::time::Duration::from_secs(2),
        ..Config::default()
    }
}

pub fn memory_store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

pub fn adapters_with(crm: Arc<FakeAdapter>, erp: Option<Arc<FakeAdapter>>) -> Adapters {
    Adapters::new(
        Some(crm as Arc<dyn ExternalSystemAdapter>),
        erp.map(|a| a as Arc<dyn ExternalSystemAdapter>),
    )
}

pub fn account(external_id: &str, name: &str, health: AccountHealth) -> ExternalAccount {
    ExternalAccount {
        external_id: external_id.to_string(),
        name: name.to_string(),
        account_health: health,
        total_revenue: Decimal::new(100_000, 0),
        payment_history: Vec::new(),
    }
}

pub fn external_invoice(
    number: &str,
    account_external_id: &str,
    amount: i64,
    due_date: NaiveDate,
    status: SourceInvoiceStatus,
) -> ExternalInvoice {
    ExternalInvoice {
        invoice_number: number.to_string(),
        account_external_id: account_external_id.to_string(),
        amount: Decimal::new(amount, 0),
        due_date,
        paid_date: None,
        source_status: status,
    }
}

pub async fn seed_customer(store: &Arc<dyn Store>, external_id: &str, health: AccountHealth) -> Customer {
    store
        .insert_customer(&UpsertCustomer {
            external_id: external_id.to_string(),
            source: Source::Crm,
            name: format!("Customer {}", external_id),
            account_health: health,
            total_revenue: Decimal::new(50_000, 0),
            payment_history: Vec::new(),
            synced_at: Utc::now(),
        })
        .await
        .expect("seed customer")
}

/// Seeds an open invoice that is `overdue_by` days past due today.
pub async fn seed_invoice(
    store: &Arc<dyn Store>,
    customer: &Customer,
    number: &str,
    amount: Decimal,
    overdue_by: i64,
) -> Invoice {
    let today = Utc::now().date_naive();
    let due_date = today - Duration::days(overdue_by);
    let overdue = days_overdue(due_date, today);
    store
        .insert_invoice(&UpsertInvoice {
            customer_id: customer.id,
            invoice_number: number.to_string(),
            amount,
            due_date,
            paid_date: None,
            status: if overdue > 0 {
                InvoiceStatus::Overdue
            } else {
                InvoiceStatus::Pending
            },
            days_overdue: overdue,
            source: Source::Crm,
            synced_at: Utc::now(),
        })
        .await
        .expect("seed invoice")
}
