//! Uniform access to the CRM and ERP systems accounts and invoices are pulled from.
//!
//! Each concrete adapter owns a pure mapping from its source's payload shape
//! to the canonical `ExternalAccount` / `ExternalInvoice`, so schema drift in
//! a third-party API stays inside one file.

pub mod crm;
pub mod erp;
pub mod http;

pub use crm::CrmAdapter;
pub use erp::ErpAdapter;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::customer::{AccountHealth, PaymentRecord, Source};

/// Canonical account record returned by every adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAccount {
    pub external_id: String,
    pub name: String,
    pub account_health: AccountHealth,
    pub total_revenue: Decimal,
    pub payment_history: Vec<PaymentRecord>,
}

/// Payment state as reported by the source, before local status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceInvoiceStatus {
    Open,
    PartiallyPaid,
    Paid,
}

/// Canonical invoice record returned by every adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalInvoice {
    pub invoice_number: String,
    /// External id of the owning account in the same source
    pub account_external_id: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub source_status: SourceInvoiceStatus,
}

/// Interface to one external system of record.
#[async_trait]
pub trait ExternalSystemAdapter: Send + Sync {
    fn source(&self) -> Source;

    async fn list_accounts(&self) -> Result<Vec<ExternalAccount>>;

    /// Invoices changed since `since`, or all invoices when `None`.
    async fn list_invoices(&self, since: Option<DateTime<Utc>>) -> Result<Vec<ExternalInvoice>>;

    /// Records a collection activity against the account in the source system.
    async fn log_activity(&self, account_ref: &str, subject: &str, note: &str) -> Result<()>;
}

/// The configured adapters, keyed by source.
#[derive(Clone, Default)]
pub struct Adapters {
    crm: Option<Arc<dyn ExternalSystemAdapter>>,
    erp: Option<Arc<dyn ExternalSystemAdapter>>,
}

impl Adapters {
    pub fn new(
        crm: Option<Arc<dyn ExternalSystemAdapter>>,
        erp: Option<Arc<dyn ExternalSystemAdapter>>,
    ) -> Self {
        Self { crm, erp }
    }

    /// Builds HTTP adapters for every source that has a base URL configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let crm = match &config.crm {
            Some(c) => Some(Arc::new(CrmAdapter::new(c, config.external_timeout)?)
                as Arc<dyn ExternalSystemAdapter>),
            None => None,
        };
        let erp = match &config.erp {
            Some(c) => Some(Arc::new(ErpAdapter::new(c, config.external_timeout)?)
                as Arc<dyn ExternalSystemAdapter>),
            None => None,
        };
        Ok(Self { crm, erp })
    }

    pub fn get(&self, source: Source) -> Result<Arc<dyn ExternalSystemAdapter>> {
        let adapter = match source {
            Source::Crm => self.crm.clone(),
            Source::Erp => self.erp.clone(),
        };
        adapter.ok_or_else(|| {
            AppError::configuration(format!("No adapter configured for source {}", source))
        })
    }

    pub fn configured(&self) -> Vec<Source> {
        Source::ALL
            .into_iter()
            .filter(|s| match s {
                Source::Crm => self.crm.is_some(),
                Source::Erp => self.erp.is_some(),
            })
            .collect()
    }
}

/// Runs an external call under `limit`, reporting expiry as a timeout error.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::timeout(operation)),
    }
}
