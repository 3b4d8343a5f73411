use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::adapters::http::ApiClient;
use crate::adapters::{ExternalAccount, ExternalInvoice, ExternalSystemAdapter, SourceInvoiceStatus};
use crate::config::ExternalSystemConfig;
use crate::error::Result;
use crate::models::customer::{AccountHealth, PaymentRecord, Source};

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErpCustomerRecord {
    pub customer_id: String,
    pub display_name: String,
    /// ok / watch / hold
    pub credit_status: Option<String>,
    #[serde(default)]
    pub lifetime_sales: Decimal,
    #[serde(default)]
    pub payments: Vec<ErpPaymentRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErpPaymentRecord {
    pub doc_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErpInvoiceRecord {
    pub doc_number: String,
    pub customer_id: String,
    pub total_amount: Decimal,
    /// Amount still owed
    pub balance: Decimal,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct ErpNote<'a> {
    subject: &'a str,
    note: &'a str,
}

/// Maps the ERP credit status onto the local health classification.
pub fn health_from_credit_status(credit_status: Option<&str>) -> AccountHealth {
    match credit_status.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("hold") | Some("blocked") => AccountHealth::Churning,
        Some("watch") => AccountHealth::AtRisk,
        _ => AccountHealth::Good,
    }
}

/// The ERP has no status field; payment state follows from the open balance.
pub fn status_from_balance(total: Decimal, balance: Decimal) -> SourceInvoiceStatus {
    if balance <= Decimal::ZERO {
        SourceInvoiceStatus::Paid
    } else if balance < total {
        SourceInvoiceStatus::PartiallyPaid
    } else {
        SourceInvoiceStatus::Open
    }
}

pub fn map_customer(record: ErpCustomerRecord) -> ExternalAccount {
    ExternalAccount {
        account_health: health_from_credit_status(record.credit_status.as_deref()),
        external_id: record.customer_id,
        name: record.display_name,
        total_revenue: record.lifetime_sales,
        payment_history: record
            .payments
            .into_iter()
            .map(|p| PaymentRecord {
                invoice_number: p.doc_number,
                amount: p.amount,
                due_date: p.due_date,
                paid_date: p.paid_date,
            })
            .collect(),
    }
}

pub fn map_invoice(record: ErpInvoiceRecord) -> ExternalInvoice {
    ExternalInvoice {
        source_status: status_from_balance(record.total_amount, record.balance),
        invoice_number: record.doc_number,
        account_external_id: record.customer_id,
        amount: record.total_amount,
        due_date: record.due_date,
        paid_date: record.paid_date,
    }
}

/// Adapter for the ERP's accounts-receivable API.
pub struct ErpAdapter {
    client: ApiClient,
}

impl ErpAdapter {
    pub fn new(config: &ExternalSystemConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(&config.base_url, config.api_token.clone(), "erp", timeout)?,
        })
    }
}

#[async_trait]
impl ExternalSystemAdapter for ErpAdapter {
    fn source(&self) -> Source {
        Source::Erp
    }

    #[instrument(skip(self))]
    async fn list_accounts(&self) -> Result<Vec<ExternalAccount>> {
        let response: ListResponse<ErpCustomerRecord> =
            self.client.get("/customers", &[("active", "true")]).await?;
        info!("ERP returned {} customers", response.data.len());
        Ok(response.data.into_iter().map(map_customer).collect())
    }

    #[instrument(skip(self))]
    async fn list_invoices(&self, since: Option<DateTime<Utc>>) -> Result<Vec<ExternalInvoice>> {
        let query: Vec<(&str, String)> = since
            .map(|s| vec![("updatedAfter", s.to_rfc3339())])
            .unwrap_or_default();
        let response: ListResponse<ErpInvoiceRecord> =
            self.client.get("/invoices", &query).await?;
        info!("ERP returned {} invoices", response.data.len());
        Ok(response.data.into_iter().map(map_invoice).collect())
    }

    async fn log_activity(&self, account_ref: &str, subject: &str, note: &str) -> Result<()> {
        self.client
            .post_unit(
                &format!("/customers/{}/notes", account_ref),
                &ErpNote { subject, note },
            )
            .await
    }
}
