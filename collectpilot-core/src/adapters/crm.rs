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

/// `{ "records": [...] }` envelope used by every CRM list endpoint.
#[derive(Debug, Deserialize)]
struct RecordsEnvelope<T> {
    records: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CrmAccountRecord {
    pub id: String,
    pub name: String,
    /// Hot / Warm / Cold
    pub rating: Option<String>,
    pub annual_revenue: Option<Decimal>,
    #[serde(default)]
    pub payments: Vec<CrmPaymentRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CrmPaymentRecord {
    pub invoice_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CrmInvoiceRecord {
    pub invoice_number: String,
    pub account_id: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CrmActivity<'a> {
    account_id: &'a str,
    subject: &'a str,
    description: &'a str,
}

/// Maps the CRM account rating onto the local health classification.
pub fn health_from_rating(rating: Option<&str>) -> AccountHealth {
    match rating.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
        Some("warm") => AccountHealth::AtRisk,
        Some("cold") => AccountHealth::Churning,
        _ => AccountHealth::Good,
    }
}

pub fn map_invoice_status(status: &str) -> SourceInvoiceStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "paid" | "closed" => SourceInvoiceStatus::Paid,
        "partially paid" | "partial" => SourceInvoiceStatus::PartiallyPaid,
        _ => SourceInvoiceStatus::Open,
    }
}

pub fn map_account(record: CrmAccountRecord) -> ExternalAccount {
    ExternalAccount {
        account_health: health_from_rating(record.rating.as_deref()),
        external_id: record.id,
        name: record.name,
        total_revenue: record.annual_revenue.unwrap_or(Decimal::ZERO),
        payment_history: record
            .payments
            .into_iter()
            .map(|p| PaymentRecord {
                invoice_number: p.invoice_number,
                amount: p.amount,
                due_date: p.due_date,
                paid_date: p.paid_date,
            })
            .collect(),
    }
}

pub fn map_invoice(record: CrmInvoiceRecord) -> ExternalInvoice {
    ExternalInvoice {
        source_status: map_invoice_status(&record.status),
        invoice_number: record.invoice_number,
        account_external_id: record.account_id,
        amount: record.amount,
        due_date: record.due_date,
        paid_date: record.paid_date,
    }
}

/// Adapter for the CRM's REST API.
pub struct CrmAdapter {
    client: ApiClient,
}

impl CrmAdapter {
    pub fn new(config: &ExternalSystemConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(&config.base_url, config.api_token.clone(), "crm", timeout)?,
        })
    }
}

#[async_trait]
impl ExternalSystemAdapter for CrmAdapter {
    fn source(&self) -> Source {
        Source::Crm
    }

    #[instrument(skip(self))]
    async fn list_accounts(&self) -> Result<Vec<ExternalAccount>> {
        let envelope: RecordsEnvelope<CrmAccountRecord> =
            self.client.get("/accounts", &[("limit", "10000")]).await?;
        info!("CRM returned {} accounts", envelope.records.len());
        Ok(envelope.records.into_iter().map(map_account).collect())
    }

    #[instrument(skip(self))]
    async fn list_invoices(&self, since: Option<DateTime<Utc>>) -> Result<Vec<ExternalInvoice>> {
        let query: Vec<(&str, String)> = since
            .map(|s| vec![("modified_since", s.to_rfc3339())])
            .unwrap_or_default();
        let envelope: RecordsEnvelope<CrmInvoiceRecord> =
            self.client.get("/invoices", &query).await?;
        info!("CRM returned {} invoices", envelope.records.len());
        Ok(envelope.records.into_iter().map(map_invoice).collect())
    }

    async fn log_activity(&self, account_ref: &str, subject: &str, note: &str) -> Result<()> {
        let activity = CrmActivity {
            account_id: account_ref,
            subject,
            description: note,
        };
        self.client.post_unit("/activities", &activity).await
    }
}
