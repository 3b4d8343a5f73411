//! Read and maintenance operations on synchronized customers and invoices.

pub mod handlers;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::customer::CustomerFilter;
use crate::models::invoice::{InvoiceFilter, UpdateInvoiceStatus};
use crate::models::{Customer, Invoice, InvoiceStatus};
use crate::store::Store;

pub use handlers::{
    deactivate_customer_handler, get_customer_handler, get_invoice_handler,
    list_customers_handler, list_invoices_handler, update_invoice_handler,
};

/// Customer and invoice access with derived fields refreshed on read.
pub struct AccountService {
    store: Arc<dyn Store>,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        self.store.list_customers(filter).await
    }

    pub async fn get_customer(&self, id: Uuid) -> Result<Customer> {
        self.store
            .get_customer(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("customer {}", id)))
    }

    pub async fn deactivate_customer(&self, id: Uuid) -> Result<Customer> {
        let customer = self
            .store
            .deactivate_customer(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("customer {}", id)))?;
        info!("Deactivated customer {} ({})", customer.name, customer.id);
        Ok(customer)
    }

    /// Invoices filtered on their status as of today, so a pending invoice
    /// that fell due since its last sync is listed as overdue.
    pub async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        self.store.list_invoices(filter, Utc::now().date_naive()).await
    }

    pub async fn get_invoice(&self, id: Uuid) -> Result<Invoice> {
        let mut invoice = self
            .store
            .get_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("invoice {}", id)))?;
        invoice.refresh_derived(Utc::now().date_naive());
        Ok(invoice)
    }

    /// Manual status change. Only `paid` and `partial` may be set by hand and
    /// a paid invoice never moves back.
    pub async fn update_invoice_status(
        &self,
        id: Uuid,
        update: &UpdateInvoiceStatus,
    ) -> Result<Invoice> {
        self.update_invoice_status_on(id, update, Utc::now().date_naive())
            .await
    }

    async fn update_invoice_status_on(
        &self,
        id: Uuid,
        update: &UpdateInvoiceStatus,
        today: NaiveDate,
    ) -> Result<Invoice> {
        if !matches!(update.status, InvoiceStatus::Paid | InvoiceStatus::Partial) {
            return Err(AppError::validation(format!(
                "Invoice status cannot be set to {} manually",
                update.status
            )));
        }

        let current = self.get_invoice(id).await?;
        if current.status == InvoiceStatus::Paid && update.status != InvoiceStatus::Paid {
            return Err(AppError::conflict(format!(
                "Invoice {} is already paid",
                current.invoice_number
            )));
        }

        let paid_date = match update.status {
            InvoiceStatus::Paid => Some(update.paid_date.unwrap_or(today)),
            _ => None,
        };
        let mut invoice = self
            .store
            .set_invoice_status(id, update.status, paid_date)
            .await?
            .ok_or_else(|| AppError::not_found(format!("invoice {}", id)))?;
        invoice.refresh_derived(today);

        info!(
            "Invoice {} manually set to {}",
            invoice.invoice_number, invoice.status
        );
        Ok(invoice)
    }
}
