use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;

use crate::error::Result;
use crate::models::customer::CustomerFilter;
use crate::models::invoice::{InvoiceFilter, UpdateInvoiceStatus};
use crate::models::{Customer, Invoice};
use crate::state::AppState;

/// Customer listing endpoint handler.
///
/// Handles GET requests to `/api/customers`. Inactive customers are only
/// included with `include_inactive=true`.
pub async fn list_customers_handler(
    State(state): State<AppState>,
    Query(filter): Query<CustomerFilter>,
) -> Result<Json<Vec<Customer>>> {
    Ok(Json(state.accounts.list_customers(&filter).await?))
}

/// Handles GET requests to `/api/customers/:id`.
pub async fn get_customer_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>> {
    Ok(Json(state.accounts.get_customer(id).await?))
}

/// Customer deactivation endpoint handler.
///
/// Handles POST requests to `/api/customers/:id/deactivate`. The customer
/// and its history are kept.
pub async fn deactivate_customer_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>> {
    Ok(Json(state.accounts.deactivate_customer(id).await?))
}

/// Invoice listing endpoint handler.
///
/// Handles GET requests to `/api/invoices`, filtered by status and customer.
/// Status is evaluated as of today.
pub async fn list_invoices_handler(
    State(state): State<AppState>,
    Query(filter): Query<InvoiceFilter>,
) -> Result<Json<Vec<Invoice>>> {
    Ok(Json(state.accounts.list_invoices(&filter).await?))
}

/// Handles GET requests to `/api/invoices/:id`.
pub async fn get_invoice_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>> {
    Ok(Json(state.accounts.get_invoice(id).await?))
}

/// Manual invoice status endpoint handler.
///
/// Handles PATCH requests to `/api/invoices/:id`. Only `paid` and `partial`
/// are accepted.
pub async fn update_invoice_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateInvoiceStatus>,
) -> Result<Json<Invoice>> {
    Ok(Json(state.accounts.update_invoice_status(id, &update).await?))
}
