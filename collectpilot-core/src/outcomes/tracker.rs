use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::outcome::{NewOutcome, OutcomeQuery, RecordOutcome};
use crate::models::{clamp_limit, CollectionOutcome};
use crate::outcomes::analytics::{self, OutcomeAnalytics};
use crate::store::Store;

/// Analytics window used when the caller gives none.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Longest window accepted, in days.
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Validates a caller-supplied window in days.
pub fn window_days(days: Option<i64>) -> Result<i64> {
    let days = days.unwrap_or(DEFAULT_WINDOW_DAYS);
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(AppError::validation(format!(
            "days must be between 1 and {}",
            MAX_WINDOW_DAYS
        )));
    }
    Ok(days)
}

/// Records collection outcomes and serves the analytics built on them.
pub struct OutcomeTracker {
    store: Arc<dyn Store>,
}

impl OutcomeTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records an outcome. When payment was received the owning invoice is
    /// marked paid in the same write.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown invoice or recommendation, `Validation` for
    /// negative values or a recommendation that belongs to another invoice.
    #[instrument(skip(self, request), fields(invoice_id = %request.invoice_id))]
    pub async fn record_outcome(&self, request: &RecordOutcome) -> Result<CollectionOutcome> {
        let outcome = self.normalize(request).await?;
        let recorded = self.store.insert_outcome(&outcome).await?;
        info!(
            "Recorded outcome {} (payment received: {})",
            recorded.id, recorded.payment_received
        );
        Ok(recorded)
    }

    /// Corrective rewrite of an existing outcome.
    pub async fn update_outcome(
        &self,
        id: Uuid,
        request: &RecordOutcome,
    ) -> Result<CollectionOutcome> {
        let existing = self
            .store
            .get_outcome(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("outcome {}", id)))?;

        let mut outcome = self.normalize(request).await?;
        if request.collected_at.is_none() {
            outcome.collected_at = existing.collected_at;
        }

        let updated = self
            .store
            .update_outcome(id, &outcome)
            .await?
            .ok_or_else(|| AppError::not_found(format!("outcome {}", id)))?;
        info!("Updated outcome {}", updated.id);
        Ok(updated)
    }

    pub async fn list_outcomes(&self, query: &OutcomeQuery) -> Result<Vec<CollectionOutcome>> {
        let days = window_days(query.days)?;
        let since = Utc::now() - Duration::days(days);
        self.store
            .list_outcomes(since, clamp_limit(query.limit))
            .await
    }

    pub async fn analytics(&self, days: Option<i64>) -> Result<OutcomeAnalytics> {
        let days = window_days(days)?;
        let since = Utc::now() - Duration::days(days);
        let records = self.store.outcome_records(since).await?;
        Ok(analytics::build(&records, days))
    }

    async fn normalize(&self, request: &RecordOutcome) -> Result<NewOutcome> {
        let invoice = self
            .store
            .get_invoice(request.invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("invoice {}", request.invoice_id)))?;

        if let Some(rec_id) = request.recommendation_id {
            let rec = self
                .store
                .get_recommendation(rec_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("recommendation {}", rec_id)))?;
            if rec.invoice_id != invoice.id {
                return Err(AppError::validation(format!(
                    "Recommendation {} does not refer to invoice {}",
                    rec_id, invoice.invoice_number
                )));
            }
        }

        if request.days_to_payment.map_or(false, |d| d < 0) {
            return Err(AppError::validation("days_to_payment must not be negative"));
        }
        if request
            .amount_collected
            .map_or(false, |a| a < Decimal::ZERO)
        {
            return Err(AppError::validation("amount_collected must not be negative"));
        }

        let (days_to_payment, amount_collected) = if request.payment_received {
            (
                request.days_to_payment,
                Some(request.amount_collected.unwrap_or(invoice.amount)),
            )
        } else {
            (None, None)
        };

        Ok(NewOutcome {
            recommendation_id: request.recommendation_id,
            invoice_id: invoice.id,
            payment_received: request.payment_received,
            days_to_payment,
            customer_response: request.customer_response,
            amount_collected,
            collected_at: request.collected_at.unwrap_or_else(Utc::now),
            impact_notes: request.notes.clone(),
        })
    }
}
