use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::with_timeout;
use crate::error::{AppError, Result};
use crate::models::recommendation::{NewRecommendation, RecommendationFilter};
use crate::models::{clamp_limit, InvoiceStatus, Recommendation};
use crate::recommendations::scoring::{RecommendationScorer, ScoringInput};
use crate::store::Store;

/// One overdue invoice the batch run could not produce a recommendation for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationError {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub message: String,
}

/// Result of `generate_for_overdue`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generated: Vec<Recommendation>,

    /// Overdue invoices that already had an active recommendation
    pub skipped: usize,

    pub errors: Vec<GenerationError>,
}

/// Turns (customer, invoice) pairs into pending recommendations through the
/// configured scorer.
pub struct RecommendationGenerator {
    store: Arc<dyn Store>,
    scorer: Arc<dyn RecommendationScorer>,
    timeout: Duration,
}

impl RecommendationGenerator {
    pub fn new(
        store: Arc<dyn Store>,
        scorer: Arc<dyn RecommendationScorer>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            scorer,
            timeout,
        }
    }

    /// Scores one pair and persists the result as `pending`.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the customer or invoice is missing, before the
    ///   scorer is called
    /// - `Validation` when the invoice belongs to another customer or is paid
    /// - `Conflict` when the pair already has an active recommendation
    /// - `ExternalService` / `Timeout` when the scorer fails
    #[instrument(skip(self))]
    pub async fn generate(&self, customer_id: Uuid, invoice_id: Uuid) -> Result<Recommendation> {
        let customer = self
            .store
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("customer {}", customer_id)))?;
        let mut invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("invoice {}", invoice_id)))?;

        if invoice.customer_id != customer.id {
            return Err(AppError::validation(format!(
                "Invoice {} does not belong to customer {}",
                invoice.invoice_number, customer.id
            )));
        }
        if invoice.status == InvoiceStatus::Paid {
            return Err(AppError::validation(format!(
                "Invoice {} is already paid",
                invoice.invoice_number
            )));
        }
        // Fails fast before scoring; the insert re-checks under the store's guard.
        if let Some(active) = self
            .store
            .find_active_recommendation(customer.id, invoice.id)
            .await?
        {
            return Err(AppError::conflict(format!(
                "Recommendation {} is still {} for invoice {}",
                active.id, active.status, invoice.invoice_number
            )));
        }

        invoice.refresh_derived(Utc::now().date_naive());
        let input = ScoringInput::new(invoice, customer);
        let output = with_timeout(
            self.timeout,
            &format!("{} analyze", self.scorer.name()),
            self.scorer.analyze(&input),
        )
        .await?;
        output.validate(self.scorer.name())?;

        let rec = self
            .store
            .insert_recommendation(&NewRecommendation {
                customer_id: input.customer.id,
                invoice_id: input.invoice.id,
                strategy: output.strategy,
                confidence: output.confidence,
                risk_assessment: output.risk_assessment,
                draft_content: output.draft_content,
                reasoning: output.reasoning,
            })
            .await?;

        info!(
            "Generated {} recommendation {} for invoice {} (confidence {})",
            rec.strategy, rec.id, input.invoice.invoice_number, rec.confidence
        );
        Ok(rec)
    }

    /// Generates recommendations for up to `limit` overdue invoices that have
    /// no active recommendation. Per-invoice failures are collected.
    pub async fn generate_for_overdue(&self, limit: Option<i64>) -> Result<GenerationReport> {
        let today = Utc::now().date_naive();
        let mut candidates = self.store.outstanding_invoices().await?;
        for invoice in &mut candidates {
            invoice.refresh_derived(today);
        }
        candidates.retain(|i| i.status == InvoiceStatus::Overdue);
        candidates.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue));

        let limit = clamp_limit(limit) as usize;
        let mut report = GenerationReport::default();

        for invoice in candidates {
            if report.generated.len() + report.errors.len() >= limit {
                break;
            }
            if self
                .store
                .find_active_recommendation(invoice.customer_id, invoice.id)
                .await?
                .is_some()
            {
                report.skipped += 1;
                continue;
            }
            match self.generate(invoice.customer_id, invoice.id).await {
                Ok(rec) => report.generated.push(rec),
                Err(e) => {
                    warn!(
                        "Recommendation generation failed for invoice {}: {}",
                        invoice.invoice_number, e
                    );
                    report.errors.push(GenerationError {
                        invoice_id: invoice.id,
                        invoice_number: invoice.invoice_number,
                        message: e.to_string(),
                    });
                }
            }
        }

        if !report.errors.is_empty() {
            error!(
                "Batch generation finished with {} failures",
                report.errors.len()
            );
        }
        Ok(report)
    }

    pub async fn list(&self, filter: &RecommendationFilter) -> Result<Vec<Recommendation>> {
        self.store.list_recommendations(filter).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Recommendation> {
        self.store
            .get_recommendation(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("recommendation {}", id)))
    }

    /// Replaces the draft while the recommendation is still pending.
    pub async fn update_draft(&self, id: Uuid, draft_content: &str) -> Result<Recommendation> {
        if draft_content.trim().is_empty() {
            return Err(AppError::validation("draft_content must not be empty"));
        }
        let current = self.get(id).await?;
        self.store
            .update_recommendation_draft(id, draft_content)
            .await?
            .ok_or_else(|| {
                AppError::conflict(format!(
                    "Recommendation {} is {}; only pending drafts can be edited",
                    id, current.status
                ))
            })
    }
}
