use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::approval::NewApproval;
use crate::models::customer::{CustomerFilter, UpsertCustomer};
use crate::models::invoice::{InvoiceFilter, UpsertInvoice};
use crate::models::outcome::NewOutcome;
use crate::models::recommendation::{NewRecommendation, RecommendationFilter};
use crate::models::{
    clamp_limit, Approval, CollectionOutcome, Customer, DsoMetric, Invoice, InvoiceStatus,
    OutcomeRecord, Recommendation, RecommendationStatus, Source,
};
use crate::store::Store;
use crate::sync::types::SourceSyncStatus;

#[derive(Default)]
struct Tables {
    customers: HashMap<Uuid, Customer>,
    invoices: HashMap<Uuid, Invoice>,
    recommendations: HashMap<Uuid, Recommendation>,
    approvals: HashMap<Uuid, Approval>,
    outcomes: HashMap<Uuid, CollectionOutcome>,
    dso_metrics: Vec<DsoMetric>,
    /// Execution claims by recommendation id
    execution_claims: HashMap<Uuid, DateTime<Utc>>,
}

impl Tables {
    fn mark_invoice_paid(&mut self, invoice_id: Uuid, paid_date: NaiveDate) {
        if let Some(invoice) = self.invoices.get_mut(&invoice_id) {
            invoice.status = InvoiceStatus::Paid;
            invoice.paid_date = invoice.paid_date.or(Some(paid_date));
            invoice.days_overdue = 0;
            invoice.updated_at = Utc::now();
        }
    }
}

/// In-memory store with the same uniqueness and conditional-update semantics
/// as `PostgresStore`. Every operation runs under a single lock, which
/// serializes writes per key.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_customer(target: &mut Customer, customer: &UpsertCustomer) {
    target.name = customer.name.clone();
    target.account_health = customer.account_health;
    target.total_revenue = customer.total_revenue;
    target.payment_history = Json(customer.payment_history.clone());
    target.last_synced_at = customer.synced_at;
    target.updated_at = Utc::now();
}

fn apply_invoice(target: &mut Invoice, invoice: &UpsertInvoice) {
    target.customer_id = invoice.customer_id;
    target.amount = invoice.amount;
    target.due_date = invoice.due_date;
    target.paid_date = invoice.paid_date;
    target.status = invoice.status;
    target.days_overdue = invoice.days_overdue;
    target.synced_at = invoice.synced_at;
    target.updated_at = Utc::now();
}

fn build_outcome(id: Uuid, outcome: &NewOutcome, created_at: DateTime<Utc>) -> CollectionOutcome {
    CollectionOutcome {
        id,
        recommendation_id: outcome.recommendation_id,
        invoice_id: outcome.invoice_id,
        payment_received: outcome.payment_received,
        days_to_payment: outcome.days_to_payment,
        customer_response: outcome.customer_response,
        amount_collected: outcome.amount_collected,
        collected_at: outcome.collected_at,
        impact_notes: outcome.impact_notes.clone(),
        created_at,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_customer_by_external_id(
        &self,
        source: Source,
        external_id: &str,
    ) -> Result<Option<Customer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .customers
            .values()
            .find(|c| c.source == source && c.external_id == external_id)
            .cloned())
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        Ok(self.tables.read().await.customers.get(&id).cloned())
    }

    async fn insert_customer(&self, customer: &UpsertCustomer) -> Result<Customer> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .customers
            .values_mut()
            .find(|c| c.source == customer.source && c.external_id == customer.external_id)
        {
            apply_customer(existing, customer);
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let created = Customer {
            id: Uuid::new_v4(),
            external_id: customer.external_id.clone(),
            source: customer.source,
            name: customer.name.clone(),
            account_health: customer.account_health,
            total_revenue: customer.total_revenue,
            payment_history: Json(customer.payment_history.clone()),
            is_active: true,
            last_synced_at: customer.synced_at,
            created_at: now,
            updated_at: now,
        };
        tables.customers.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_customer(&self, id: Uuid, customer: &UpsertCustomer) -> Result<Customer> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .customers
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("customer {}", id)))?;
        apply_customer(existing, customer);
        Ok(existing.clone())
    }

    async fn list_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        let tables = self.tables.read().await;
        let mut customers: Vec<Customer> = tables
            .customers
            .values()
            .filter(|c| filter.include_inactive || c.is_active)
            .filter(|c| filter.source.map_or(true, |s| c.source == s))
            .cloned()
            .collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn deactivate_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        let mut tables = self.tables.write().await;
        Ok(tables.customers.get_mut(&id).map(|c| {
            c.is_active = false;
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn sync_status(&self) -> Result<Vec<SourceSyncStatus>> {
        let tables = self.tables.read().await;
        let mut status = Vec::new();
        for source in Source::ALL {
            let customers: Vec<&Customer> =
                tables.customers.values().filter(|c| c.source == source).collect();
            if customers.is_empty() {
                continue;
            }
            status.push(SourceSyncStatus {
                source,
                customer_count: customers.len() as i64,
                invoice_count: tables.invoices.values().filter(|i| i.source == source).count()
                    as i64,
                last_synced_at: customers.iter().map(|c| c.last_synced_at).max(),
            });
        }
        Ok(status)
    }

    async fn find_invoice_by_number(&self, invoice_number: &str) -> Result<Option<Invoice>> {
        let tables = self.tables.read().await;
        Ok(tables
            .invoices
            .values()
            .find(|i| i.invoice_number == invoice_number)
            .cloned())
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>> {
        Ok(self.tables.read().await.invoices.get(&id).cloned())
    }

    async fn insert_invoice(&self, invoice: &UpsertInvoice) -> Result<Invoice> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .invoices
            .values_mut()
            .find(|i| i.invoice_number == invoice.invoice_number)
        {
            let was_paid = existing.status == InvoiceStatus::Paid;
            let paid_date = existing.paid_date;
            apply_invoice(existing, invoice);
            if was_paid {
                existing.status = InvoiceStatus::Paid;
                existing.paid_date = paid_date.or(invoice.paid_date);
            }
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let created = Invoice {
            id: Uuid::new_v4(),
            customer_id: invoice.customer_id,
            invoice_number: invoice.invoice_number.clone(),
            amount: invoice.amount,
            due_date: invoice.due_date,
            paid_date: invoice.paid_date,
            status: invoice.status,
            days_overdue: invoice.days_overdue,
            source: invoice.source,
            created_at: now,
            synced_at: invoice.synced_at,
            updated_at: now,
        };
        tables.invoices.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_invoice(&self, id: Uuid, invoice: &UpsertInvoice) -> Result<Invoice> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .invoices
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("invoice {}", id)))?;
        apply_invoice(existing, invoice);
        Ok(existing.clone())
    }

    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        today: NaiveDate,
    ) -> Result<Vec<Invoice>> {
        let tables = self.tables.read().await;
        let mut invoices: Vec<Invoice> = tables
            .invoices
            .values()
            .filter(|i| filter.customer_id.map_or(true, |c| i.customer_id == c))
            .cloned()
            .map(|mut i| {
                i.refresh_derived(today);
                i
            })
            .filter(|i| filter.status.map_or(true, |s| i.status == s))
            .collect();
        invoices.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| a.invoice_number.cmp(&b.invoice_number))
        });
        invoices.truncate(clamp_limit(filter.limit) as usize);
        Ok(invoices)
    }

    async fn outstanding_invoices(&self) -> Result<Vec<Invoice>> {
        let tables = self.tables.read().await;
        let mut invoices: Vec<Invoice> = tables
            .invoices
            .values()
            .filter(|i| i.is_outstanding())
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.due_date);
        Ok(invoices)
    }

    async fn set_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        paid_date: Option<NaiveDate>,
    ) -> Result<Option<Invoice>> {
        let mut tables = self.tables.write().await;
        Ok(tables.invoices.get_mut(&id).map(|invoice| {
            invoice.status = status;
            invoice.paid_date = paid_date.or(invoice.paid_date);
            if status == InvoiceStatus::Paid {
                invoice.days_overdue = 0;
            }
            invoice.updated_at = Utc::now();
            invoice.clone()
        }))
    }

    async fn insert_dso_metric(&self, metric: &DsoMetric) -> Result<DsoMetric> {
        self.tables.write().await.dso_metrics.push(metric.clone());
        Ok(metric.clone())
    }

    async fn latest_dso_metric(&self) -> Result<Option<DsoMetric>> {
        let tables = self.tables.read().await;
        Ok(tables
            .dso_metrics
            .iter()
            .max_by_key(|m| m.calculated_at)
            .cloned())
    }

    async fn list_dso_metrics(&self, limit: i64) -> Result<Vec<DsoMetric>> {
        let tables = self.tables.read().await;
        let mut metrics = tables.dso_metrics.clone();
        metrics.sort_by(|a, b| b.calculated_at.cmp(&a.calculated_at));
        metrics.truncate(limit.max(0) as usize);
        Ok(metrics)
    }

    async fn insert_recommendation(&self, rec: &NewRecommendation) -> Result<Recommendation> {
        let now = Utc::now();
        let created = Recommendation {
            id: Uuid::new_v4(),
            customer_id: rec.customer_id,
            invoice_id: rec.invoice_id,
            strategy: rec.strategy,
            confidence: rec.confidence,
            risk_assessment: rec.risk_assessment,
            draft_content: rec.draft_content.clone(),
            reasoning: rec.reasoning.clone(),
            status: RecommendationStatus::Pending,
            execution_error: None,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.write().await;
        let active = tables.recommendations.values().any(|r| {
            r.customer_id == rec.customer_id
                && r.invoice_id == rec.invoice_id
                && !r.status.is_terminal()
        });
        if active {
            return Err(AppError::conflict(format!(
                "An active recommendation already exists for invoice {}",
                rec.invoice_id
            )));
        }
        tables.recommendations.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_recommendation(&self, id: Uuid) -> Result<Option<Recommendation>> {
        Ok(self.tables.read().await.recommendations.get(&id).cloned())
    }

    async fn list_recommendations(
        &self,
        filter: &RecommendationFilter,
    ) -> Result<Vec<Recommendation>> {
        let tables = self.tables.read().await;
        let mut recs: Vec<Recommendation> = tables
            .recommendations
            .values()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        recs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recs.truncate(clamp_limit(filter.limit) as usize);
        Ok(recs)
    }

    async fn find_active_recommendation(
        &self,
        customer_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Recommendation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .recommendations
            .values()
            .filter(|r| r.customer_id == customer_id && r.invoice_id == invoice_id)
            .filter(|r| !r.status.is_terminal())
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn update_recommendation_draft(
        &self,
        id: Uuid,
        draft_content: &str,
    ) -> Result<Option<Recommendation>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .recommendations
            .get_mut(&id)
            .filter(|r| r.status == RecommendationStatus::Pending)
            .map(|r| {
                r.draft_content = draft_content.to_string();
                r.updated_at = Utc::now();
                r.clone()
            }))
    }

    async fn record_decision(
        &self,
        approval: &NewApproval,
    ) -> Result<Option<(Recommendation, Approval)>> {
        let mut tables = self.tables.write().await;
        let Some(rec) = tables
            .recommendations
            .get_mut(&approval.recommendation_id)
            .filter(|r| r.status == RecommendationStatus::Pending)
        else {
            return Ok(None);
        };

        rec.status = approval.action.into();
        rec.updated_at = Utc::now();
        let rec = rec.clone();

        let recorded = Approval {
            id: Uuid::new_v4(),
            recommendation_id: approval.recommendation_id,
            user_id: approval.user_id,
            action: approval.action,
            modified_content: approval.modified_content.clone(),
            approved_at: approval.approved_at,
            executed_at: None,
        };
        tables.approvals.insert(recorded.id, recorded.clone());
        Ok(Some((rec, recorded)))
    }

    async fn claim_execution(
        &self,
        recommendation_id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let executable = tables
            .recommendations
            .get(&recommendation_id)
            .map_or(false, |r| r.status.is_executable());
        let held = tables
            .execution_claims
            .get(&recommendation_id)
            .map_or(false, |claimed_at| *claimed_at >= stale_before);
        if !executable || held {
            return Ok(false);
        }
        tables.execution_claims.insert(recommendation_id, now);
        Ok(true)
    }

    async fn mark_executed(
        &self,
        recommendation_id: Uuid,
        approval_id: Uuid,
        executed_at: DateTime<Utc>,
    ) -> Result<Option<(Recommendation, Approval)>> {
        let mut tables = self.tables.write().await;
        let executable = tables
            .recommendations
            .get(&recommendation_id)
            .map_or(false, |r| r.status.is_executable());
        let approval_matches = tables
            .approvals
            .get(&approval_id)
            .map_or(false, |a| a.recommendation_id == recommendation_id);
        if !executable || !approval_matches {
            return Ok(None);
        }

        let approval = match tables.approvals.get_mut(&approval_id) {
            Some(a) => {
                a.executed_at = Some(executed_at.max(a.approved_at));
                a.clone()
            }
            None => return Ok(None),
        };
        let rec = match tables.recommendations.get_mut(&recommendation_id) {
            Some(r) => {
                r.status = RecommendationStatus::Executed;
                r.execution_error = None;
                r.updated_at = Utc::now();
                r.clone()
            }
            None => return Ok(None),
        };
        tables.execution_claims.remove(&recommendation_id);
        Ok(Some((rec, approval)))
    }

    async fn set_execution_error(
        &self,
        recommendation_id: Uuid,
        error: Option<&str>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(rec) = tables.recommendations.get_mut(&recommendation_id) {
            rec.execution_error = error.map(str::to_string);
            rec.updated_at = Utc::now();
        }
        tables.execution_claims.remove(&recommendation_id);
        Ok(())
    }

    async fn list_approvals(&self, recommendation_id: Uuid) -> Result<Vec<Approval>> {
        let tables = self.tables.read().await;
        let mut approvals: Vec<Approval> = tables
            .approvals
            .values()
            .filter(|a| a.recommendation_id == recommendation_id)
            .cloned()
            .collect();
        approvals.sort_by_key(|a| a.approved_at);
        Ok(approvals)
    }

    async fn insert_outcome(&self, outcome: &NewOutcome) -> Result<CollectionOutcome> {
        let mut tables = self.tables.write().await;
        let created = build_outcome(Uuid::new_v4(), outcome, Utc::now());
        tables.outcomes.insert(created.id, created.clone());
        if outcome.payment_received {
            tables.mark_invoice_paid(outcome.invoice_id, outcome.collected_at.date_naive());
        }
        Ok(created)
    }

    async fn get_outcome(&self, id: Uuid) -> Result<Option<CollectionOutcome>> {
        Ok(self.tables.read().await.outcomes.get(&id).cloned())
    }

    async fn update_outcome(
        &self,
        id: Uuid,
        outcome: &NewOutcome,
    ) -> Result<Option<CollectionOutcome>> {
        let mut tables = self.tables.write().await;
        let Some(created_at) = tables.outcomes.get(&id).map(|o| o.created_at) else {
            return Ok(None);
        };
        let updated = build_outcome(id, outcome, created_at);
        tables.outcomes.insert(id, updated.clone());
        if outcome.payment_received {
            tables.mark_invoice_paid(outcome.invoice_id, outcome.collected_at.date_naive());
        }
        Ok(Some(updated))
    }

    async fn list_outcomes(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CollectionOutcome>> {
        let tables = self.tables.read().await;
        let mut outcomes: Vec<CollectionOutcome> = tables
            .outcomes
            .values()
            .filter(|o| o.collected_at >= since)
            .cloned()
            .collect();
        outcomes.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        outcomes.truncate(limit.max(0) as usize);
        Ok(outcomes)
    }

    async fn outcome_records(&self, since: DateTime<Utc>) -> Result<Vec<OutcomeRecord>> {
        let tables = self.tables.read().await;
        let mut records = Vec::new();
        for outcome in tables.outcomes.values().filter(|o| o.collected_at >= since) {
            let Some(invoice) = tables.invoices.get(&outcome.invoice_id) else {
                continue;
            };
            let Some(customer) = tables.customers.get(&invoice.customer_id) else {
                continue;
            };
            let rec = outcome
                .recommendation_id
                .and_then(|id| tables.recommendations.get(&id));
            records.push(OutcomeRecord {
                outcome_id: outcome.id,
                payment_received: outcome.payment_received,
                days_to_payment: outcome.days_to_payment,
                amount_collected: outcome.amount_collected,
                collected_at: outcome.collected_at,
                invoice_amount: invoice.amount,
                account_health: customer.account_health,
                strategy: rec.map(|r| r.strategy),
                confidence: rec.map(|r| r.confidence),
            });
        }
        records.sort_by_key(|r| r.collected_at);
        Ok(records)
    }
}
