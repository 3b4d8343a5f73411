use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
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

const CUSTOMER_COLUMNS: &str = r#"
    id, external_id, source, name, account_health, total_revenue,
    payment_history, is_active, last_synced_at, created_at, updated_at
"#;

const INVOICE_COLUMNS: &str = r#"
    id, customer_id, invoice_number, amount, due_date, paid_date, status,
    days_overdue, source, created_at, synced_at, updated_at
"#;

const RECOMMENDATION_COLUMNS: &str = r#"
    id, customer_id, invoice_id, strategy, confidence, risk_assessment,
    draft_content, reasoning, status, execution_error, created_at, updated_at
"#;

const APPROVAL_COLUMNS: &str = r#"
    id, recommendation_id, user_id, action, modified_content, approved_at, executed_at
"#;

const OUTCOME_COLUMNS: &str = r#"
    id, recommendation_id, invoice_id, payment_received, days_to_payment,
    customer_response, amount_collected, collected_at, impact_notes, created_at, updated_at
"#;

const DSO_COLUMNS: &str = r#"
    id, current_dso, improvement, total_outstanding, working_capital_impact,
    invoice_count, calculated_at
"#;

/// PostgreSQL-backed store.
///
/// Upserts rely on the `customers(source, external_id)` and
/// `invoices(invoice_number)` unique constraints so concurrent syncs of the
/// same key resolve to last-writer-wins.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_customer_by_external_id(
        &self,
        source: Source,
        external_id: &str,
    ) -> Result<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE source = $1 AND external_id = $2",
            CUSTOMER_COLUMNS
        ))
        .bind(source)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(customer)
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE id = $1",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(customer)
    }

    async fn insert_customer(&self, customer: &UpsertCustomer) -> Result<Customer> {
        let inserted = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers (
                external_id, source, name, account_health, total_revenue,
                payment_history, last_synced_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source, external_id) DO UPDATE SET
                name = EXCLUDED.name,
                account_health = EXCLUDED.account_health,
                total_revenue = EXCLUDED.total_revenue,
                payment_history = EXCLUDED.payment_history,
                last_synced_at = EXCLUDED.last_synced_at,
                updated_at = NOW()
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(&customer.external_id)
        .bind(customer.source)
        .bind(&customer.name)
        .bind(customer.account_health)
        .bind(customer.total_revenue)
        .bind(Json(&customer.payment_history))
        .bind(customer.synced_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn update_customer(&self, id: Uuid, customer: &UpsertCustomer) -> Result<Customer> {
        let updated = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers SET
                name = $2,
                account_health = $3,
                total_revenue = $4,
                payment_history = $5,
                last_synced_at = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .bind(&customer.name)
        .bind(customer.account_health)
        .bind(customer.total_revenue)
        .bind(Json(&customer.payment_history))
        .bind(customer.synced_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn list_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT {} FROM customers
            WHERE ($1 OR is_active = true)
                AND ($2::varchar IS NULL OR source = $2)
            ORDER BY name ASC
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(filter.include_inactive)
        .bind(filter.source)
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    async fn deactivate_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "UPDATE customers SET is_active = false, updated_at = NOW() WHERE id = $1 RETURNING {}",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(customer)
    }

    async fn sync_status(&self) -> Result<Vec<SourceSyncStatus>> {
        let status = sqlx::query_as::<_, SourceSyncStatus>(
            r#"
            SELECT
                c.source,
                COUNT(*) AS customer_count,
                (SELECT COUNT(*) FROM invoices i WHERE i.source = c.source) AS invoice_count,
                MAX(c.last_synced_at) AS last_synced_at
            FROM customers c
            GROUP BY c.source
            ORDER BY c.source
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(status)
    }

    async fn find_invoice_by_number(&self, invoice_number: &str) -> Result<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE invoice_number = $1",
            INVOICE_COLUMNS
        ))
        .bind(invoice_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invoice)
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invoice)
    }

    async fn insert_invoice(&self, invoice: &UpsertInvoice) -> Result<Invoice> {
        let inserted = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                customer_id, invoice_number, amount, due_date, paid_date,
                status, days_overdue, source, synced_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (invoice_number) DO UPDATE SET
                customer_id = EXCLUDED.customer_id,
                amount = EXCLUDED.amount,
                due_date = EXCLUDED.due_date,
                paid_date = COALESCE(invoices.paid_date, EXCLUDED.paid_date),
                status = CASE WHEN invoices.status = 'paid' THEN invoices.status ELSE EXCLUDED.status END,
                days_overdue = EXCLUDED.days_overdue,
                synced_at = EXCLUDED.synced_at,
                updated_at = NOW()
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice.customer_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.amount)
        .bind(invoice.due_date)
        .bind(invoice.paid_date)
        .bind(invoice.status)
        .bind(invoice.days_overdue)
        .bind(invoice.source)
        .bind(invoice.synced_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn update_invoice(&self, id: Uuid, invoice: &UpsertInvoice) -> Result<Invoice> {
        let updated = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices SET
                customer_id = $2,
                amount = $3,
                due_date = $4,
                paid_date = $5,
                status = $6,
                days_overdue = $7,
                synced_at = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(id)
        .bind(invoice.customer_id)
        .bind(invoice.amount)
        .bind(invoice.due_date)
        .bind(invoice.paid_date)
        .bind(invoice.status)
        .bind(invoice.days_overdue)
        .bind(invoice.synced_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        today: NaiveDate,
    ) -> Result<Vec<Invoice>> {
        // A pending invoice past its due date counts as overdue.
        let mut invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {} FROM invoices
            WHERE ($1::varchar IS NULL OR (
                    CASE WHEN status = 'pending' AND due_date < $4 THEN 'overdue' ELSE status END
                ) = $1)
                AND ($2::uuid IS NULL OR customer_id = $2)
            ORDER BY due_date ASC, invoice_number ASC
            LIMIT $3
            "#,
            INVOICE_COLUMNS
        ))
        .bind(filter.status)
        .bind(filter.customer_id)
        .bind(clamp_limit(filter.limit))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        for invoice in &mut invoices {
            invoice.refresh_derived(today);
        }
        Ok(invoices)
    }

    async fn outstanding_invoices(&self) -> Result<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE status IN ('pending', 'overdue') ORDER BY due_date ASC",
            INVOICE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(invoices)
    }

    async fn set_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        paid_date: Option<NaiveDate>,
    ) -> Result<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices SET
                status = $2,
                paid_date = COALESCE($3, paid_date),
                days_overdue = CASE WHEN $2 = 'paid' THEN 0 ELSE days_overdue END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(id)
        .bind(status)
        .bind(paid_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invoice)
    }

    async fn insert_dso_metric(&self, metric: &DsoMetric) -> Result<DsoMetric> {
        let inserted = sqlx::query_as::<_, DsoMetric>(&format!(
            r#"
            INSERT INTO dso_metrics (
                id, current_dso, improvement, total_outstanding,
                working_capital_impact, invoice_count, calculated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            DSO_COLUMNS
        ))
        .bind(metric.id)
        .bind(metric.current_dso)
        .bind(metric.improvement)
        .bind(metric.total_outstanding)
        .bind(metric.working_capital_impact)
        .bind(metric.invoice_count)
        .bind(metric.calculated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn latest_dso_metric(&self) -> Result<Option<DsoMetric>> {
        let metric = sqlx::query_as::<_, DsoMetric>(&format!(
            "SELECT {} FROM dso_metrics ORDER BY calculated_at DESC LIMIT 1",
            DSO_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(metric)
    }

    async fn list_dso_metrics(&self, limit: i64) -> Result<Vec<DsoMetric>> {
        let metrics = sqlx::query_as::<_, DsoMetric>(&format!(
            "SELECT {} FROM dso_metrics ORDER BY calculated_at DESC LIMIT $1",
            DSO_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(metrics)
    }

    async fn insert_recommendation(&self, rec: &NewRecommendation) -> Result<Recommendation> {
        let inserted = sqlx::query_as::<_, Recommendation>(&format!(
            r#"
            INSERT INTO recommendations (
                customer_id, invoice_id, strategy, confidence, risk_assessment,
                draft_content, reasoning, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            RETURNING {}
            "#,
            RECOMMENDATION_COLUMNS
        ))
        .bind(rec.customer_id)
        .bind(rec.invoice_id)
        .bind(rec.strategy)
        .bind(rec.confidence)
        .bind(rec.risk_assessment)
        .bind(&rec.draft_content)
        .bind(&rec.reasoning)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            // idx_recommendations_one_active
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::conflict(
                format!(
                    "An active recommendation already exists for invoice {}",
                    rec.invoice_id
                ),
            ),
            other => other.into(),
        })?;
        Ok(inserted)
    }

    async fn get_recommendation(&self, id: Uuid) -> Result<Option<Recommendation>> {
        let rec = sqlx::query_as::<_, Recommendation>(&format!(
            "SELECT {} FROM recommendations WHERE id = $1",
            RECOMMENDATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn list_recommendations(
        &self,
        filter: &RecommendationFilter,
    ) -> Result<Vec<Recommendation>> {
        let recs = sqlx::query_as::<_, Recommendation>(&format!(
            r#"
            SELECT {} FROM recommendations
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            RECOMMENDATION_COLUMNS
        ))
        .bind(filter.status)
        .bind(clamp_limit(filter.limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(recs)
    }

    async fn find_active_recommendation(
        &self,
        customer_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Recommendation>> {
        let rec = sqlx::query_as::<_, Recommendation>(&format!(
            r#"
            SELECT {} FROM recommendations
            WHERE customer_id = $1 AND invoice_id = $2
                AND status IN ('pending', 'approved', 'modified')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            RECOMMENDATION_COLUMNS
        ))
        .bind(customer_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn update_recommendation_draft(
        &self,
        id: Uuid,
        draft_content: &str,
    ) -> Result<Option<Recommendation>> {
        let rec = sqlx::query_as::<_, Recommendation>(&format!(
            r#"
            UPDATE recommendations SET draft_content = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            RECOMMENDATION_COLUMNS
        ))
        .bind(id)
        .bind(draft_content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn record_decision(
        &self,
        approval: &NewApproval,
    ) -> Result<Option<(Recommendation, Approval)>> {
        let mut tx = self.pool.begin().await?;

        let target: RecommendationStatus = approval.action.into();
        let rec = sqlx::query_as::<_, Recommendation>(&format!(
            r#"
            UPDATE recommendations SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            RECOMMENDATION_COLUMNS
        ))
        .bind(approval.recommendation_id)
        .bind(target)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(rec) = rec else {
            tx.rollback().await?;
            return Ok(None);
        };

        let recorded = sqlx::query_as::<_, Approval>(&format!(
            r#"
            INSERT INTO approvals (
                recommendation_id, user_id, action, modified_content, approved_at
            ) VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            APPROVAL_COLUMNS
        ))
        .bind(approval.recommendation_id)
        .bind(approval.user_id)
        .bind(approval.action)
        .bind(&approval.modified_content)
        .bind(approval.approved_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            "Recommendation {} moved to {} by user {}",
            rec.id, rec.status, recorded.user_id
        );
        Ok(Some((rec, recorded)))
    }

    async fn claim_execution(
        &self,
        recommendation_id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let claimed = sqlx::query(
            r#"
            UPDATE recommendations SET execution_claimed_at = $2
            WHERE id = $1 AND status IN ('approved', 'modified')
                AND (execution_claimed_at IS NULL OR execution_claimed_at < $3)
            "#,
        )
        .bind(recommendation_id)
        .bind(now)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;
        Ok(claimed.rows_affected() == 1)
    }

    async fn mark_executed(
        &self,
        recommendation_id: Uuid,
        approval_id: Uuid,
        executed_at: DateTime<Utc>,
    ) -> Result<Option<(Recommendation, Approval)>> {
        let mut tx = self.pool.begin().await?;

        let rec = sqlx::query_as::<_, Recommendation>(&format!(
            r#"
            UPDATE recommendations
            SET status = 'executed', execution_error = NULL, execution_claimed_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('approved', 'modified')
            RETURNING {}
            "#,
            RECOMMENDATION_COLUMNS
        ))
        .bind(recommendation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(rec) = rec else {
            tx.rollback().await?;
            return Ok(None);
        };

        let approval = sqlx::query_as::<_, Approval>(&format!(
            r#"
            UPDATE approvals SET executed_at = GREATEST($3, approved_at)
            WHERE id = $1 AND recommendation_id = $2
            RETURNING {}
            "#,
            APPROVAL_COLUMNS
        ))
        .bind(approval_id)
        .bind(recommendation_id)
        .bind(executed_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(approval) = approval else {
            tx.rollback().await?;
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some((rec, approval)))
    }

    async fn set_execution_error(
        &self,
        recommendation_id: Uuid,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE recommendations
            SET execution_error = $2, execution_claimed_at = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(recommendation_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_approvals(&self, recommendation_id: Uuid) -> Result<Vec<Approval>> {
        let approvals = sqlx::query_as::<_, Approval>(&format!(
            "SELECT {} FROM approvals WHERE recommendation_id = $1 ORDER BY approved_at ASC",
            APPROVAL_COLUMNS
        ))
        .bind(recommendation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(approvals)
    }

    async fn insert_outcome(&self, outcome: &NewOutcome) -> Result<CollectionOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, CollectionOutcome>(&format!(
            r#"
            INSERT INTO collection_outcomes (
                recommendation_id, invoice_id, payment_received, days_to_payment,
                customer_response, amount_collected, collected_at, impact_notes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            OUTCOME_COLUMNS
        ))
        .bind(outcome.recommendation_id)
        .bind(outcome.invoice_id)
        .bind(outcome.payment_received)
        .bind(outcome.days_to_payment)
        .bind(outcome.customer_response)
        .bind(outcome.amount_collected)
        .bind(outcome.collected_at)
        .bind(&outcome.impact_notes)
        .fetch_one(&mut *tx)
        .await?;

        if outcome.payment_received {
            mark_invoice_paid(&mut tx, outcome.invoice_id, outcome.collected_at.date_naive())
                .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_outcome(&self, id: Uuid) -> Result<Option<CollectionOutcome>> {
        let outcome = sqlx::query_as::<_, CollectionOutcome>(&format!(
            "SELECT {} FROM collection_outcomes WHERE id = $1",
            OUTCOME_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(outcome)
    }

    async fn update_outcome(
        &self,
        id: Uuid,
        outcome: &NewOutcome,
    ) -> Result<Option<CollectionOutcome>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, CollectionOutcome>(&format!(
            r#"
            UPDATE collection_outcomes SET
                recommendation_id = $2,
                invoice_id = $3,
                payment_received = $4,
                days_to_payment = $5,
                customer_response = $6,
                amount_collected = $7,
                collected_at = $8,
                impact_notes = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            OUTCOME_COLUMNS
        ))
        .bind(id)
        .bind(outcome.recommendation_id)
        .bind(outcome.invoice_id)
        .bind(outcome.payment_received)
        .bind(outcome.days_to_payment)
        .bind(outcome.customer_response)
        .bind(outcome.amount_collected)
        .bind(outcome.collected_at)
        .bind(&outcome.impact_notes)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_some() && outcome.payment_received {
            mark_invoice_paid(&mut tx, outcome.invoice_id, outcome.collected_at.date_naive())
                .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn list_outcomes(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CollectionOutcome>> {
        let outcomes = sqlx::query_as::<_, CollectionOutcome>(&format!(
            r#"
            SELECT {} FROM collection_outcomes
            WHERE collected_at >= $1
            ORDER BY collected_at DESC
            LIMIT $2
            "#,
            OUTCOME_COLUMNS
        ))
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(outcomes)
    }

    async fn outcome_records(&self, since: DateTime<Utc>) -> Result<Vec<OutcomeRecord>> {
        let records = sqlx::query_as::<_, OutcomeRecord>(
            r#"
            SELECT
                o.id AS outcome_id,
                o.payment_received,
                o.days_to_payment,
                o.amount_collected,
                o.collected_at,
                i.amount AS invoice_amount,
                c.account_health,
                r.strategy,
                r.confidence
            FROM collection_outcomes o
            JOIN invoices i ON i.id = o.invoice_id
            JOIN customers c ON c.id = i.customer_id
            LEFT JOIN recommendations r ON r.id = o.recommendation_id
            WHERE o.collected_at >= $1
            ORDER BY o.collected_at ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

async fn mark_invoice_paid(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    invoice_id: Uuid,
    paid_date: NaiveDate,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE invoices SET
            status = 'paid',
            paid_date = COALESCE(paid_date, $2),
            days_overdue = 0,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(invoice_id)
    .bind(paid_date)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
