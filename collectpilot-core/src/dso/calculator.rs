use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{clamp_limit, DsoMetric, Invoice};
use crate::store::Store;

/// Benchmark DSO in days used for progress displays.
pub const TARGET_DSO: i64 = 35;

/// Days in the month used to turn outstanding balance into a daily run-rate.
const DAYS_PER_MONTH: i64 = 30;

/// Amount-weighted average days overdue over the outstanding invoices.
///
/// `Σ(amount × days_overdue) / Σ(amount)`, or zero when nothing is
/// outstanding. Invoices that are not pending or overdue are ignored.
pub fn weighted_dso(invoices: &[Invoice]) -> Decimal {
    let (weighted, total) = invoices
        .iter()
        .filter(|i| i.is_outstanding())
        .fold((Decimal::ZERO, Decimal::ZERO), |(weighted, total), i| {
            (
                weighted + i.amount * Decimal::from(i.days_overdue),
                total + i.amount,
            )
        });

    if total.is_zero() {
        Decimal::ZERO
    } else {
        weighted / total
    }
}

/// Sum of outstanding invoice amounts.
pub fn total_outstanding(invoices: &[Invoice]) -> Decimal {
    invoices
        .iter()
        .filter(|i| i.is_outstanding())
        .map(|i| i.amount)
        .sum()
}

/// Heuristic cash freed by `improvement` days: daily run-rate approximated
/// as outstanding / 30, times the days gained. Not a cash-flow model.
pub fn working_capital_impact(improvement: Decimal, total_outstanding: Decimal) -> Decimal {
    improvement * total_outstanding / Decimal::from(DAYS_PER_MONTH)
}

/// Rounds a day count to the nearest whole day, halves away from zero.
pub fn round_days(value: Decimal) -> i64 {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Builds a snapshot from the invoice set and the previous snapshot, if any.
pub fn build_snapshot(
    invoices: &[Invoice],
    previous: Option<&DsoMetric>,
    calculated_at: DateTime<Utc>,
) -> DsoMetric {
    let current_dso = weighted_dso(invoices);
    let outstanding = total_outstanding(invoices);
    let improvement = previous
        .map(|p| p.current_dso - current_dso)
        .unwrap_or(Decimal::ZERO);

    DsoMetric {
        id: Uuid::new_v4(),
        current_dso,
        improvement,
        total_outstanding: outstanding,
        working_capital_impact: working_capital_impact(improvement, outstanding),
        invoice_count: invoices.iter().filter(|i| i.is_outstanding()).count() as i32,
        calculated_at,
    }
}

/// DSO snapshot as returned over HTTP: full-precision values plus the
/// rounded day counts and the benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsoMetricResponse {
    #[serde(flatten)]
    pub metric: DsoMetric,

    pub current_dso_days: i64,

    pub improvement_days: i64,

    pub target_dso: i64,
}

impl From<DsoMetric> for DsoMetricResponse {
    fn from(metric: DsoMetric) -> Self {
        Self {
            current_dso_days: round_days(metric.current_dso),
            improvement_days: round_days(metric.improvement),
            target_dso: TARGET_DSO,
            metric,
        }
    }
}

/// Computes and persists DSO snapshots.
pub struct DsoCalculator {
    store: Arc<dyn Store>,
}

impl DsoCalculator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Ad hoc snapshot against the latest persisted one. Nothing is written.
    pub async fn calculate(&self) -> Result<DsoMetric> {
        let now = Utc::now();
        let today = now.date_naive();
        let mut invoices = self.store.outstanding_invoices().await?;
        for invoice in &mut invoices {
            invoice.refresh_derived(today);
        }
        let previous = self.store.latest_dso_metric().await?;
        Ok(build_snapshot(&invoices, previous.as_ref(), now))
    }

    /// Appends a new snapshot to the time series.
    #[instrument(skip(self))]
    pub async fn recalculate(&self) -> Result<DsoMetric> {
        let snapshot = self.calculate().await?;
        let stored = self.store.insert_dso_metric(&snapshot).await?;
        info!(
            "DSO recalculated: {} days over {} invoices (improvement {})",
            stored.current_dso.round_dp(2),
            stored.invoice_count,
            stored.improvement.round_dp(2)
        );
        Ok(stored)
    }

    /// Latest snapshot, or an ad hoc one when none has been persisted.
    pub async fn current(&self) -> Result<DsoMetric> {
        match self.store.latest_dso_metric().await? {
            Some(metric) => Ok(metric),
            None => self.calculate().await,
        }
    }

    /// Snapshots newest first.
    pub async fn history(&self, limit: Option<i64>) -> Result<Vec<DsoMetric>> {
        self.store.list_dso_metrics(clamp_limit(limit)).await
    }
}
