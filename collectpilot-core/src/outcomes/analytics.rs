//! Read-only aggregations over collection outcomes.
//!
//! Everything here is a pure function of the joined outcome records so the
//! math can be tested without a store. Every rate returns 0 when its
//! denominator is empty.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{AccountHealth, OutcomeRecord, Strategy};

/// Percentage with two decimals; 0 when `whole` is 0.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 * 100.0 / whole as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn decimal_percentage(part: Decimal, whole: Decimal) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    (part * Decimal::ONE_HUNDRED / whole)
        .round_dp(2)
        .to_f64()
        .unwrap_or(0.0)
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        round2(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Metric set shared by the summary and every breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMetrics {
    pub total_outcomes: i64,

    pub successful: i64,

    /// Percent of outcomes with payment received
    pub success_rate: f64,

    /// Sum of the invoice amounts the outcomes refer to
    pub total_targeted: Decimal,

    pub total_collected: Decimal,

    /// Percent of targeted amount collected
    pub collection_rate: f64,

    /// Over successful outcomes only
    pub avg_days_to_payment: f64,

    /// Over outcomes tied to a recommendation
    pub avg_confidence: f64,
}

impl OutcomeMetrics {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a OutcomeRecord>) -> Self {
        let mut total = 0i64;
        let mut successful = 0i64;
        let mut targeted = Decimal::ZERO;
        let mut collected = Decimal::ZERO;
        let mut days = Vec::new();
        let mut confidences = Vec::new();

        for record in records {
            total += 1;
            targeted += record.invoice_amount;
            if record.payment_received {
                successful += 1;
                collected += record.amount_collected.unwrap_or(Decimal::ZERO);
                if let Some(d) = record.days_to_payment {
                    days.push(d as f64);
                }
            }
            if let Some(c) = record.confidence {
                confidences.push(c as f64);
            }
        }

        Self {
            total_outcomes: total,
            successful,
            success_rate: percentage(successful, total),
            total_targeted: targeted,
            total_collected: collected,
            collection_rate: decimal_percentage(collected, targeted),
            avg_days_to_payment: average(&days),
            avg_confidence: average(&confidences),
        }
    }
}

/// Bucket of recommendation confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    /// 90 and above
    High,
    /// 70 to 89
    Medium,
    /// Below 70
    Low,
}

impl ConfidenceBand {
    pub fn for_confidence(confidence: i32) -> Self {
        if confidence >= 90 {
            ConfidenceBand::High
        } else if confidence >= 70 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub strategy: Strategy,
    #[serde(flatten)]
    pub metrics: OutcomeMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceBandMetrics {
    pub band: ConfidenceBand,
    #[serde(flatten)]
    pub metrics: OutcomeMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub account_health: AccountHealth,
    #[serde(flatten)]
    pub metrics: OutcomeMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrendPoint {
    pub date: NaiveDate,
    pub total: i64,
    pub successful: i64,
    pub amount_collected: Decimal,
}

/// Full analytics payload for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeAnalytics {
    pub window_days: i64,
    pub summary: OutcomeMetrics,
    pub strategies: Vec<StrategyMetrics>,
    pub confidence_bands: Vec<ConfidenceBandMetrics>,
    pub account_health: Vec<HealthMetrics>,
    pub daily_trend: Vec<DailyTrendPoint>,
}

fn group_by<K, F>(records: &[OutcomeRecord], key: F) -> Vec<(K, OutcomeMetrics)>
where
    K: std::hash::Hash + Eq,
    F: Fn(&OutcomeRecord) -> Option<K>,
{
    let mut groups: HashMap<K, Vec<&OutcomeRecord>> = HashMap::new();
    for record in records {
        if let Some(k) = key(record) {
            groups.entry(k).or_default().push(record);
        }
    }
    groups
        .into_iter()
        .map(|(k, group)| (k, OutcomeMetrics::from_records(group)))
        .collect()
}

/// Highest success rate first; larger groups break ties.
fn by_success_desc(a: &OutcomeMetrics, b: &OutcomeMetrics) -> std::cmp::Ordering {
    b.success_rate
        .total_cmp(&a.success_rate)
        .then_with(|| b.total_outcomes.cmp(&a.total_outcomes))
}

pub fn strategy_breakdown(records: &[OutcomeRecord]) -> Vec<StrategyMetrics> {
    let mut rows: Vec<StrategyMetrics> = group_by(records, |r| r.strategy)
        .into_iter()
        .map(|(strategy, metrics)| StrategyMetrics { strategy, metrics })
        .collect();
    rows.sort_by(|a, b| {
        by_success_desc(&a.metrics, &b.metrics).then_with(|| a.strategy.cmp(&b.strategy))
    });
    rows
}

pub fn confidence_bands(records: &[OutcomeRecord]) -> Vec<ConfidenceBandMetrics> {
    let mut rows: Vec<ConfidenceBandMetrics> =
        group_by(records, |r| r.confidence.map(ConfidenceBand::for_confidence))
            .into_iter()
            .map(|(band, metrics)| ConfidenceBandMetrics { band, metrics })
            .collect();
    rows.sort_by(|a, b| by_success_desc(&a.metrics, &b.metrics));
    rows
}

pub fn health_breakdown(records: &[OutcomeRecord]) -> Vec<HealthMetrics> {
    let mut rows: Vec<HealthMetrics> = group_by(records, |r| Some(r.account_health))
        .into_iter()
        .map(|(account_health, metrics)| HealthMetrics {
            account_health,
            metrics,
        })
        .collect();
    rows.sort_by(|a, b| by_success_desc(&a.metrics, &b.metrics));
    rows
}

/// Per-day totals, oldest day first.
pub fn daily_trend(records: &[OutcomeRecord]) -> Vec<DailyTrendPoint> {
    let mut days: BTreeMap<NaiveDate, DailyTrendPoint> = BTreeMap::new();
    for record in records {
        let date = record.collected_at.date_naive();
        let point = days.entry(date).or_insert_with(|| DailyTrendPoint {
            date,
            total: 0,
            successful: 0,
            amount_collected: Decimal::ZERO,
        });
        point.total += 1;
        if record.payment_received {
            point.successful += 1;
            point.amount_collected += record.amount_collected.unwrap_or(Decimal::ZERO);
        }
    }
    days.into_values().collect()
}

pub fn build(records: &[OutcomeRecord], window_days: i64) -> OutcomeAnalytics {
    OutcomeAnalytics {
        window_days,
        summary: OutcomeMetrics::from_records(records),
        strategies: strategy_breakdown(records),
        confidence_bands: confidence_bands(records),
        account_health: health_breakdown(records),
        daily_trend: daily_trend(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn record(
        paid: bool,
        strategy: Option<Strategy>,
        confidence: Option<i32>,
        health: AccountHealth,
        day: u32,
    ) -> OutcomeRecord {
        OutcomeRecord {
            outcome_id: Uuid::new_v4(),
            payment_received: paid,
            days_to_payment: paid.then_some(10),
            amount_collected: paid.then(|| Decimal::new(100, 0)),
            collected_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
            invoice_amount: Decimal::new(100, 0),
            account_health: health,
            strategy,
            confidence,
        }
    }

    #[test]
    fn test_success_rate_seven_of_ten() {
        let records: Vec<OutcomeRecord> = (0..10)
            .map(|i| record(i < 7, None, None, AccountHealth::Good, 1))
            .collect();
        let summary = OutcomeMetrics::from_records(&records);

        assert_eq!(summary.total_outcomes, 10);
        assert_eq!(summary.successful, 7);
        assert_eq!(summary.success_rate, 70.0);
        assert_eq!(summary.collection_rate, 70.0);
        assert_eq!(summary.avg_days_to_payment, 10.0);
    }

    #[test]
    fn test_empty_window_is_all_zero() {
        let analytics = build(&[], 30);

        assert_eq!(analytics.summary.total_outcomes, 0);
        assert_eq!(analytics.summary.success_rate, 0.0);
        assert_eq!(analytics.summary.collection_rate, 0.0);
        assert_eq!(analytics.summary.avg_days_to_payment, 0.0);
        assert!(analytics.strategies.is_empty());
        assert!(analytics.daily_trend.is_empty());
    }

    #[test]
    fn test_average_days_only_counts_successes() {
        let mut failed = record(false, None, None, AccountHealth::Good, 1);
        failed.days_to_payment = Some(90);
        let records = vec![record(true, None, None, AccountHealth::Good, 1), failed];

        assert_eq!(OutcomeMetrics::from_records(&records).avg_days_to_payment, 10.0);
    }

    #[test]
    fn test_strategies_sorted_by_success_rate() {
        let records = vec![
            record(false, Some(Strategy::GentleReminder), Some(60), AccountHealth::Good, 1),
            record(true, Some(Strategy::GentleReminder), Some(60), AccountHealth::Good, 1),
            record(true, Some(Strategy::PersonalOutreach), Some(95), AccountHealth::Good, 1),
            record(true, None, None, AccountHealth::Good, 1),
        ];
        let rows = strategy_breakdown(&records);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].strategy, Strategy::PersonalOutreach);
        assert_eq!(rows[0].metrics.success_rate, 100.0);
        assert_eq!(rows[1].metrics.success_rate, 50.0);
    }

    #[test]
    fn test_confidence_band_boundaries() {
        assert_eq!(ConfidenceBand::for_confidence(90), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::for_confidence(89), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::for_confidence(70), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::for_confidence(69), ConfidenceBand::Low);
    }

    #[test]
    fn test_bands_and_health_groups() {
        let records = vec![
            record(true, Some(Strategy::UrgentNotice), Some(95), AccountHealth::Good, 1),
            record(false, Some(Strategy::UrgentNotice), Some(50), AccountHealth::Churning, 1),
            record(false, Some(Strategy::UrgentNotice), Some(75), AccountHealth::AtRisk, 2),
        ];

        let bands = confidence_bands(&records);
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0].band, ConfidenceBand::High);

        let health = health_breakdown(&records);
        assert_eq!(health.len(), 3);
        assert_eq!(health[0].account_health, AccountHealth::Good);
    }

    #[test]
    fn test_daily_trend_groups_by_day() {
        let records = vec![
            record(true, None, None, AccountHealth::Good, 3),
            record(false, None, None, AccountHealth::Good, 1),
            record(true, None, None, AccountHealth::Good, 3),
        ];
        let trend = daily_trend(&records);

        assert_eq!(trend.len(), 2);
        assert!(trend[0].date < trend[1].date);
        assert_eq!(trend[1].total, 2);
        assert_eq!(trend[1].amount_collected, Decimal::new(200, 0));
    }
}
