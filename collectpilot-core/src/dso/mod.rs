//! Days Sales Outstanding: the amount-weighted average days overdue of the
//! outstanding receivables, persisted as an append-only time series.

pub mod calculator;
pub mod handlers;

pub use calculator::{
    build_snapshot, round_days, total_outstanding, weighted_dso, working_capital_impact,
    DsoCalculator, DsoMetricResponse, TARGET_DSO,
};
pub use handlers::{current_handler, history_handler, recalculate_handler};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountHealth, Invoice, InvoiceStatus, Source};
    use crate::store::Store;
    use crate::test_support::{memory_store, seed_customer, seed_invoice};
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn invoice(amount: i64, days_overdue: i32, status: InvoiceStatus) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            invoice_number: format!("INV-{}", Uuid::new_v4()),
            amount: Decimal::new(amount, 0),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            paid_date: None,
            status,
            days_overdue,
            source: Source::Crm,
            created_at: now,
            synced_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_empty_set_is_zero() {
        assert_eq!(weighted_dso(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_uniform_days_ignore_amount_distribution() {
        let invoices = vec![
            invoice(100, 17, InvoiceStatus::Overdue),
            invoice(25_000, 17, InvoiceStatus::Overdue),
            invoice(3, 17, InvoiceStatus::Overdue),
        ];
        assert_eq!(weighted_dso(&invoices), Decimal::from(17));
    }

    #[test]
    fn test_weighting_example() {
        let invoices = vec![
            invoice(15_000, 35, InvoiceStatus::Overdue),
            invoice(7_500, 48, InvoiceStatus::Overdue),
        ];
        let dso = weighted_dso(&invoices);
        assert_eq!(dso.round_dp(2), Decimal::new(3933, 2));
        assert_eq!(round_days(dso), 39);
    }

    #[test]
    fn test_paid_and_partial_invoices_are_excluded() {
        let invoices = vec![
            invoice(1_000, 10, InvoiceStatus::Overdue),
            invoice(9_000, 90, InvoiceStatus::Paid),
            invoice(9_000, 90, InvoiceStatus::Partial),
        ];
        assert_eq!(weighted_dso(&invoices), Decimal::from(10));
        assert_eq!(total_outstanding(&invoices), Decimal::new(1_000, 0));
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        assert_eq!(round_days(Decimal::new(395, 1)), 40);
        assert_eq!(round_days(Decimal::new(-25, 1)), -3);
        assert_eq!(round_days(Decimal::new(3949, 2)), 39);
    }

    #[test]
    fn test_working_capital_heuristic() {
        let impact = working_capital_impact(Decimal::from(3), Decimal::from(30_000));
        assert_eq!(impact, Decimal::from(3_000));
    }

    #[tokio::test]
    async fn test_recalculate_tracks_improvement() {
        let store = memory_store();
        let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
        let first = seed_invoice(&store, &customer, "INV-1", Decimal::new(10_000, 0), 40).await;
        seed_invoice(&store, &customer, "INV-2", Decimal::new(10_000, 0), 20).await;
        let calculator = DsoCalculator::new(store.clone());

        let before = calculator.recalculate().await.unwrap();
        assert_eq!(before.current_dso, Decimal::from(30));
        assert_eq!(before.improvement, Decimal::ZERO);

        store
            .set_invoice_status(first.id, InvoiceStatus::Paid, Some(Utc::now().date_naive()))
            .await
            .unwrap();
        let after = calculator.recalculate().await.unwrap();

        assert_eq!(after.current_dso, Decimal::from(20));
        assert_eq!(after.improvement, Decimal::from(10));
        assert_eq!(after.invoice_count, 1);

        let history = calculator.history(None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, after.id);
    }

    #[tokio::test]
    async fn test_current_falls_back_to_ad_hoc_without_persisting() {
        let store = memory_store();
        let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
        seed_invoice(&store, &customer, "INV-1", Decimal::new(500, 0), 12).await;
        let calculator = DsoCalculator::new(store.clone());

        let current = calculator.current().await.unwrap();

        assert_eq!(current.current_dso, Decimal::from(12));
        assert!(store.latest_dso_metric().await.unwrap().is_none());
    }

    #[test]
    fn test_response_carries_rounded_days_and_target() {
        let invoices = vec![
            invoice(15_000, 35, InvoiceStatus::Overdue),
            invoice(7_500, 48, InvoiceStatus::Overdue),
        ];
        let response: DsoMetricResponse = build_snapshot(&invoices, None, Utc::now()).into();
        assert_eq!(response.current_dso_days, 39);
        assert_eq!(response.improvement_days, 0);
        assert_eq!(response.target_dso, TARGET_DSO);
    }
}
