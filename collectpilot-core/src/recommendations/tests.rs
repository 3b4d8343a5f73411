use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::recommendation::RecommendationFilter;
use crate::models::{AccountHealth, InvoiceStatus, RecommendationStatus};
use crate::recommendations::generator::RecommendationGenerator;
use crate::recommendations::scoring::{
    RecommendationScorer, RulesScorer, ScoringInput, ScoringOutput,
};
use crate::store::Store;
use crate::test_support::{memory_store, seed_customer, seed_invoice, FakeScorer};

struct SlowScorer;

#[async_trait]
impl RecommendationScorer for SlowScorer {
    async fn analyze(&self, input: &ScoringInput) -> Result<ScoringOutput> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        RulesScorer.analyze(input).await
    }
}

fn generator(store: Arc<dyn Store>, scorer: Arc<dyn RecommendationScorer>) -> RecommendationGenerator {
    RecommendationGenerator::new(store, scorer, Duration::from_secs(2))
}

#[tokio::test]
async fn test_generate_persists_pending_recommendation() {
    let store = memory_store();
    let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
    let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(1200, 0), 20).await;
    let scorer = Arc::new(FakeScorer::new(85));
    let generator = generator(store.clone(), scorer.clone());

    let rec = generator.generate(customer.id, invoice.id).await.unwrap();

    assert_eq!(rec.status, RecommendationStatus::Pending);
    assert_eq!(rec.confidence, 85);
    assert!(rec.draft_content.contains("INV-1"));
    assert_eq!(scorer.calls(), 1);
    assert!(store.get_recommendation(rec.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_missing_customer_fails_before_scoring() {
    let store = memory_store();
    let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
    let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(1200, 0), 20).await;
    let scorer = Arc::new(FakeScorer::new(85));
    let generator = generator(store, scorer.clone());

    let missing_customer = generator.generate(Uuid::new_v4(), invoice.id).await;
    let missing_invoice = generator.generate(customer.id, Uuid::new_v4()).await;

    assert!(matches!(missing_customer, Err(AppError::NotFound { .. })));
    assert!(matches!(missing_invoice, Err(AppError::NotFound { .. })));
    assert_eq!(scorer.calls(), 0);
}

#[tokio::test]
async fn test_out_of_range_confidence_is_rejected() {
    let store = memory_store();
    let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
    let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(1200, 0), 20).await;
    let generator = generator(store.clone(), Arc::new(FakeScorer::new(150)));

    let result = generator.generate(customer.id, invoice.id).await;

    assert!(matches!(result, Err(AppError::ExternalService { .. })));
    let recs = store
        .list_recommendations(&RecommendationFilter::default())
        .await
        .unwrap();
    assert!(recs.is_empty());
}

#[tokio::test]
async fn test_second_active_recommendation_conflicts() {
    let store = memory_store();
    let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
    let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(1200, 0), 20).await;
    let generator = generator(store, Arc::new(FakeScorer::new(70)));

    generator.generate(customer.id, invoice.id).await.unwrap();
    let second = generator.generate(customer.id, invoice.id).await;

    assert!(matches!(second, Err(AppError::Conflict { .. })));
}

#[tokio::test]
async fn test_invoice_of_other_customer_is_rejected() {
    let store = memory_store();
    let owner = seed_customer(&store, "A-1", AccountHealth::Good).await;
    let other = seed_customer(&store, "A-2", AccountHealth::Good).await;
    let invoice = seed_invoice(&store, &owner, "INV-1", Decimal::new(1200, 0), 20).await;
    let generator = generator(store, Arc::new(FakeScorer::new(70)));

    let result = generator.generate(other.id, invoice.id).await;

    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_slow_scorer_times_out() {
    let store = memory_store();
    let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
    let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(1200, 0), 20).await;
    let generator = RecommendationGenerator::new(store, Arc::new(SlowScorer), Duration::from_millis(20));

    let result = generator.generate(customer.id, invoice.id).await;

    assert!(matches!(result, Err(AppError::Timeout { .. })));
}

#[tokio::test]
async fn test_concurrent_generation_keeps_one_active_recommendation() {
    let store = memory_store();
    let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
    let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(1200, 0), 20).await;
    let generator = generator(store.clone(), Arc::new(SlowScorer));

    // Both calls pass the early duplicate check while the scorer is running.
    let (first, second) = tokio::join!(
        generator.generate(customer.id, invoice.id),
        generator.generate(customer.id, invoice.id)
    );

    assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(AppError::Conflict { .. })));
    let recs = store
        .list_recommendations(&RecommendationFilter::default())
        .await
        .unwrap();
    assert_eq!(recs.len(), 1);
}

#[tokio::test]
async fn test_rules_scorer_end_to_end() {
    let store = memory_store();
    let customer = seed_customer(&store, "A-1", AccountHealth::Churning).await;
    let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(9000, 0), 50).await;
    let generator = generator(store, Arc::new(RulesScorer::new()));

    let rec = generator.generate(customer.id, invoice.id).await.unwrap();

    assert!((0..=100).contains(&rec.confidence));
    assert_eq!(rec.strategy.as_str(), "personal_outreach");
    assert!(rec.reasoning.contains("50 days overdue"));
}

#[tokio::test]
async fn test_batch_generation_skips_active_and_current_invoices() {
    let store = memory_store();
    let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
    let covered = seed_invoice(&store, &customer, "INV-1", Decimal::new(1000, 0), 30).await;
    seed_invoice(&store, &customer, "INV-2", Decimal::new(2000, 0), 10).await;
    seed_invoice(&store, &customer, "INV-3", Decimal::new(3000, 0), 0).await;
    let generator = generator(store.clone(), Arc::new(FakeScorer::new(75)));
    generator.generate(customer.id, covered.id).await.unwrap();

    let report = generator.generate_for_overdue(None).await.unwrap();

    assert_eq!(report.generated.len(), 1);
    assert_eq!(report.skipped, 1);
    assert!(report.errors.is_empty());
    let invoice = store
        .get_invoice(report.generated[0].invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoice.invoice_number, "INV-2");
    assert_eq!(invoice.status, InvoiceStatus::Overdue);
}

#[tokio::test]
async fn test_draft_edits_only_while_pending() {
    let store = memory_store();
    let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
    let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(1000, 0), 30).await;
    let generator = generator(store.clone(), Arc::new(FakeScorer::new(75)));
    let rec = generator.generate(customer.id, invoice.id).await.unwrap();

    let edited = generator.update_draft(rec.id, "Revised text").await.unwrap();
    assert_eq!(edited.draft_content, "Revised text");

    store
        .record_decision(&crate::models::approval::NewApproval {
            recommendation_id: rec.id,
            user_id: Uuid::new_v4(),
            action: crate::models::ApprovalAction::Rejected,
            modified_content: None,
            approved_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let result = generator.update_draft(rec.id, "Too late").await;
    assert!(matches!(result, Err(AppError::Conflict { .. })));
}
