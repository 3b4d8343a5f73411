use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::approval::DecisionRequest;
use crate::models::recommendation::NewRecommendation;
use crate::models::{
    AccountHealth, ApprovalAction, Recommendation, RecommendationStatus, RiskLevel, Source,
    Strategy,
};
use crate::store::Store;
use crate::test_support::{adapters_with, memory_store, seed_customer, seed_invoice, FakeAdapter};
use crate::workflow::approval::ApprovalWorkflow;

struct Fixture {
    store: Arc<dyn Store>,
    crm: Arc<FakeAdapter>,
    workflow: Arc<ApprovalWorkflow>,
    rec: Recommendation,
}

async fn fixture() -> Fixture {
    let store = memory_store();
    let crm = Arc::new(FakeAdapter::new(Source::Crm));
    let customer = seed_customer(&store, "A-1", AccountHealth::AtRisk).await;
    let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(4000, 0), 25).await;
    let rec = store
        .insert_recommendation(&NewRecommendation {
            customer_id: customer.id,
            invoice_id: invoice.id,
            strategy: Strategy::UrgentNotice,
            confidence: 80,
            risk_assessment: RiskLevel::Medium,
            draft_content: "Original draft".to_string(),
            reasoning: "25 days overdue".to_string(),
        })
        .await
        .unwrap();
    let workflow = Arc::new(ApprovalWorkflow::new(
        store.clone(),
        adapters_with(crm.clone(), None),
        Duration::from_secs(2),
    ));
    Fixture {
        store,
        crm,
        workflow,
        rec,
    }
}

fn request(action: &str, execute_now: bool) -> DecisionRequest {
    DecisionRequest {
        user_id: Uuid::new_v4(),
        action: action.to_string(),
        modified_content: None,
        execute_now,
    }
}

#[tokio::test]
async fn test_approve_without_execution() {
    let f = fixture().await;

    let result = f.workflow.decide(f.rec.id, &request("approved", false)).await.unwrap();

    assert_eq!(result.recommendation.status, RecommendationStatus::Approved);
    assert_eq!(result.approval.action, ApprovalAction::Approved);
    assert!(result.approval.executed_at.is_none());
    assert!(f.crm.activities().is_empty());
}

#[tokio::test]
async fn test_second_decision_conflicts() {
    let f = fixture().await;
    f.workflow.decide(f.rec.id, &request("approved", false)).await.unwrap();

    let second = f.workflow.decide(f.rec.id, &request("rejected", false)).await;

    assert!(matches!(second, Err(AppError::Conflict { .. })));
    assert_eq!(f.workflow.approvals(f.rec.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_decisions_accept_exactly_one() {
    let f = fixture().await;
    let a = {
        let workflow = f.workflow.clone();
        let id = f.rec.id;
        tokio::spawn(async move { workflow.decide(id, &request("approved", false)).await })
    };
    let b = {
        let workflow = f.workflow.clone();
        let id = f.rec.id;
        tokio::spawn(async move { workflow.decide(id, &request("rejected", false)).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::Conflict { .. }))));
}

#[tokio::test]
async fn test_unknown_action_is_invalid() {
    let f = fixture().await;

    let result = f.workflow.decide(f.rec.id, &request("escalate", false)).await;

    assert!(matches!(result, Err(AppError::InvalidAction { .. })));
    let rec = f.store.get_recommendation(f.rec.id).await.unwrap().unwrap();
    assert_eq!(rec.status, RecommendationStatus::Pending);
}

#[tokio::test]
async fn test_missing_recommendation_is_not_found() {
    let f = fixture().await;
    let result = f.workflow.decide(Uuid::new_v4(), &request("approved", false)).await;
    assert!(matches!(result, Err(AppError::NotFound { .. })));
}

#[tokio::test]
async fn test_execute_now_logs_activity_and_stamps_execution() {
    let f = fixture().await;

    let result = f.workflow.decide(f.rec.id, &request("approved", true)).await.unwrap();

    assert_eq!(result.recommendation.status, RecommendationStatus::Executed);
    let executed_at = result.approval.executed_at.unwrap();
    assert!(executed_at >= result.approval.approved_at);

    let activities = f.crm.activities();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].account_ref, "A-1");
    assert!(activities[0].subject.contains("INV-1"));
    assert_eq!(activities[0].note, "Original draft");
}

#[tokio::test]
async fn test_modified_content_is_what_gets_sent() {
    let f = fixture().await;
    let mut req = request("modified", true);
    req.modified_content = Some("Edited by collector".to_string());

    let result = f.workflow.decide(f.rec.id, &req).await.unwrap();

    assert_eq!(result.recommendation.status, RecommendationStatus::Executed);
    assert_eq!(f.crm.activities()[0].note, "Edited by collector");
}

#[tokio::test]
async fn test_modify_requires_content() {
    let f = fixture().await;
    let result = f.workflow.decide(f.rec.id, &request("modified", false)).await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_failed_execution_keeps_approval_and_can_be_retried() {
    let f = fixture().await;
    f.crm.set_fail_activity(true);

    let result = f.workflow.decide(f.rec.id, &request("approved", true)).await.unwrap();

    assert_eq!(result.recommendation.status, RecommendationStatus::Approved);
    assert!(result.recommendation.execution_error.is_some());
    assert!(result.approval.executed_at.is_none());

    f.crm.set_fail_activity(false);
    let retried = f.workflow.execute(f.rec.id).await.unwrap();

    assert_eq!(retried.recommendation.status, RecommendationStatus::Executed);
    assert!(retried.recommendation.execution_error.is_none());
    assert_eq!(retried.approval.id, result.approval.id);
    assert!(retried.approval.executed_at.is_some());
}

#[tokio::test]
async fn test_concurrent_executions_log_outreach_once() {
    let f = fixture().await;
    f.workflow.decide(f.rec.id, &request("approved", false)).await.unwrap();
    f.crm.set_activity_delay(Duration::from_millis(50));

    let (first, second) = tokio::join!(f.workflow.execute(f.rec.id), f.workflow.execute(f.rec.id));

    assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(AppError::Conflict { .. })));
    assert_eq!(f.crm.activities().len(), 1);

    let stored = f.store.get_recommendation(f.rec.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RecommendationStatus::Executed);
}

#[tokio::test]
async fn test_abandoned_execution_claim_can_be_taken_over() {
    let f = fixture().await;
    f.workflow.decide(f.rec.id, &request("approved", false)).await.unwrap();
    let long_ago = chrono::Utc::now() - chrono::Duration::hours(1);
    assert!(f
        .store
        .claim_execution(f.rec.id, long_ago, long_ago - chrono::Duration::seconds(4))
        .await
        .unwrap());

    let result = f.workflow.execute(f.rec.id).await.unwrap();

    assert_eq!(result.recommendation.status, RecommendationStatus::Executed);
    assert_eq!(f.crm.activities().len(), 1);
}

#[tokio::test]
async fn test_rejected_recommendation_cannot_execute() {
    let f = fixture().await;
    f.workflow.decide(f.rec.id, &request("rejected", true)).await.unwrap();

    let result = f.workflow.execute(f.rec.id).await;

    assert!(matches!(result, Err(AppError::Conflict { .. })));
    assert!(f.crm.activities().is_empty());
}
