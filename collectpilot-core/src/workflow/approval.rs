use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{with_timeout, Adapters};
use crate::error::{AppError, Result};
use crate::models::approval::{DecisionRequest, NewApproval};
use crate::models::{Approval, ApprovalAction, Recommendation};
use crate::store::Store;
use crate::workflow::state_machine::{RecommendationStateMachine, Transition, WorkflowEvent};

/// Recommendation and approval as they stand after a decision or execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResult {
    pub recommendation: Recommendation,
    pub approval: Approval,
}

/// Records human decisions and runs the approved collection actions.
pub struct ApprovalWorkflow {
    store: Arc<dyn Store>,
    adapters: Adapters,
    timeout: Duration,
}

impl ApprovalWorkflow {
    pub fn new(store: Arc<dyn Store>, adapters: Adapters, timeout: Duration) -> Self {
        Self {
            store,
            adapters,
            timeout,
        }
    }

    /// Records a decision on a pending recommendation.
    ///
    /// With `execute_now` on an approval or modification the collection action
    /// runs immediately. An execution failure is stored on the recommendation
    /// and the decision still stands.
    ///
    /// # Errors
    ///
    /// - `InvalidAction` for an action outside approved/rejected/modified
    /// - `NotFound` when the recommendation does not exist
    /// - `Conflict` when it is no longer pending, including losing a race
    ///   against a concurrent decision
    #[instrument(skip(self, request), fields(action = %request.action))]
    pub async fn decide(
        &self,
        recommendation_id: Uuid,
        request: &DecisionRequest,
    ) -> Result<DecisionResult> {
        let action: ApprovalAction = request.action.parse()?;
        let rec = self.get_recommendation(recommendation_id).await?;
        RecommendationStateMachine::transition(rec.status, WorkflowEvent::Decide(action))?;

        let modified_content = match action {
            ApprovalAction::Modified => match request.modified_content.as_deref() {
                Some(content) if !content.trim().is_empty() => Some(content.to_string()),
                _ => {
                    return Err(AppError::validation(
                        "modified_content is required when modifying a recommendation",
                    ))
                }
            },
            _ => None,
        };

        let (recommendation, approval) = self
            .store
            .record_decision(&NewApproval {
                recommendation_id,
                user_id: request.user_id,
                action,
                modified_content,
                approved_at: Utc::now(),
            })
            .await?
            .ok_or_else(|| {
                AppError::conflict(format!(
                    "Recommendation {} was decided concurrently",
                    recommendation_id
                ))
            })?;

        info!(
            "Recommendation {} {} by user {}",
            recommendation.id, action, approval.user_id
        );

        if request.execute_now && recommendation.status.is_executable() {
            match self.run_execution(&recommendation, &approval).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(
                        "Recommendation {} approved but execution failed: {}",
                        recommendation.id, e
                    );
                    let recommendation = self.get_recommendation(recommendation.id).await?;
                    return Ok(DecisionResult {
                        recommendation,
                        approval,
                    });
                }
            }
        }

        Ok(DecisionResult {
            recommendation,
            approval,
        })
    }

    /// Runs (or retries) the collection action of an approved or modified
    /// recommendation.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the recommendation does not exist
    /// - `Conflict` when it is not executable or another execution holds it
    /// - the adapter's error when the outreach could not be logged
    pub async fn execute(&self, recommendation_id: Uuid) -> Result<DecisionResult> {
        let rec = self.get_recommendation(recommendation_id).await?;
        RecommendationStateMachine::transition(rec.status, WorkflowEvent::Execute)?;

        let approval = self
            .store
            .list_approvals(recommendation_id)
            .await?
            .into_iter()
            .rev()
            .find(|a| a.action != ApprovalAction::Rejected)
            .ok_or_else(|| {
                AppError::internal(format!(
                    "Recommendation {} is {} without an approval record",
                    rec.id, rec.status
                ))
            })?;

        self.run_execution(&rec, &approval).await
    }

    /// Decision audit trail, oldest first.
    pub async fn approvals(&self, recommendation_id: Uuid) -> Result<Vec<Approval>> {
        self.get_recommendation(recommendation_id).await?;
        self.store.list_approvals(recommendation_id).await
    }

    async fn get_recommendation(&self, id: Uuid) -> Result<Recommendation> {
        self.store
            .get_recommendation(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("recommendation {}", id)))
    }

    /// Logs the outreach on the customer's record in its source system, then
    /// moves the recommendation to executed.
    ///
    /// The recommendation is claimed first, so concurrent executions log the
    /// outreach once. A claim older than twice the external timeout is
    /// treated as abandoned.
    async fn run_execution(
        &self,
        rec: &Recommendation,
        approval: &Approval,
    ) -> Result<DecisionResult> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(self.timeout * 2)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        if !self.store.claim_execution(rec.id, now, now - lease).await? {
            return Err(AppError::conflict(format!(
                "Recommendation {} is already being executed",
                rec.id
            )));
        }

        let attempt = self.log_outreach(rec, approval).await;
        if let Err(e) = attempt {
            error!("Execution of recommendation {} failed: {}", rec.id, e);
            self.store
                .set_execution_error(rec.id, Some(&e.to_string()))
                .await?;
            return Err(e);
        }

        let (recommendation, approval) = self
            .store
            .mark_executed(rec.id, approval.id, Utc::now())
            .await?
            .ok_or_else(|| {
                AppError::conflict(format!("Recommendation {} is no longer executable", rec.id))
            })?;

        info!("Recommendation {} executed", recommendation.id);
        Ok(DecisionResult {
            recommendation,
            approval,
        })
    }

    async fn log_outreach(&self, rec: &Recommendation, approval: &Approval) -> Result<()> {
        let customer = self
            .store
            .get_customer(rec.customer_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("customer {}", rec.customer_id)))?;
        let invoice = self
            .store
            .get_invoice(rec.invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("invoice {}", rec.invoice_id)))?;
        let adapter = self.adapters.get(customer.source)?;

        let subject = format!(
            "Collection {} for invoice {}",
            rec.strategy, invoice.invoice_number
        );
        let note = approval
            .modified_content
            .as_deref()
            .unwrap_or(rec.draft_content.as_str());

        with_timeout(
            self.timeout,
            &format!("{} log_activity", customer.source),
            adapter.log_activity(&customer.external_id, &subject, note),
        )
        .await
    }
}
