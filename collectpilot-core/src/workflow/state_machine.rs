use std::fmt;

use crate::error::{AppError, Result};
use crate::models::{ApprovalAction, RecommendationStatus};

/// Event that may move a recommendation to another status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// A human decision recorded as an approval
    Decide(ApprovalAction),

    /// The collection action ran against the source system
    Execute,
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowEvent::Decide(action) => write!(f, "decide({})", action),
            WorkflowEvent::Execute => write!(f, "execute"),
        }
    }
}

/// Transition rules of the recommendation lifecycle.
pub trait Transition {
    /// Next status for `event`, or a conflict when `current` does not accept it.
    fn transition(current: RecommendationStatus, event: WorkflowEvent)
        -> Result<RecommendationStatus>;

    fn initial_state() -> RecommendationStatus {
        RecommendationStatus::Pending
    }
}

/// - Pending -> Approved | Rejected | Modified (decision)
/// - Approved | Modified -> Executed (execution)
/// - Rejected and Executed accept nothing
///
/// Nothing moves on its own; there is no expiry.
pub struct RecommendationStateMachine;

impl Transition for RecommendationStateMachine {
    fn transition(
        current: RecommendationStatus,
        event: WorkflowEvent,
    ) -> Result<RecommendationStatus> {
        match (current, event) {
            (RecommendationStatus::Pending, WorkflowEvent::Decide(action)) => Ok(action.into()),
            (status, WorkflowEvent::Execute) if status.is_executable() => {
                Ok(RecommendationStatus::Executed)
            }
            (status, event) => Err(AppError::conflict(format!(
                "Cannot {} a recommendation that is {}",
                event, status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_accepts_every_decision() {
        for action in [
            ApprovalAction::Approved,
            ApprovalAction::Rejected,
            ApprovalAction::Modified,
        ] {
            let next = RecommendationStateMachine::transition(
                RecommendationStateMachine::initial_state(),
                WorkflowEvent::Decide(action),
            )
            .unwrap();
            assert_eq!(next, RecommendationStatus::from(action));
        }
    }

    #[test]
    fn test_decided_recommendation_rejects_second_decision() {
        let result = RecommendationStateMachine::transition(
            RecommendationStatus::Approved,
            WorkflowEvent::Decide(ApprovalAction::Rejected),
        );
        assert!(matches!(result, Err(AppError::Conflict { .. })));
    }

    #[test]
    fn test_only_approved_or_modified_execute() {
        assert_eq!(
            RecommendationStateMachine::transition(
                RecommendationStatus::Modified,
                WorkflowEvent::Execute
            )
            .unwrap(),
            RecommendationStatus::Executed
        );
        for status in [
            RecommendationStatus::Pending,
            RecommendationStatus::Rejected,
            RecommendationStatus::Executed,
        ] {
            assert!(
                RecommendationStateMachine::transition(status, WorkflowEvent::Execute).is_err()
            );
        }
    }
}
