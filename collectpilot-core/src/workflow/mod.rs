//! Approval workflow over recommendations.
//!
//! Decisions are the only trigger for status changes; each one is written as
//! an approval record through a conditional update so at most one decision
//! per recommendation is ever accepted.

pub mod approval;
pub mod handlers;
pub mod state_machine;
#[cfg(test)]
mod tests;

pub use approval::{ApprovalWorkflow, DecisionResult};
pub use handlers::{approvals_handler, decision_handler, execute_handler};
pub use state_machine::{RecommendationStateMachine, Transition, WorkflowEvent};
