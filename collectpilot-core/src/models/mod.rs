pub mod approval;
pub mod customer;
pub mod dso_metric;
pub mod invoice;
pub mod outcome;
pub mod recommendation;

pub use approval::{Approval, ApprovalAction};
pub use customer::{AccountHealth, Customer, PaymentRecord, Source};
pub use dso_metric::DsoMetric;
pub use invoice::{Invoice, InvoiceStatus};
pub use outcome::{CollectionOutcome, CustomerResponse, OutcomeRecord};
pub use recommendation::{Recommendation, RecommendationStatus, RiskLevel, Strategy};

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: i64 = 50;

/// Upper bound on any list endpoint page size.
pub const MAX_LIMIT: i64 = 500;

/// Clamps an optional caller-supplied limit into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}
