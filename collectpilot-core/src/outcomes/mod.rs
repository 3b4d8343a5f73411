pub mod analytics;
pub mod handlers;
pub mod tracker;

pub use analytics::{ConfidenceBand, OutcomeAnalytics, OutcomeMetrics};
pub use handlers::{analytics_handler, list_handler, record_handler, update_handler};
pub use tracker::{window_days, OutcomeTracker, DEFAULT_WINDOW_DAYS};
