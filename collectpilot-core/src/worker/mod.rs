pub mod scheduler;

pub use scheduler::{CycleSummary, SyncScheduler};
