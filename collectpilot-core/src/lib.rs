//! CollectPilot core: the collection acceleration engine.
//!
//! Pulls customers and invoices from CRM/ERP systems, tracks DSO, turns
//! overdue invoices into scored collection recommendations, routes them
//! through human approval and measures what they collected.

pub mod accounts;
pub mod adapters;
pub mod config;
pub mod db;
pub mod dso;
pub mod error;
pub mod models;
pub mod outcomes;
pub mod recommendations;
pub mod routes;
pub mod state;
pub mod store;
pub mod sync;
pub mod worker;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
