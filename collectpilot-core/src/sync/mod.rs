pub mod handlers;
pub mod synchronizer;
pub mod types;


pub use handlers::{status_handler, sync_handler};
pub use synchronizer::{derive_status, needs_refresh, Synchronizer};
pub use types::*;
