use std::sync::Arc;

use collectpilot_core::db::{create_pool, run_migrations};
use collectpilot_core::store::{MemoryStore, PostgresStore, Store};
use collectpilot_core::worker::SyncScheduler;
use collectpilot_core::{AppState, Config};
use dotenv::dotenv;
use tokio::signal;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Worker binary entry point for the scheduled sync.
///
/// Periodically pulls every configured CRM/ERP source and appends a DSO
/// snapshot. The HTTP server never runs this loop itself.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting CollectPilot Sync Worker...");

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url, config.database_max_connections).await?;
            run_migrations(&pool).await?;
            Arc::new(PostgresStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, worker results will not be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::from_config(store, &config)?;
    let scheduler = Arc::new(SyncScheduler::new(
        state.synchronizer.clone(),
        state.dso.clone(),
        config.worker_poll_interval,
    ));

    let runner = scheduler.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = runner.start().await {
            tracing::error!("Scheduler error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            scheduler.stop().await;
        }
        _ = scheduler_handle => {
            info!("Scheduler task completed");
        }
    }

    info!("CollectPilot Sync Worker stopped");
    Ok(())
}
