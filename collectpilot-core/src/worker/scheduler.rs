use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::dso::DsoCalculator;
use crate::models::DsoMetric;
use crate::sync::{SyncReport, Synchronizer};

/// Result of one scheduler cycle.
#[derive(Debug, Default)]
pub struct CycleSummary {
    pub reports: Vec<SyncReport>,

    /// Sources whose sync aborted this cycle
    pub failed_sources: usize,

    pub metric: Option<DsoMetric>,
}

/// Periodic sync job for the worker binary.
///
/// Every poll interval it runs a non-forced sync of each configured source,
/// then appends a DSO snapshot. Failures are logged and the loop continues.
pub struct SyncScheduler {
    synchronizer: Arc<Synchronizer>,

    dso: Arc<DsoCalculator>,

    poll_interval: Duration,

    /// Whether the scheduler is running (wrapped in Arc for sharing)
    running: Arc<RwLock<bool>>,
}

impl SyncScheduler {
    pub fn new(
        synchronizer: Arc<Synchronizer>,
        dso: Arc<DsoCalculator>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            synchronizer,
            dso,
            poll_interval,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Runs cycles until `stop` is called.
    pub async fn start(&self) -> Result<(), anyhow::Error> {
        *self.running.write().await = true;
        info!(
            "SyncScheduler started with poll interval: {} seconds",
            self.poll_interval.as_secs()
        );

        while *self.running.read().await {
            let summary = self.run_once().await;
            info!(
                "Sync cycle finished: {} source(s) synced, {} failed",
                summary.reports.len(),
                summary.failed_sources
            );

            sleep(self.poll_interval).await;
        }

        info!("SyncScheduler stopped");
        Ok(())
    }

    /// Stops the loop after the current cycle.
    pub async fn stop(&self) {
        info!("Stopping SyncScheduler...");
        *self.running.write().await = false;
    }

    /// One cycle: sync every configured source, then recalculate DSO.
    pub async fn run_once(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let sources = self.synchronizer.adapters().configured();
        if sources.is_empty() {
            warn!("No external systems configured, skipping sync");
        }

        for source in sources {
            match self.synchronizer.sync_source(source, false).await {
                Ok(report) => {
                    if !report.errors.is_empty() {
                        warn!(
                            "{} sync finished with {} record error(s)",
                            source,
                            report.errors.len()
                        );
                    }
                    summary.reports.push(report);
                }
                Err(e) => {
                    error!("Scheduled {} sync failed: {}", source, e);
                    summary.failed_sources += 1;
                }
            }
        }

        match self.dso.recalculate().await {
            Ok(metric) => summary.metric = Some(metric),
            Err(e) => error!("Scheduled DSO recalculation failed: {}", e),
        }

        summary
    }
}
