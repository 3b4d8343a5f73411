use std::sync::Arc;

use tracing::info;

use crate::accounts::AccountService;
use crate::adapters::Adapters;
use crate::config::Config;
use crate::dso::DsoCalculator;
use crate::error::Result;
use crate::outcomes::OutcomeTracker;
use crate::recommendations::{HttpScorer, RecommendationGenerator, RecommendationScorer, RulesScorer};
use crate::store::Store;
use crate::sync::Synchronizer;
use crate::workflow::ApprovalWorkflow;

/// Application state shared by every route handler.
///
/// Each component is built once from the `Config` and held behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub synchronizer: Arc<Synchronizer>,
    pub accounts: Arc<AccountService>,
    pub dso: Arc<DsoCalculator>,
    pub recommendations: Arc<RecommendationGenerator>,
    pub workflow: Arc<ApprovalWorkflow>,
    pub outcomes: Arc<OutcomeTracker>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        adapters: Adapters,
        scorer: Arc<dyn RecommendationScorer>,
        config: &Config,
    ) -> Self {
        Self {
            synchronizer: Arc::new(Synchronizer::new(store.clone(), adapters.clone(), config)),
            accounts: Arc::new(AccountService::new(store.clone())),
            dso: Arc::new(DsoCalculator::new(store.clone())),
            recommendations: Arc::new(RecommendationGenerator::new(
                store.clone(),
                scorer,
                config.external_timeout,
            )),
            workflow: Arc::new(ApprovalWorkflow::new(
                store.clone(),
                adapters,
                config.external_timeout,
            )),
            outcomes: Arc::new(OutcomeTracker::new(store.clone())),
            store,
        }
    }

    /// Builds the adapters and scorer the configuration enables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an HTTP client cannot be created.
    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Result<Self> {
        let adapters = Adapters::from_config(config)?;
        info!("External systems configured: {:?}", adapters.configured());

        let scorer: Arc<dyn RecommendationScorer> = match &config.scoring {
            Some(scoring) => {
                info!("Using hosted scorer at {}", scoring.api_url);
                Arc::new(HttpScorer::new(scoring, config.external_timeout)?)
            }
            None => {
                info!("SCORING_API_URL not set, using rules scorer");
                Arc::new(RulesScorer::new())
            }
        };

        Ok(Self::new(store, adapters, scorer, config))
    }
}
