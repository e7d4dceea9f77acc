use crate::app_config::BusinessRules;
use std::sync::Arc;
use tessera_catalog::{CapacityLedger, InMemoryCatalog, InMemoryRules, PricingEngine};
use tessera_hold::HoldManager;
use tessera_session::{Reconciler, SessionManager};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<CapacityLedger>,
    pub catalog: Arc<InMemoryCatalog>,
    pub rules: Arc<InMemoryRules>,
    pub holds: Arc<HoldManager>,
    pub pricing: Arc<PricingEngine>,
    pub sessions: Arc<SessionManager>,
    pub business_rules: BusinessRules,
}

impl AppState {
    /// Wire the full core from a rule configuration. The catalog and rule
    /// set are in-memory here; production deployments would back the same
    /// seams with the external catalog and rule services.
    pub fn build(business_rules: BusinessRules) -> Self {
        let ledger = Arc::new(CapacityLedger::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let rules = Arc::new(InMemoryRules::standard(
            business_rules.booking_fee,
            business_rules.tax_rate,
        ));
        let holds = Arc::new(HoldManager::new(
            ledger.clone(),
            business_rules.hold_ttl_seconds,
        ));
        let pricing = Arc::new(PricingEngine::new(
            ledger.clone(),
            catalog.clone(),
            rules.clone(),
        ));
        let sessions = Arc::new(SessionManager::new(Reconciler::new(
            holds.clone(),
            pricing.clone(),
        )));

        Self {
            ledger,
            catalog,
            rules,
            holds,
            pricing,
            sessions,
            business_rules,
        }
    }
}
