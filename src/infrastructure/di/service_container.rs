//! Service container for dependency injection
//!
//! Wires up all services with their dependencies. Every service instance is
//! explicit; nothing is held in globals.

use std::sync::Arc;

use crate::application::services::{
    shared_network, CommissionLedger, PartnerManager, PurchaseService, SharedNetwork,
};
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::domain::{CommissionCalculator, NetworkManager};
use crate::infrastructure::traits::{Clock, FileSystem, RealFileSystem, SystemClock};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    pub network: SharedNetwork,
    pub calculator: Arc<CommissionCalculator>,
    pub ledger: Arc<CommissionLedger>,
    pub partners: Arc<PartnerManager>,
    pub purchases: PurchaseService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> ApplicationResult<Self> {
        Self::with_deps(settings, Arc::new(RealFileSystem), Arc::new(SystemClock))
    }

    /// Create a service container with custom dependencies (for testing).
    ///
    /// Fails if the configured commission plan is invalid.
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
    ) -> ApplicationResult<Self> {
        let plan = settings.commission_plan()?;
        let settings = Arc::new(settings);

        let network = shared_network(NetworkManager::with_max_levels(settings.chain_levels()));
        let calculator = Arc::new(CommissionCalculator::new(plan.clone()));
        let ledger = Arc::new(CommissionLedger::new(plan));
        let partners = Arc::new(PartnerManager::new(network.clone(), clock.clone()));
        let purchases = PurchaseService::new(
            network.clone(),
            calculator.clone(),
            ledger.clone(),
            partners.clone(),
            clock.clone(),
        );

        Ok(Self {
            settings,
            fs,
            clock,
            network,
            calculator,
            ledger,
            partners,
            purchases,
        })
    }
}
