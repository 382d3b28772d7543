//! Application root: owns every component for one viewing session.

use crate::entities::{seed, EntityStore, StoreConfig};
use crate::error::{Result, SyncError};
use crate::gateway::{
    BackendConfig, MutationAction, MutationBackend, MutationGateway, SimulatedBackend,
    SubscriptionOutcome,
};
use crate::scheduler::{RefreshOutcome, RefreshScheduler, RefreshStatus, SchedulerConfig};
use crate::search::{self, DirectionsRequest, SearchHit, SpotDetails};
use crate::subscriptions::{AlertBroadcaster, AlertConfig, AlertHandle, SubscriptionRegistry};
use crate::types::{
    Lot, LotId, Position, Snapshot, Spot, SpotId, SpotStatus, StatusChange, Timestamp,
};
use crate::upstream::{SimulatedUpstream, SimulationConfig, UpstreamSource};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Session configuration.
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    pub store: StoreConfig,
    pub scheduler: SchedulerConfig,
    /// Seed for the initial lots and spots.
    pub seed: u64,
}

#[derive(Default)]
struct Selection {
    lot: Option<LotId>,
    spot: Option<SpotId>,
    query: String,
}

/// One user's live view of the parking data.
///
/// Created with [`Session::start`], torn down with [`Session::shutdown`] or
/// by dropping it.
pub struct Session {
    store: Arc<EntityStore>,
    registry: Arc<SubscriptionRegistry>,
    alerts: Arc<AlertBroadcaster>,
    gateway: MutationGateway,
    scheduler: RefreshScheduler,
    selection: RwLock<Selection>,
}

impl Session {
    /// Seed the store and start refreshing from `source`.
    pub fn start(
        config: SessionConfig,
        source: Arc<dyn UpstreamSource>,
        backend: Arc<dyn MutationBackend>,
    ) -> Result<Self> {
        let store = Arc::new(EntityStore::seeded(config.store, config.seed)?);
        let registry = Arc::new(SubscriptionRegistry::new());
        let alerts = Arc::new(AlertBroadcaster::new(Arc::clone(&registry)));

        let gateway = MutationGateway::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Some(Arc::clone(&alerts)),
            backend,
        );
        let scheduler = RefreshScheduler::start(
            Arc::clone(&store),
            source,
            Some(Arc::clone(&alerts)),
            config.scheduler,
        )?;

        info!(
            lots = store.lot_count(),
            spots = store.spot_count(),
            "Session started"
        );

        Ok(Self {
            store,
            registry,
            alerts,
            gateway,
            scheduler,
            selection: RwLock::new(Selection::default()),
        })
    }

    /// Session backed by the randomized local upstream and backend.
    ///
    /// `config.seed` lays out the simulated world so it matches the store;
    /// `simulation.seed` drives the per-fetch flips.
    pub fn simulated(
        config: SessionConfig,
        simulation: SimulationConfig,
        backend: BackendConfig,
    ) -> Result<Self> {
        let (lots, spots) = seed::generate(config.seed);
        let world = Snapshot {
            lots,
            spots,
            fetched_at: None,
        };
        let world = Arc::new(SimulatedUpstream::new(world, simulation));
        let backend = SimulatedBackend::new(backend).with_world(Arc::clone(&world));
        Self::start(config, world, Arc::new(backend))
    }

    /// Stop periodic refreshes.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }

    // --- Components ---

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    // --- User actions ---

    pub fn listen(&self, config: AlertConfig) -> AlertHandle {
        self.alerts.listen(config)
    }

    pub fn refresh_now(&self) -> Result<RefreshOutcome> {
        self.scheduler.refresh_now()
    }

    pub fn refresh_status(&self) -> RefreshStatus {
        self.scheduler.status()
    }

    pub fn report_correction(&self, spot: &SpotId, observed: SpotStatus) -> Result<Option<StatusChange>> {
        self.gateway.report_correction(spot, observed)
    }

    pub fn toggle_subscription(&self, spot: &SpotId) -> Result<SubscriptionOutcome> {
        let desired = !self.registry.contains(spot);
        self.gateway.set_subscription(spot, desired)
    }

    pub fn is_pending(&self, action: &MutationAction) -> bool {
        self.gateway.is_pending(action)
    }

    // --- Selection ---

    /// Select a lot, or clear the selection with `None`.
    pub fn select_lot(&self, id: Option<&LotId>) -> Result<Option<Lot>> {
        let lot = match id {
            Some(id) => Some(
                self.store
                    .lot(id)
                    .ok_or_else(|| SyncError::LotNotFound(id.clone()))?,
            ),
            None => None,
        };
        self.selection.write().lot = lot.as_ref().map(|l| l.id.clone());
        Ok(lot)
    }

    /// Select a spot, or clear the selection with `None`.
    pub fn select_spot(&self, id: Option<&SpotId>) -> Result<Option<Spot>> {
        let spot = match id {
            Some(id) => Some(
                self.store
                    .spot(id)
                    .ok_or_else(|| SyncError::SpotNotFound(id.clone()))?,
            ),
            None => None,
        };
        self.selection.write().spot = spot.as_ref().map(|s| s.id.clone());
        Ok(spot)
    }

    /// Current state of the selected lot.
    pub fn selected_lot(&self) -> Option<Lot> {
        let id = self.selection.read().lot.clone()?;
        self.store.lot(&id)
    }

    /// Current state of the selected spot.
    pub fn selected_spot(&self) -> Option<Spot> {
        let id = self.selection.read().spot.clone()?;
        self.store.spot(&id)
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        self.selection.write().query = query.into();
    }

    pub fn search_query(&self) -> String {
        self.selection.read().query.clone()
    }

    pub fn search_results(&self) -> Vec<SearchHit> {
        let query = self.search_query();
        search::search(&self.store, &query)
    }

    pub fn suggested_spots(&self, limit: usize) -> Vec<Spot> {
        search::suggested_spots(&self.store, &self.registry, limit)
    }

    pub fn spot_details(&self, id: &SpotId, origin: Option<Position>) -> Result<SpotDetails> {
        search::spot_details(&self.store, &self.registry, id, origin, Timestamp::now())
    }

    /// Directions to the selected spot, else the selected lot.
    pub fn directions_to_selection(&self, origin: Option<Position>) -> Option<DirectionsRequest> {
        if let Some(spot) = self.selected_spot() {
            return Some(DirectionsRequest::to_spot(&spot, origin));
        }
        self.selected_lot()
            .map(|lot| DirectionsRequest::to_lot(&lot, origin))
    }
}
