//! User-initiated writes: status corrections and subscription changes.

use crate::entities::EntityStore;
use crate::error::{Result, SyncError};
use crate::subscriptions::{
    AlertBroadcaster, SubscribeOutcome, SubscriptionRegistry, UnsubscribeOutcome,
};
use crate::types::{SpotId, SpotStatus, StatusChange};
use crate::upstream::{sanitize_probability, SimulatedUpstream};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Remote endpoint that accepts user writes.
pub trait MutationBackend: Send + Sync {
    /// Report the status a user actually observed at a spot.
    fn submit_correction(&self, spot: &SpotId, observed: SpotStatus) -> Result<()>;

    /// Register or remove an availability subscription.
    fn submit_subscription(&self, spot: &SpotId, subscribe: bool) -> Result<()>;
}

/// Simulated backend knobs.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Artificial delay per request.
    pub latency: Duration,

    /// Chance that a request is rejected.
    pub failure_probability: f64,

    /// RNG seed.
    pub seed: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            failure_probability: 0.0,
            seed: 0,
        }
    }
}

/// Local stand-in for the write endpoint.
///
/// When attached to a [`SimulatedUpstream`], accepted corrections are written
/// into the simulated world so later refreshes report them.
pub struct SimulatedBackend {
    config: BackendConfig,
    rng: Mutex<StdRng>,
    world: Option<Arc<SimulatedUpstream>>,
}

impl SimulatedBackend {
    pub fn new(config: BackendConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config: BackendConfig {
                failure_probability: sanitize_probability(
                    "failure_probability",
                    config.failure_probability,
                ),
                ..config
            },
            rng: Mutex::new(rng),
            world: None,
        }
    }

    /// Forward accepted corrections to a simulated upstream.
    pub fn with_world(mut self, world: Arc<SimulatedUpstream>) -> Self {
        self.world = Some(world);
        self
    }

    fn roundtrip(&self, what: &str) -> Result<()> {
        if !self.config.latency.is_zero() {
            thread::sleep(self.config.latency);
        }
        if self.rng.lock().random_bool(self.config.failure_probability) {
            return Err(SyncError::Upstream(format!("simulated {} rejection", what)));
        }
        Ok(())
    }
}

impl MutationBackend for SimulatedBackend {
    fn submit_correction(&self, spot: &SpotId, observed: SpotStatus) -> Result<()> {
        self.roundtrip("correction")?;
        if let Some(world) = &self.world {
            world.record_report(spot, observed)?;
        }
        Ok(())
    }

    fn submit_subscription(&self, _spot: &SpotId, subscribe: bool) -> Result<()> {
        self.roundtrip(if subscribe { "subscribe" } else { "unsubscribe" })
    }
}

/// A write the UI can trigger. At most one of each may be in flight.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MutationAction {
    Correction(SpotId),
    Subscription(SpotId),
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationAction::Correction(id) => write!(f, "correction for {}", id),
            MutationAction::Subscription(id) => write!(f, "subscription for {}", id),
        }
    }
}

/// Result of a subscription toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    Subscribed,
    AlreadySubscribed,
    Unsubscribed,
    NotSubscribed,
}

/// Releases an in-flight slot on drop.
struct PendingSlot<'a> {
    pending: &'a Mutex<HashSet<MutationAction>>,
    action: MutationAction,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.action);
    }
}

/// Applies user writes to the store and registry.
///
/// The backend is called before anything local changes, so a rejected write
/// leaves the store and registry untouched.
pub struct MutationGateway {
    store: Arc<EntityStore>,
    registry: Arc<SubscriptionRegistry>,
    alerts: Option<Arc<AlertBroadcaster>>,
    backend: Arc<dyn MutationBackend>,
    pending: Mutex<HashSet<MutationAction>>,
}

impl MutationGateway {
    pub fn new(
        store: Arc<EntityStore>,
        registry: Arc<SubscriptionRegistry>,
        alerts: Option<Arc<AlertBroadcaster>>,
        backend: Arc<dyn MutationBackend>,
    ) -> Self {
        Self {
            store,
            registry,
            alerts,
            backend,
            pending: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, action: MutationAction) -> Result<PendingSlot<'_>> {
        let mut pending = self.pending.lock();
        if !pending.insert(action.clone()) {
            return Err(SyncError::InFlight(action.to_string()));
        }
        Ok(PendingSlot {
            pending: &self.pending,
            action,
        })
    }

    /// Whether the UI control for `action` should be disabled.
    pub fn is_pending(&self, action: &MutationAction) -> bool {
        self.pending.lock().contains(action)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Report that a spot's real status differs from what is shown.
    ///
    /// Returns the applied transition, or `None` if the store already showed
    /// `observed`.
    pub fn report_correction(
        &self,
        spot: &SpotId,
        observed: SpotStatus,
    ) -> Result<Option<StatusChange>> {
        if !self.store.contains_spot(spot) {
            return Err(SyncError::SpotNotFound(spot.clone()));
        }
        let _slot = self.claim(MutationAction::Correction(spot.clone()))?;

        if let Err(e) = self.backend.submit_correction(spot, observed) {
            warn!(spot = %spot, error = %e, "Correction rejected");
            return Err(e);
        }

        let change = self.store.apply_correction(spot, observed)?;
        if let (Some(change), Some(alerts)) = (&change, &self.alerts) {
            alerts.publish_changes(std::slice::from_ref(change));
        }
        info!(spot = %spot, status = %observed, "Correction applied");
        Ok(change)
    }

    /// Subscribe to or unsubscribe from a spot.
    pub fn set_subscription(&self, spot: &SpotId, desired: bool) -> Result<SubscriptionOutcome> {
        if desired {
            if !self.store.contains_spot(spot) {
                return Err(SyncError::SpotNotFound(spot.clone()));
            }
            if self.registry.contains(spot) {
                debug!(spot = %spot, "Already subscribed");
                return Ok(SubscriptionOutcome::AlreadySubscribed);
            }
        } else if !self.registry.contains(spot) {
            return Ok(SubscriptionOutcome::NotSubscribed);
        }

        let _slot = self.claim(MutationAction::Subscription(spot.clone()))?;

        if let Err(e) = self.backend.submit_subscription(spot, desired) {
            warn!(spot = %spot, desired, error = %e, "Subscription change rejected");
            return Err(e);
        }

        let outcome = if desired {
            match self.registry.subscribe(spot) {
                SubscribeOutcome::Subscribed => SubscriptionOutcome::Subscribed,
                SubscribeOutcome::AlreadySubscribed => SubscriptionOutcome::AlreadySubscribed,
            }
        } else {
            match self.registry.unsubscribe(spot) {
                UnsubscribeOutcome::Unsubscribed => SubscriptionOutcome::Unsubscribed,
                UnsubscribeOutcome::NotSubscribed => SubscriptionOutcome::NotSubscribed,
            }
        };
        Ok(outcome)
    }

    /// Unsubscribe from every spot, each as an independent request.
    pub fn clear_subscriptions(&self) -> Vec<(SpotId, Result<SubscriptionOutcome>)> {
        self.registry
            .list()
            .into_iter()
            .map(|id| {
                let result = self.set_subscription(&id, false);
                (id, result)
            })
            .collect()
    }
}
