//! Randomized local stand-in for a live availability feed.

use super::{sanitize_probability, UpstreamSource};
use crate::entities::seed;
use crate::error::{Result, SyncError};
use crate::types::{Snapshot, SpotId, SpotStatus, Timestamp};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Simulation knobs.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Chance that a spot flips status on each fetch.
    pub flip_probability: f64,

    /// Artificial delay before each fetch returns.
    pub latency: Duration,

    /// Chance that a fetch fails outright.
    pub failure_probability: f64,

    /// RNG seed.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            flip_probability: 0.3,
            latency: Duration::ZERO,
            failure_probability: 0.0,
            seed: 0,
        }
    }
}

/// Holds its own copy of the world and perturbs it on every fetch.
pub struct SimulatedUpstream {
    config: SimulationConfig,
    world: Mutex<Snapshot>,
    rng: Mutex<StdRng>,
    fetches: AtomicU64,
}

impl SimulatedUpstream {
    /// Simulate on top of the given world.
    pub fn new(world: Snapshot, config: SimulationConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config: SimulationConfig {
                flip_probability: sanitize_probability(
                    "flip_probability",
                    config.flip_probability,
                ),
                failure_probability: sanitize_probability(
                    "failure_probability",
                    config.failure_probability,
                ),
                ..config
            },
            world: Mutex::new(world),
            rng: Mutex::new(rng),
            fetches: AtomicU64::new(0),
        }
    }

    /// Simulate on top of the built-in seed set.
    pub fn seeded(config: SimulationConfig) -> Self {
        let (lots, spots) = seed::generate(config.seed);
        let world = Snapshot {
            lots,
            spots,
            fetched_at: None,
        };
        Self::new(world, config)
    }

    /// Number of fetches attempted so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Record a status observed by a user, so later fetches report it.
    pub fn record_report(&self, id: &SpotId, status: SpotStatus) -> Result<()> {
        let mut world = self.world.lock();
        let spot = world
            .spots
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| SyncError::SpotNotFound(id.clone()))?;
        spot.status = status;
        spot.last_updated = Timestamp::now();
        Ok(())
    }
}

impl UpstreamSource for SimulatedUpstream {
    fn fetch_snapshot(&self) -> Result<Snapshot> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.config.latency.is_zero() {
            thread::sleep(self.config.latency);
        }

        let mut rng = self.rng.lock();
        if rng.random_bool(self.config.failure_probability) {
            return Err(SyncError::Upstream(format!("simulated failure on fetch {}", n)));
        }

        let now = Timestamp::now();
        let mut world = self.world.lock();
        let mut flipped = 0usize;
        for spot in world.spots.iter_mut() {
            if rng.random_bool(self.config.flip_probability) {
                spot.status = spot.status.flipped();
                flipped += 1;
            }
            spot.last_updated = now;
        }
        for lot in world.lots.iter_mut() {
            lot.last_updated = now;
        }

        debug!(fetch = n, flipped, "Simulated upstream fetch");

        let mut snapshot = world.clone();
        snapshot.fetched_at = Some(now);
        Ok(snapshot)
    }
}
