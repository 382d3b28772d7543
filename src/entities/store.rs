//! Authoritative in-memory collections of lots and spots.

use crate::entities::seed;
use crate::error::{Result, SyncError};
use crate::types::{
    Lot, LotId, Snapshot, SnapshotDigest, Spot, SpotId, SpotStatus, StatusChange, Timestamp,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};

/// How a reconcile treats a spot record older than the one already held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// Whatever completes last is applied, regardless of record timestamps.
    #[default]
    CompletionOrder,
    /// Incoming spot records with an older `last_updated` are skipped.
    NewestWins,
}

/// Store configuration.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    pub policy: ReconcilePolicy,
}

/// Outcome of merging one snapshot.
#[derive(Clone, Debug, Default)]
pub struct ReconcileReport {
    /// Store version after the reconcile.
    pub version: u64,
    /// Spots whose status changed.
    pub changes: Vec<StatusChange>,
    /// Existing spots replaced by the snapshot.
    pub merged: usize,
    /// New spots added by the snapshot.
    pub inserted: usize,
    /// Snapshot spots dropped because their lot is unknown.
    pub ignored: usize,
    /// Snapshot spots skipped as older than the held record.
    pub stale: usize,
    /// The snapshot matched the previously applied one.
    pub unchanged: bool,
}

/// A lot whose stored available count disagrees with its spots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountMismatch {
    pub lot: LotId,
    pub stored: u32,
    pub actual: u32,
}

#[derive(Default)]
struct StoreState {
    spots: HashMap<SpotId, Spot>,
    /// Spot ids in insertion order.
    order: Vec<SpotId>,
    lots: Vec<Lot>,
    lot_index: HashMap<LotId, usize>,
    /// Lot -> member spots.
    members: HashMap<LotId, Vec<SpotId>>,
    version: u64,
    last_digest: Option<SnapshotDigest>,
}

impl StoreState {
    fn count_available(&self, lot: &LotId) -> u32 {
        self.members
            .get(lot)
            .map(|ids| {
                ids.iter()
                    .filter(|id| {
                        self.spots
                            .get(*id)
                            .map(|s| s.status.is_available())
                            .unwrap_or(false)
                    })
                    .count() as u32
            })
            .unwrap_or(0)
    }

    fn recompute_lot(&mut self, lot: &LotId, now: Timestamp) {
        let available = self.count_available(lot);
        if let Some(&idx) = self.lot_index.get(lot) {
            let entry = &mut self.lots[idx];
            entry.available_spots = available;
            entry.last_updated = now;
        }
    }

    fn recompute_all(&mut self, now: Timestamp) {
        let ids: Vec<LotId> = self.lots.iter().map(|l| l.id.clone()).collect();
        for id in ids {
            self.recompute_lot(&id, now);
        }
    }

    fn insert_lot(&mut self, lot: Lot) {
        self.lot_index.insert(lot.id.clone(), self.lots.len());
        self.members.entry(lot.id.clone()).or_default();
        self.lots.push(lot);
    }

    fn insert_spot(&mut self, spot: Spot) {
        self.members
            .entry(spot.lot.clone())
            .or_default()
            .push(spot.id.clone());
        self.order.push(spot.id.clone());
        self.spots.insert(spot.id.clone(), spot);
    }

    fn move_spot(&mut self, id: &SpotId, from: &LotId, to: &LotId) {
        if let Some(ids) = self.members.get_mut(from) {
            ids.retain(|s| s != id);
        }
        self.members.entry(to.clone()).or_default().push(id.clone());
    }
}

/// The live entity store.
///
/// Every write runs under a single write-lock acquisition, so a reader never
/// observes a lot whose available count disagrees with its spots.
pub struct EntityStore {
    config: StoreConfig,
    state: RwLock<StoreState>,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Create a store from an initial set of lots and spots.
    pub fn with_entities(config: StoreConfig, lots: Vec<Lot>, spots: Vec<Spot>) -> Result<Self> {
        let mut state = StoreState::default();

        for lot in lots {
            if state.lot_index.contains_key(&lot.id) {
                return Err(SyncError::Validation(format!("duplicate lot id {}", lot.id)));
            }
            state.insert_lot(lot);
        }

        for spot in spots {
            if !state.lot_index.contains_key(&spot.lot) {
                return Err(SyncError::LotNotFound(spot.lot));
            }
            if state.spots.contains_key(&spot.id) {
                return Err(SyncError::Validation(format!("duplicate spot id {}", spot.id)));
            }
            state.insert_spot(spot);
        }

        state.recompute_all(Timestamp::now());

        Ok(Self {
            config,
            state: RwLock::new(state),
        })
    }

    /// Create a store holding the built-in seed set.
    pub fn seeded(config: StoreConfig, rng_seed: u64) -> Result<Self> {
        let (lots, spots) = seed::generate(rng_seed);
        Self::with_entities(config, lots, spots)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Writes ---

    /// Merge a freshly fetched snapshot into the store.
    ///
    /// Lots are matched by id (metadata replaced, unknown lots inserted) and
    /// spots by id (replaced or inserted). Spots absent from the snapshot are
    /// kept. Every lot's available count is recomputed before the lock is
    /// released.
    pub fn reconcile(&self, snapshot: &Snapshot) -> Result<ReconcileReport> {
        let digest = snapshot.digest()?;
        let now = Timestamp::now();
        let mut state = self.state.write();

        if state.last_digest == Some(digest) {
            debug!(version = state.version, "Snapshot unchanged, skipping merge");
            return Ok(ReconcileReport {
                version: state.version,
                unchanged: true,
                ..Default::default()
            });
        }

        let mut report = ReconcileReport::default();

        for lot in &snapshot.lots {
            match state.lot_index.get(&lot.id).copied() {
                Some(idx) => {
                    let entry = &mut state.lots[idx];
                    entry.name = lot.name.clone();
                    entry.total_spots = lot.total_spots;
                    entry.position = lot.position;
                    if lot.boundary.is_some() {
                        entry.boundary = lot.boundary.clone();
                    }
                }
                None => state.insert_lot(lot.clone()),
            }
        }

        for incoming in &snapshot.spots {
            if !state.lot_index.contains_key(&incoming.lot) {
                warn!(spot = %incoming.id, lot = %incoming.lot, "Snapshot spot references unknown lot");
                report.ignored += 1;
                continue;
            }

            let current = state.spots.get(&incoming.id).map(|s| (s.lot.clone(), s.status, s.last_updated));
            match current {
                Some((lot, status, last_updated)) => {
                    if self.config.policy == ReconcilePolicy::NewestWins
                        && incoming.last_updated < last_updated
                    {
                        report.stale += 1;
                        continue;
                    }
                    if lot != incoming.lot {
                        state.move_spot(&incoming.id, &lot, &incoming.lot);
                    }
                    if status != incoming.status {
                        report.changes.push(StatusChange {
                            spot: incoming.id.clone(),
                            lot: incoming.lot.clone(),
                            from: status,
                            to: incoming.status,
                            at: now,
                        });
                    }
                    state.spots.insert(incoming.id.clone(), incoming.clone());
                    report.merged += 1;
                }
                None => {
                    state.insert_spot(incoming.clone());
                    report.inserted += 1;
                }
            }
        }

        state.recompute_all(now);
        state.version += 1;
        state.last_digest = Some(digest);
        report.version = state.version;

        debug!(
            version = report.version,
            merged = report.merged,
            inserted = report.inserted,
            ignored = report.ignored,
            stale = report.stale,
            changed = report.changes.len(),
            "Reconciled snapshot"
        );

        Ok(report)
    }

    /// Set one spot's status and recompute its lot's available count.
    ///
    /// Returns the transition, or `None` when the spot already had that
    /// status (the timestamp is still refreshed).
    pub fn apply_correction(&self, id: &SpotId, status: SpotStatus) -> Result<Option<StatusChange>> {
        let now = Timestamp::now();
        let mut state = self.state.write();

        let spot = state
            .spots
            .get_mut(id)
            .ok_or_else(|| SyncError::SpotNotFound(id.clone()))?;

        let previous = spot.status;
        spot.status = status;
        spot.last_updated = now;
        let lot = spot.lot.clone();

        state.recompute_lot(&lot, now);
        state.version += 1;
        // The store no longer mirrors the last upstream payload.
        state.last_digest = None;

        debug!(spot = %id, %lot, from = %previous, to = %status, "Applied correction");

        Ok((previous != status).then(|| StatusChange {
            spot: id.clone(),
            lot,
            from: previous,
            to: status,
            at: now,
        }))
    }

    // --- Reads ---

    pub fn spot(&self, id: &SpotId) -> Option<Spot> {
        self.state.read().spots.get(id).cloned()
    }

    pub fn lot(&self, id: &LotId) -> Option<Lot> {
        let state = self.state.read();
        state.lot_index.get(id).map(|&idx| state.lots[idx].clone())
    }

    pub fn contains_spot(&self, id: &SpotId) -> bool {
        self.state.read().spots.contains_key(id)
    }

    /// All lots, in insertion order.
    pub fn lots(&self) -> Vec<Lot> {
        self.state.read().lots.clone()
    }

    /// All spots, in insertion order.
    pub fn spots(&self) -> Vec<Spot> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.spots.get(id).cloned())
            .collect()
    }

    /// Spots belonging to one lot.
    pub fn spots_in_lot(&self, lot: &LotId) -> Result<Vec<Spot>> {
        let state = self.state.read();
        let ids = state
            .members
            .get(lot)
            .filter(|_| state.lot_index.contains_key(lot))
            .ok_or_else(|| SyncError::LotNotFound(lot.clone()))?;
        Ok(ids.iter().filter_map(|id| state.spots.get(id).cloned()).collect())
    }

    /// Consistent copy of the whole store.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            lots: state.lots.clone(),
            spots: state
                .order
                .iter()
                .filter_map(|id| state.spots.get(id).cloned())
                .collect(),
            fetched_at: None,
        }
    }

    /// Number of writes applied so far.
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Digest of the last applied snapshot, if the store still mirrors it.
    pub fn last_digest(&self) -> Option<SnapshotDigest> {
        self.state.read().last_digest
    }

    pub fn spot_count(&self) -> usize {
        self.state.read().spots.len()
    }

    pub fn lot_count(&self) -> usize {
        self.state.read().lots.len()
    }

    /// Recount every lot from scratch and report disagreements.
    pub fn verify_counts(&self) -> Vec<CountMismatch> {
        let state = self.state.read();
        let mut actual: HashMap<&LotId, u32> = HashMap::new();
        for spot in state.spots.values() {
            if spot.status.is_available() {
                *actual.entry(&spot.lot).or_default() += 1;
            }
        }

        state
            .lots
            .iter()
            .filter_map(|lot| {
                let actual = actual.get(&lot.id).copied().unwrap_or(0);
                (actual != lot.available_spots).then(|| CountMismatch {
                    lot: lot.id.clone(),
                    stored: lot.available_spots,
                    actual,
                })
            })
            .collect()
    }
}
