//! Property tests: lot counts always agree with spot statuses.

use lotwatch::{
    EntityStore, LotId, ReconcilePolicy, Snapshot, SpotId, SpotStatus, StoreConfig,
    SubscriptionRegistry, Timestamp,
};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Correct { spot: usize, available: bool },
    Reconcile { flips: Vec<usize>, move_to: Option<(usize, usize)>, age_us: i64 },
}

const LOTS: [&str; 3] = ["lot-campus", "lot-library", "lot-student-center"];

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..350, any::<bool>()).prop_map(|(spot, available)| Op::Correct { spot, available }),
        (
            prop::collection::vec(0usize..350, 0..40),
            prop::option::of((0usize..350, 0usize..3)),
            -5_000_000i64..5_000_000,
        )
            .prop_map(|(flips, move_to, age_us)| Op::Reconcile { flips, move_to, age_us }),
    ]
}

fn policy() -> impl Strategy<Value = ReconcilePolicy> {
    prop_oneof![
        Just(ReconcilePolicy::CompletionOrder),
        Just(ReconcilePolicy::NewestWins),
    ]
}

fn perturbed(base: &Snapshot, flips: &[usize], move_to: Option<(usize, usize)>, age_us: i64) -> Snapshot {
    let mut snapshot = base.clone();
    let stamp = Timestamp(Timestamp::now().0 + age_us);
    for &i in flips {
        let spot = &mut snapshot.spots[i];
        spot.status = spot.status.flipped();
        spot.last_updated = stamp;
    }
    if let Some((i, lot)) = move_to {
        snapshot.spots[i].lot = LotId::from(LOTS[lot]);
        snapshot.spots[i].last_updated = stamp;
    }
    // Upstream counts are ignored, so make them wrong on purpose.
    for lot in snapshot.lots.iter_mut() {
        lot.available_spots = 9999;
    }
    snapshot
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn counts_match_spots_after_any_writes(
        policy in policy(),
        ops in prop::collection::vec(op(), 1..25),
    ) {
        let store = EntityStore::seeded(StoreConfig { policy }, 0).unwrap();
        let ids: Vec<SpotId> = store.spots().into_iter().map(|s| s.id).collect();

        for op in ops {
            match op {
                Op::Correct { spot, available } => {
                    let status = if available { SpotStatus::Available } else { SpotStatus::Occupied };
                    store.apply_correction(&ids[spot], status).unwrap();
                }
                Op::Reconcile { flips, move_to, age_us } => {
                    let snapshot = perturbed(&store.snapshot(), &flips, move_to, age_us);
                    store.reconcile(&snapshot).unwrap();
                }
            }
            prop_assert!(store.verify_counts().is_empty());
        }

        prop_assert_eq!(store.spot_count(), 350);
        let total: usize = store
            .lots()
            .iter()
            .map(|lot| store.spots_in_lot(&lot.id).unwrap().len())
            .sum();
        prop_assert_eq!(total, 350);
    }

    #[test]
    fn reconciling_same_snapshot_twice_is_a_noop(flips in prop::collection::vec(0usize..350, 0..40)) {
        let store = EntityStore::seeded(StoreConfig::default(), 0).unwrap();
        let snapshot = perturbed(&store.snapshot(), &flips, None, 0);

        store.reconcile(&snapshot).unwrap();
        let version = store.version();
        let lots = store.lots();

        let again = store.reconcile(&snapshot).unwrap();
        prop_assert!(again.unchanged);
        prop_assert_eq!(store.version(), version);
        prop_assert_eq!(store.lots(), lots);
    }

    #[test]
    fn registry_is_idempotent(ops in prop::collection::vec((0usize..20, any::<bool>()), 0..60)) {
        let registry = SubscriptionRegistry::new();
        let mut model = std::collections::BTreeSet::new();

        for (i, subscribe) in ops {
            let id = SpotId::new(format!("spot-{}", i));
            if subscribe {
                registry.subscribe(&id);
                model.insert(id);
            } else {
                registry.unsubscribe(&id);
                model.remove(&id);
            }
        }

        prop_assert_eq!(registry.list(), model.into_iter().collect::<Vec<_>>());
    }
}
