//! Built-in seed set: the three campus lots and their generated spots.

use crate::types::{Lot, LotId, Position, Spot, SpotId, SpotKind, SpotStatus, Timestamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Max offset of a spot from its lot's center, in degrees.
const SPOT_JITTER_DEG: f64 = 0.001;

/// Static description of a seeded lot.
#[derive(Clone, Copy, Debug)]
pub struct SeedLot {
    pub id: &'static str,
    pub name: &'static str,
    pub total: u32,
    pub available: u32,
    pub lng: f64,
    pub lat: f64,
}

pub const SEED_LOTS: [SeedLot; 3] = [
    SeedLot {
        id: "lot-campus",
        name: "Campus Main Parking",
        total: 120,
        available: 45,
        lng: -83.606705,
        lat: 41.658693,
    },
    SeedLot {
        id: "lot-library",
        name: "Library Parking",
        total: 80,
        available: 12,
        lng: -83.607705,
        lat: 41.659693,
    },
    SeedLot {
        id: "lot-student-center",
        name: "Student Center",
        total: 150,
        available: 67,
        lng: -83.604705,
        lat: 41.657693,
    },
];

/// Designation for the `index`-th spot of a lot.
pub fn kind_for_index(index: u32) -> SpotKind {
    if index % 10 == 0 {
        SpotKind::Handicap
    } else if index % 15 == 0 {
        SpotKind::Electric
    } else if index % 20 == 0 {
        SpotKind::Compact
    } else {
        SpotKind::Regular
    }
}

/// Generate the seed lots and spots. The same `rng_seed` always yields the
/// same positions and time limits.
pub fn generate(rng_seed: u64) -> (Vec<Lot>, Vec<Spot>) {
    generate_from(&SEED_LOTS, rng_seed)
}

/// Generate lots and spots from an arbitrary seed table.
pub fn generate_from(table: &[SeedLot], rng_seed: u64) -> (Vec<Lot>, Vec<Spot>) {
    let mut rng = StdRng::seed_from_u64(rng_seed);
    let now = Timestamp::now();
    let mut lots = Vec::with_capacity(table.len());
    let mut spots = Vec::new();

    for seed in table {
        let lot_id = LotId::from(seed.id);
        let center = Position::new(seed.lng, seed.lat);

        lots.push(Lot {
            id: lot_id.clone(),
            name: seed.name.to_string(),
            total_spots: seed.total,
            available_spots: seed.available,
            position: center,
            boundary: None,
            last_updated: now,
        });

        for i in 0..seed.total {
            let status = if i < seed.available {
                SpotStatus::Available
            } else {
                SpotStatus::Occupied
            };
            let position = Position::new(
                center.lng + rng.random_range(-SPOT_JITTER_DEG..SPOT_JITTER_DEG),
                center.lat + rng.random_range(-SPOT_JITTER_DEG..SPOT_JITTER_DEG),
            );
            let time_limit = if rng.random_bool(0.5) { 120 } else { 60 };

            spots.push(Spot {
                id: SpotId::new(format!("{}-spot-{}", seed.id, i + 1)),
                lot: lot_id.clone(),
                label: (i + 1).to_string(),
                status,
                position,
                last_updated: now,
                time_limit: Some(time_limit),
                kind: Some(kind_for_index(i)),
            });
        }
    }

    (lots, spots)
}
