//! Lookup helpers behind the search bar, lot filters, suggestions and
//! directions.

use crate::entities::EntityStore;
use crate::error::{Result, SyncError};
use crate::subscriptions::SubscriptionRegistry;
use crate::types::{Lot, Position, Spot, SpotId, SpotKind, Timestamp};
use std::fmt;

/// Default number of suggested spots.
pub const DEFAULT_SUGGESTIONS: usize = 5;

/// A match for a free-text query.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchHit {
    Lot(Lot),
    Spot { spot: Spot, lot_name: String },
}

/// Case-insensitive substring search over lot names and spots.
///
/// Spots match on their id or on "`<lot name>` spot `<label>`". Lots come
/// first, then spots, each in store order. A blank query matches nothing.
pub fn search(store: &EntityStore, query: &str) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let lots = store.lots();
    let mut hits: Vec<SearchHit> = lots
        .iter()
        .filter(|lot| {
            lot.name.to_lowercase().contains(&needle)
                || lot.id.as_str().to_lowercase().contains(&needle)
        })
        .cloned()
        .map(SearchHit::Lot)
        .collect();

    for spot in store.spots() {
        let lot_name = lots
            .iter()
            .find(|l| l.id == spot.lot)
            .map(|l| l.name.clone())
            .unwrap_or_default();
        let qualified = format!("{} spot {}", lot_name, spot.label).to_lowercase();
        if qualified.contains(&needle) || spot.id.as_str().to_lowercase().contains(&needle) {
            hits.push(SearchHit::Spot { spot, lot_name });
        }
    }

    hits
}

/// Spot filter offered on the lot view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpotFilter {
    #[default]
    All,
    Available,
    Kind(SpotKind),
}

impl SpotFilter {
    pub fn matches(&self, spot: &Spot) -> bool {
        match self {
            SpotFilter::All => true,
            SpotFilter::Available => spot.status.is_available(),
            SpotFilter::Kind(kind) => spot.kind_or_default() == *kind,
        }
    }

    pub fn apply<'a>(&self, spots: &'a [Spot]) -> Vec<&'a Spot> {
        spots.iter().filter(|s| self.matches(s)).collect()
    }
}

/// Lots ordered by distance from `from`, nearest first, with the distance in
/// meters.
pub fn nearest_lots(store: &EntityStore, from: Position, limit: usize) -> Vec<(Lot, f64)> {
    let mut lots: Vec<(Lot, f64)> = store
        .lots()
        .into_iter()
        .map(|lot| {
            let d = from.distance_m(&lot.position);
            (lot, d)
        })
        .collect();
    lots.sort_by(|a, b| a.1.total_cmp(&b.1));
    lots.truncate(limit);
    lots
}

/// Occupied spots the user has not subscribed to yet.
pub fn suggested_spots(
    store: &EntityStore,
    registry: &SubscriptionRegistry,
    limit: usize,
) -> Vec<Spot> {
    store
        .spots()
        .into_iter()
        .filter(|s| !s.status.is_available() && !registry.contains(&s.id))
        .take(limit)
        .collect()
}

/// How the user travels to the destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelMode::Driving => f.write_str("driving"),
            TravelMode::Walking => f.write_str("walking"),
        }
    }
}

/// A directions query for the external mapping provider.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionsRequest {
    /// None lets the provider use the device location.
    pub origin: Option<Position>,
    pub destination: Position,
    pub mode: TravelMode,
}

impl DirectionsRequest {
    pub fn to_lot(lot: &Lot, origin: Option<Position>) -> Self {
        Self {
            origin,
            destination: lot.position,
            mode: TravelMode::Driving,
        }
    }

    pub fn to_spot(spot: &Spot, origin: Option<Position>) -> Self {
        Self {
            origin,
            destination: spot.position,
            mode: TravelMode::Driving,
        }
    }

    pub fn with_mode(mut self, mode: TravelMode) -> Self {
        self.mode = mode;
        self
    }

    /// Straight-line distance, when the origin is known.
    pub fn straight_line_m(&self) -> Option<f64> {
        self.origin.map(|o| o.distance_m(&self.destination))
    }

    /// Google Maps directions URL.
    pub fn to_provider_url(&self) -> String {
        let mut url = String::from("https://www.google.com/maps/dir/?api=1");
        if let Some(origin) = self.origin {
            url.push_str(&format!("&origin={:.6},{:.6}", origin.lat, origin.lng));
        }
        url.push_str(&format!(
            "&destination={:.6},{:.6}&travelmode={}",
            self.destination.lat, self.destination.lng, self.mode
        ));
        url
    }
}

/// What the spot detail panel shows.
#[derive(Clone, Debug, PartialEq)]
pub struct SpotDetails {
    pub spot: Spot,
    pub lot_name: String,
    pub subscribed: bool,
    /// Whole minutes since the status was last confirmed.
    pub minutes_since_update: i64,
    pub directions: DirectionsRequest,
}

/// Gather the detail view of one spot as of `now`.
pub fn spot_details(
    store: &EntityStore,
    registry: &SubscriptionRegistry,
    id: &SpotId,
    origin: Option<Position>,
    now: Timestamp,
) -> Result<SpotDetails> {
    let spot = store
        .spot(id)
        .ok_or_else(|| SyncError::SpotNotFound(id.clone()))?;
    let lot_name = store.lot(&spot.lot).map(|l| l.name).unwrap_or_default();

    Ok(SpotDetails {
        subscribed: registry.contains(id),
        minutes_since_update: spot.last_updated.minutes_until(now),
        directions: DirectionsRequest::to_spot(&spot, origin),
        lot_name,
        spot,
    })
}
