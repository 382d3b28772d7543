//! Core types for the availability store.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Unique identifier for a parking spot.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpotId(pub String);

impl SpotId {
    pub fn new(id: impl Into<String>) -> Self {
        SpotId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SpotId {
    fn from(s: &str) -> Self {
        SpotId(s.to_string())
    }
}

impl fmt::Debug for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpotId({})", self.0)
    }
}

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a parking lot.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(pub String);

impl LotId {
    pub fn new(id: impl Into<String>) -> Self {
        LotId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LotId {
    fn from(s: &str) -> Self {
        LotId(s.to_string())
    }
}

impl fmt::Debug for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LotId({})", self.0)
    }
}

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }

    /// Whole minutes elapsed between `self` and `later` (saturating at zero).
    pub fn minutes_until(self, later: Timestamp) -> i64 {
        ((later.0 - self.0) / 60_000_000).max(0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Geographic position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lng: f64,
    pub lat: f64,
}

impl Position {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_m(&self, other: &Position) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// Occupancy of a single spot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotStatus {
    Available,
    Occupied,
}

impl SpotStatus {
    pub fn is_available(self) -> bool {
        self == SpotStatus::Available
    }

    /// The opposite status.
    pub fn flipped(self) -> Self {
        match self {
            SpotStatus::Available => SpotStatus::Occupied,
            SpotStatus::Occupied => SpotStatus::Available,
        }
    }
}

impl fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpotStatus::Available => write!(f, "available"),
            SpotStatus::Occupied => write!(f, "occupied"),
        }
    }
}

/// Designation of a spot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpotKind {
    #[default]
    Regular,
    Handicap,
    Electric,
    Compact,
}

impl fmt::Display for SpotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpotKind::Regular => "Regular",
            SpotKind::Handicap => "Handicapped",
            SpotKind::Electric => "Electric Vehicle",
            SpotKind::Compact => "Compact",
        };
        f.write_str(name)
    }
}

/// A single parking space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: SpotId,

    /// Owning lot.
    pub lot: LotId,

    /// Spot number as painted on the ground.
    pub label: String,

    pub status: SpotStatus,

    pub position: Position,

    pub last_updated: Timestamp,

    /// Parking time limit in minutes.
    #[serde(default)]
    pub time_limit: Option<u32>,

    #[serde(default)]
    pub kind: Option<SpotKind>,
}

impl Spot {
    /// Kind with the absent case treated as regular.
    pub fn kind_or_default(&self) -> SpotKind {
        self.kind.unwrap_or_default()
    }
}

/// A named collection of spots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,

    pub name: String,

    /// Capacity as advertised by the operator.
    pub total_spots: u32,

    /// Derived from the lot's spots. Values arriving from upstream are
    /// ignored and recomputed by the store.
    #[serde(default)]
    pub available_spots: u32,

    pub position: Position,

    /// Outline of the lot, if known.
    #[serde(default)]
    pub boundary: Option<Vec<Position>>,

    pub last_updated: Timestamp,
}

/// Full upstream payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub lots: Vec<Lot>,
    pub spots: Vec<Spot>,
    pub fetched_at: Option<Timestamp>,
}

impl Snapshot {
    /// Fingerprint of the snapshot content (lots and spots, not the fetch time).
    pub fn digest(&self) -> Result<SnapshotDigest> {
        #[derive(Serialize)]
        struct Content<'a> {
            lots: &'a [Lot],
            spots: &'a [Spot],
        }

        let bytes = serde_json::to_vec(&Content {
            lots: &self.lots,
            spots: &self.spots,
        })?;
        Ok(SnapshotDigest::from_bytes(&bytes))
    }

    /// Encode the snapshot for transport.
    pub fn encode(&self, encoding: PayloadEncoding) -> Result<Vec<u8>> {
        match encoding {
            PayloadEncoding::Json => Ok(serde_json::to_vec(self)?),
            PayloadEncoding::MessagePack => Ok(rmp_serde::to_vec_named(self)?),
        }
    }

    /// Decode a snapshot received from upstream.
    pub fn decode(bytes: &[u8], encoding: PayloadEncoding) -> Result<Self> {
        match encoding {
            PayloadEncoding::Json => serde_json::from_slice(bytes)
                .map_err(|e| crate::error::SyncError::Deserialization(e.to_string())),
            PayloadEncoding::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}

/// SHA-256 fingerprint of a snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotDigest(pub [u8; 32]);

impl SnapshotDigest {
    /// Compute digest from bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        SnapshotDigest(hasher.finalize().into())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotDigest({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Payload encoding of an upstream snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PayloadEncoding {
    #[default]
    Json,
    MessagePack,
}

/// A status transition observed while applying a write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub spot: SpotId,
    pub lot: LotId,
    pub from: SpotStatus,
    pub to: SpotStatus,
    pub at: Timestamp,
}
