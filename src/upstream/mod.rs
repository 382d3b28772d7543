//! Upstream data sources.
//!
//! The refresh scheduler only sees [`UpstreamSource`]; swapping the simulated
//! feed for a real service means providing another implementation.

mod encoded;
mod simulated;

pub use encoded::EncodedUpstream;
pub use simulated::{SimulatedUpstream, SimulationConfig};

use crate::error::Result;
use crate::types::Snapshot;
use std::sync::Arc;
use tracing::warn;

/// A source of full store snapshots.
pub trait UpstreamSource: Send + Sync {
    /// Fetch the current state of every lot and spot.
    fn fetch_snapshot(&self) -> Result<Snapshot>;
}

impl<T: UpstreamSource + ?Sized> UpstreamSource for Arc<T> {
    fn fetch_snapshot(&self) -> Result<Snapshot> {
        (**self).fetch_snapshot()
    }
}

/// Clamp a configured probability into `[0, 1]`. NaN counts as zero.
pub(crate) fn sanitize_probability(name: &str, p: f64) -> f64 {
    if p.is_nan() {
        warn!(knob = name, "Probability is NaN, using 0");
        return 0.0;
    }
    p.clamp(0.0, 1.0)
}
