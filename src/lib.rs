//! # Lotwatch
//!
//! Client-side synchronization core for a parking availability service.
//!
//! ## Core Concepts
//!
//! - **Entities**: Lots and spots held in one store, with each lot's
//!   available count always derived from its spots
//! - **Refresh**: A background scheduler that periodically reconciles the
//!   store against an upstream snapshot, never running two fetches at once
//! - **Mutations**: Status corrections and subscription toggles confirmed by
//!   the backend before they touch local state
//! - **Alerts**: Change notifications for the spots a user subscribed to
//!
//! ## Example
//!
//! ```ignore
//! use lotwatch::{AlertConfig, AlertFilter, Session, SessionConfig, SpotId, SpotStatus};
//! use lotwatch::{BackendConfig, SimulationConfig};
//!
//! let session = Session::simulated(
//!     SessionConfig::default(),
//!     SimulationConfig::default(),
//!     BackendConfig::default(),
//! )?;
//!
//! let spot = SpotId::from("lot-library-spot-20");
//! session.toggle_subscription(&spot)?;
//! let alerts = session.listen(AlertConfig {
//!     filter: AlertFilter::subscribed_available(),
//!     ..Default::default()
//! });
//!
//! session.report_correction(&spot, SpotStatus::Available)?;
//! let event = alerts.recv()?;
//! ```

pub mod entities;
pub mod error;
pub mod gateway;
pub mod scheduler;
pub mod search;
pub mod session;
pub mod subscriptions;
pub mod types;
pub mod upstream;

// Re-exports
pub use entities::{CountMismatch, EntityStore, ReconcilePolicy, ReconcileReport, StoreConfig};
pub use error::{Result, SyncError};
pub use gateway::{
    BackendConfig, MutationAction, MutationBackend, MutationGateway, SimulatedBackend,
    SubscriptionOutcome,
};
pub use scheduler::{RefreshOutcome, RefreshScheduler, RefreshStatus, SchedulerConfig};
pub use search::{DirectionsRequest, SearchHit, SpotDetails, SpotFilter, TravelMode};
pub use session::{Session, SessionConfig};
pub use subscriptions::{
    AlertBroadcaster, AlertConfig, AlertEvent, AlertFilter, AlertHandle, DropReason, ListenerId,
    SubscribeOutcome, SubscriptionRegistry, UnsubscribeOutcome,
};
pub use types::*;
pub use upstream::{EncodedUpstream, SimulatedUpstream, SimulationConfig, UpstreamSource};
