//! Spot subscriptions and availability alerts.
//!
//! - [`SubscriptionRegistry`] tracks which spots the user wants alerts for.
//! - [`AlertBroadcaster`] fans status changes out to in-process listeners
//!   over bounded channels, dropping listeners that fall behind.
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(SubscriptionRegistry::new());
//! let alerts = AlertBroadcaster::new(Arc::clone(&registry));
//!
//! registry.subscribe(&SpotId::from("lot-campus-spot-7"));
//! let handle = alerts.listen(AlertConfig {
//!     filter: AlertFilter::subscribed_available(),
//!     ..Default::default()
//! });
//!
//! while let Ok(event) = handle.recv() {
//!     match event {
//!         AlertEvent::SpotChanged { change } => println!("{} is now {}", change.spot, change.to),
//!         AlertEvent::Dropped { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

mod manager;
mod registry;
mod types;

pub use manager::AlertBroadcaster;
pub use registry::{SubscribeOutcome, SubscriptionRegistry, UnsubscribeOutcome};
pub use types::{AlertConfig, AlertEvent, AlertFilter, AlertHandle, DropReason, ListenerId};
