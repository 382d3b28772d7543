//! Alert types for spot status notifications.

use crate::types::{LotId, StatusChange, Timestamp};
use serde::{Deserialize, Serialize};

/// Configuration for an alert listener.
#[derive(Clone, Debug)]
pub struct AlertConfig {
    /// Max buffered events before dropping the listener.
    /// Default: 256
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: AlertFilter,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            filter: AlertFilter::default(),
        }
    }
}

/// Filter criteria for alert listeners.
#[derive(Clone, Debug, Default)]
pub struct AlertFilter {
    /// Only spots present in the subscription registry.
    pub subscribed_only: bool,

    /// Only transitions into `available`.
    pub available_only: bool,

    /// Restrict to these lots (None = all lots).
    pub lots: Option<Vec<LotId>>,

    /// Include spot change events.
    pub include_spot_changes: bool,

    /// Include refresh lifecycle events.
    pub include_refresh_events: bool,
}

impl AlertFilter {
    /// Changes to spots the user subscribed to.
    pub fn subscribed() -> Self {
        Self {
            subscribed_only: true,
            include_spot_changes: true,
            ..Default::default()
        }
    }

    /// Subscribed spots that just became free.
    pub fn subscribed_available() -> Self {
        Self {
            available_only: true,
            ..Self::subscribed()
        }
    }

    /// Every spot change in the given lots.
    pub fn lots(lots: Vec<LotId>) -> Self {
        Self {
            lots: Some(lots),
            include_spot_changes: true,
            ..Default::default()
        }
    }

    /// Refresh successes and failures only.
    pub fn refresh() -> Self {
        Self {
            include_refresh_events: true,
            ..Default::default()
        }
    }

    /// Everything.
    pub fn all() -> Self {
        Self {
            include_spot_changes: true,
            include_refresh_events: true,
            ..Default::default()
        }
    }
}

/// Events delivered to alert listeners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertEvent {
    /// A spot changed status through a refresh or a correction.
    SpotChanged { change: StatusChange },

    /// A refresh completed.
    Refreshed { at: Timestamp, changed: usize },

    /// A refresh failed; the store kept its previous contents.
    RefreshFailed { error: String },

    /// Listener was dropped.
    Dropped { reason: DropReason },
}

/// Why a listener was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Buffer overflowed (slow consumer).
    BufferOverflow,
    /// Receiver went away.
    Disconnected,
    /// Explicitly removed.
    Unlistened,
}

/// Unique identifier for a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle to receive alerts.
pub struct AlertHandle {
    pub id: ListenerId,
    pub receiver: crossbeam_channel::Receiver<AlertEvent>,
}

impl AlertHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<AlertEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<AlertEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<AlertEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<AlertEvent> {
        self.receiver.try_iter().collect()
    }
}
