//! Broadcaster for spot alerts.

use crate::types::{StatusChange, Timestamp};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use super::registry::SubscriptionRegistry;
use super::types::{AlertConfig, AlertEvent, AlertHandle, DropReason, ListenerId};

/// Internal listener state.
struct Listener {
    config: AlertConfig,
    sender: Sender<AlertEvent>,
}

impl Listener {
    /// Try to send an event. Returns the drop reason on failure.
    ///
    /// The channel holds one slot beyond `buffer_size`, kept free for the
    /// final `Dropped` notice.
    fn try_send(&self, event: AlertEvent) -> Result<(), DropReason> {
        if self.sender.len() >= self.config.buffer_size {
            return Err(DropReason::BufferOverflow);
        }
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DropReason::BufferOverflow),
            Err(TrySendError::Disconnected(_)) => Err(DropReason::Disconnected),
        }
    }

    fn matches_change(&self, change: &StatusChange, registry: &SubscriptionRegistry) -> bool {
        let filter = &self.config.filter;
        if !filter.include_spot_changes {
            return false;
        }
        if filter.available_only && !change.to.is_available() {
            return false;
        }
        if let Some(ref lots) = filter.lots {
            if !lots.contains(&change.lot) {
                return false;
            }
        }
        !filter.subscribed_only || registry.contains(&change.spot)
    }

    fn wants_refresh_events(&self) -> bool {
        self.config.filter.include_refresh_events
    }
}

/// Fans alerts out to in-process listeners.
///
/// The registry decides which spots count as "subscribed"; the broadcaster
/// only reads it.
pub struct AlertBroadcaster {
    listeners: RwLock<HashMap<ListenerId, Listener>>,
    next_id: AtomicU64,
    registry: Arc<SubscriptionRegistry>,
}

impl AlertBroadcaster {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Register a listener.
    pub fn listen(&self, config: AlertConfig) -> AlertHandle {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size + 1);

        self.listeners.write().insert(id, Listener { config, sender });

        AlertHandle { id, receiver }
    }

    /// Remove a listener.
    pub fn unlisten(&self, id: ListenerId) {
        if let Some(listener) = self.listeners.write().remove(&id) {
            // Best effort
            let _ = listener.sender.try_send(AlertEvent::Dropped {
                reason: DropReason::Unlistened,
            });
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    // --- Broadcasting ---

    /// Publish status transitions.
    pub fn publish_changes(&self, changes: &[StatusChange]) {
        for change in changes {
            let event = AlertEvent::SpotChanged {
                change: change.clone(),
            };
            self.broadcast(|l| l.matches_change(change, &self.registry), event);
        }
    }

    /// Publish a completed refresh.
    pub fn publish_refreshed(&self, at: Timestamp, changed: usize) {
        self.broadcast(
            Listener::wants_refresh_events,
            AlertEvent::Refreshed { at, changed },
        );
    }

    /// Publish a failed refresh.
    pub fn publish_refresh_failed(&self, error: &str) {
        self.broadcast(
            Listener::wants_refresh_events,
            AlertEvent::RefreshFailed {
                error: error.to_string(),
            },
        );
    }

    /// Internal broadcast helper. Drops listeners that fail to receive.
    fn broadcast<F>(&self, filter: F, event: AlertEvent)
    where
        F: Fn(&Listener) -> bool,
    {
        let mut to_remove = Vec::new();

        {
            let listeners = self.listeners.read();
            for (id, listener) in listeners.iter() {
                if filter(listener) {
                    if let Err(reason) = listener.try_send(event.clone()) {
                        to_remove.push((*id, reason));
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            let mut listeners = self.listeners.write();
            for (id, reason) in to_remove {
                if let Some(listener) = listeners.remove(&id) {
                    warn!(listener = id.0, ?reason, "Dropping alert listener");
                    let _ = listener.sender.try_send(AlertEvent::Dropped { reason });
                }
            }
        }
    }
}
