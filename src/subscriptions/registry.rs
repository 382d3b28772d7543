//! Set of spots the current user wants alerts for.

use crate::types::SpotId;
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::info;

/// Result of a subscribe call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    AlreadySubscribed,
}

/// Result of an unsubscribe call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Unsubscribed,
    NotSubscribed,
}

/// Subscription membership, independent of spot lifecycle.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashSet<SpotId>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spot. Re-subscribing is a no-op.
    pub fn subscribe(&self, id: &SpotId) -> SubscribeOutcome {
        if self.entries.write().insert(id.clone()) {
            info!(spot = %id, "Subscribed to spot");
            SubscribeOutcome::Subscribed
        } else {
            SubscribeOutcome::AlreadySubscribed
        }
    }

    /// Remove a spot if present.
    pub fn unsubscribe(&self, id: &SpotId) -> UnsubscribeOutcome {
        if self.entries.write().remove(id) {
            info!(spot = %id, "Unsubscribed from spot");
            UnsubscribeOutcome::Unsubscribed
        } else {
            UnsubscribeOutcome::NotSubscribed
        }
    }

    pub fn contains(&self, id: &SpotId) -> bool {
        self.entries.read().contains(id)
    }

    /// Subscribed ids, sorted.
    pub fn list(&self) -> Vec<SpotId> {
        let mut ids: Vec<SpotId> = self.entries.read().iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every entry, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let n = entries.len();
        entries.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let id = SpotId::from("lot-a-spot-1");

        assert_eq!(registry.subscribe(&id), SubscribeOutcome::Subscribed);
        assert_eq!(registry.subscribe(&id), SubscribeOutcome::AlreadySubscribed);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&id));
    }

    #[test]
    fn test_unsubscribe_non_member() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(
            registry.unsubscribe(&SpotId::from("missing")),
            UnsubscribeOutcome::NotSubscribed
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_and_clear() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(&SpotId::from("b"));
        registry.subscribe(&SpotId::from("a"));

        assert_eq!(registry.list(), vec![SpotId::from("a"), SpotId::from("b")]);
        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
    }
}
