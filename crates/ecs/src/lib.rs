//! Position component store with change notifications.
//!
//! The store is the live authority for entity positions. Movement and the
//! network inbound pipeline write here; derived structures (the spatial
//! index) subscribe and mirror every change. Durability belongs to an
//! outer persistence layer, not to this store.
//!
//! # Invariants
//! - Every mutation notifies all subscribers before the mutating call
//!   returns.
//! - Subscribers are invoked in registration order.
//! - Iteration order over positions is deterministic (BTreeMap).

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use simspace_common::EntityId;

/// Events produced by position mutations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PositionEvent {
    Added { entity: EntityId, position: Vec3 },
    Modified { entity: EntityId, old: Vec3, new: Vec3 },
    Removed { entity: EntityId, position: Vec3 },
}

/// Handle identifying one subscription, returned by
/// [`PositionStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked for every position mutation.
pub type PositionCallback = Arc<dyn Fn(&PositionEvent) + Send + Sync>;

/// Authoritative position storage keyed by entity.
///
/// Uses BTreeMap for canonical iteration order. All mutations dispatch
/// events synchronously; callbacks must not call back into the store.
#[derive(Default)]
pub struct PositionStore {
    positions: BTreeMap<EntityId, Vec3>,
    subscribers: Vec<(SubscriptionId, PositionCallback)>,
    next_subscription: u64,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities with a position.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, entity: EntityId) -> Option<Vec3> {
        self.positions.get(&entity).copied()
    }

    /// Full snapshot for bootstrapping derived structures.
    pub fn positions(&self) -> &BTreeMap<EntityId, Vec3> {
        &self.positions
    }

    /// Set an entity's position, emitting `Added` for a new entity or
    /// `Modified` for an existing one.
    pub fn set_position(&mut self, entity: EntityId, position: Vec3) {
        let event = match self.positions.insert(entity, position) {
            Some(old) => PositionEvent::Modified {
                entity,
                old,
                new: position,
            },
            None => PositionEvent::Added { entity, position },
        };
        self.notify(&event);
    }

    /// Remove an entity's position, emitting `Removed` if it existed.
    pub fn remove_position(&mut self, entity: EntityId) -> Option<Vec3> {
        let removed = self.positions.remove(&entity);
        if let Some(position) = removed {
            self.notify(&PositionEvent::Removed { entity, position });
        }
        removed
    }

    /// Register a callback for all future mutations.
    pub fn subscribe(&mut self, callback: PositionCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, callback));
        tracing::debug!(subscription = id.0, "position store subscriber added");
        id
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Remove a subscription. Returns whether it existed. Once this
    /// returns, the callback will never be invoked again.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        let removed = self.subscribers.len() != before;
        if removed {
            tracing::debug!(subscription = id.0, "position store subscriber removed");
        }
        removed
    }

    fn notify(&self, event: &PositionEvent) {
        for (_, callback) in &self.subscribers {
            callback(event);
        }
    }
}
