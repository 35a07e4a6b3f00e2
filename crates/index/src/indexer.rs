use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use glam::Vec3;
use simspace_common::EntityId;
use simspace_ecs::{PositionEvent, PositionStore, SubscriptionId};
use simspace_spatial::{Aabb, Octree, SpatialError};

/// The position store as shared between movement, network inbound, and
/// derived indexes.
pub type SharedPositionStore = Arc<Mutex<PositionStore>>;

/// Errors from indexer construction. Read queries never return these.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("position store lock is poisoned")]
    StorePoisoned,
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

/// Octree-backed index over all entity positions.
///
/// Construction bulk-builds the tree from the store snapshot and subscribes
/// to change notifications in one store critical section, so no event can
/// slip between snapshot and subscription. Dropping the index unsubscribes
/// deterministically: once drop returns, no handler runs again.
pub struct PositionIndex {
    tree: Arc<Octree<EntityId>>,
    store: SharedPositionStore,
    subscription: Option<SubscriptionId>,
}

/// Instrumentation snapshot of the index, taken under one lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndexStats {
    pub entity_count: usize,
    pub node_count: usize,
    pub leaf_count: usize,
    pub depth: usize,
    pub minimum_extent: Vec3,
    pub maximum_extent: Vec3,
}

impl PositionIndex {
    /// Index with the default covering cube at the world origin.
    pub fn new(store: SharedPositionStore) -> Result<Self, IndexError> {
        Self::with_origin(store, Vec3::ZERO)
    }

    /// Index whose initial covering cube starts at `origin`. The tree
    /// expands on its own as entities spread out.
    pub fn with_origin(store: SharedPositionStore, origin: Vec3) -> Result<Self, IndexError> {
        let mut store_guard = store.lock().map_err(|_| IndexError::StorePoisoned)?;
        let tree = Arc::new(Octree::with_data(
            origin,
            store_guard.positions().iter().map(|(id, p)| (*id, *p)),
        )?);
        let handler_tree = Arc::clone(&tree);
        let subscription =
            store_guard.subscribe(Arc::new(move |event| apply_event(&handler_tree, event)));
        tracing::debug!(
            entities = store_guard.len(),
            "position index built from store snapshot"
        );
        drop(store_guard);
        Ok(Self {
            tree,
            store,
            subscription: Some(subscription),
        })
    }

    /// All entities whose position lies inside the half-open box
    /// `[min, max)`.
    pub fn entities_in_range(&self, min: Vec3, max: Vec3) -> Vec<EntityId> {
        let mut out = Vec::new();
        match self.tree.lock() {
            Ok(guard) => guard.elements_in_range(&Aabb::new(min, max), &mut out, |_, id| id),
            Err(error) => {
                tracing::error!(%error, "range query failed; returning empty result");
            }
        }
        out
    }

    /// Range query with matches partitioned into contiguous z bins
    /// `[n * bin_size, (n + 1) * bin_size)`, keyed by bin index `n`.
    /// Used to batch per-depth-plane rendering and shadow work.
    pub fn entities_in_range_z_binned(
        &self,
        min: Vec3,
        max: Vec3,
        bin_size: f32,
    ) -> BTreeMap<i64, Vec<EntityId>> {
        let mut bins = BTreeMap::new();
        if !(bin_size > 0.0) {
            tracing::error!(bin_size, "non-positive z bin size; returning empty result");
            return bins;
        }
        let mut matches: Vec<(Vec3, EntityId)> = Vec::new();
        match self.tree.lock() {
            Ok(guard) => {
                guard.elements_in_range(&Aabb::new(min, max), &mut matches, |p, id| (p, id));
            }
            Err(error) => {
                tracing::error!(%error, "z-binned query failed; returning empty result");
                return bins;
            }
        }
        for (position, id) in matches {
            let bin = (position.z / bin_size).floor() as i64;
            bins.entry(bin).or_insert_with(Vec::new).push(id);
        }
        bins
    }

    /// Number of indexed entities.
    pub fn entity_count(&self) -> usize {
        match self.tree.lock() {
            Ok(guard) => guard.count(),
            Err(error) => {
                tracing::error!(%error, "count read failed; returning 0");
                0
            }
        }
    }

    /// Structural snapshot for instrumentation and debug tooling.
    pub fn stats(&self) -> IndexStats {
        match self.tree.lock() {
            Ok(guard) => {
                let tree = guard.stats();
                IndexStats {
                    entity_count: guard.count(),
                    node_count: tree.node_count,
                    leaf_count: tree.leaf_count,
                    depth: tree.depth,
                    minimum_extent: guard.minimum_extent(),
                    maximum_extent: guard.maximum_extent(),
                }
            }
            Err(error) => {
                tracing::error!(%error, "stats read failed; returning empty stats");
                IndexStats::default()
            }
        }
    }
}

impl Drop for PositionIndex {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            match self.store.lock() {
                Ok(mut store) => {
                    store.unsubscribe(subscription);
                }
                Err(error) => {
                    tracing::error!(%error, "store lock failed during index disposal");
                }
            }
        }
    }
}

/// Floor z value of a bin returned by
/// [`PositionIndex::entities_in_range_z_binned`].
pub fn z_bin_floor(bin: i64, bin_size: f32) -> f32 {
    bin as f32 * bin_size
}

/// Mirror one store notification into the octree.
///
/// One short critical section; never calls back into the store. A failing
/// write means the store and the index disagree, and drift compounds
/// silently, so those are loud.
fn apply_event(tree: &Octree<EntityId>, event: &PositionEvent) {
    let mut guard = match tree.lock() {
        Ok(guard) => guard,
        Err(error) => {
            tracing::error!(%error, ?event, "octree lock failed; dropping position event");
            return;
        }
    };
    let result = match *event {
        PositionEvent::Added { entity, position } => guard.add(position, entity),
        PositionEvent::Modified { entity, new, .. } => guard.update_position(entity, new),
        PositionEvent::Removed { entity, .. } => guard.remove(entity).map(|_| ()),
    };
    if let Err(error) = result {
        tracing::error!(%error, ?event, "position index out of sync with store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_store() -> SharedPositionStore {
        Arc::new(Mutex::new(PositionStore::new()))
    }

    fn spawn_at(store: &SharedPositionStore, position: Vec3) -> EntityId {
        let id = EntityId::new();
        store.lock().unwrap().set_position(id, position);
        id
    }

    #[test]
    fn bootstrap_indexes_existing_entities() {
        let store = shared_store();
        let a = spawn_at(&store, Vec3::new(1.0, 1.0, 1.0));
        let b = spawn_at(&store, Vec3::new(100.0, 0.0, 0.0));

        let index = PositionIndex::new(Arc::clone(&store)).unwrap();
        assert_eq!(index.entity_count(), 2);

        let near = index.entities_in_range(Vec3::ZERO, Vec3::splat(2.0));
        assert_eq!(near, vec![a]);
        let far = index.entities_in_range(Vec3::new(99.0, -1.0, -1.0), Vec3::new(101.0, 1.0, 1.0));
        assert_eq!(far, vec![b]);
    }

    #[test]
    fn store_mutations_flow_through_to_queries() {
        let store = shared_store();
        let index = PositionIndex::new(Arc::clone(&store)).unwrap();

        let id = spawn_at(&store, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(index.entity_count(), 1);
        assert_eq!(
            index.entities_in_range(Vec3::ZERO, Vec3::splat(2.0)),
            vec![id]
        );

        store.lock().unwrap().set_position(id, Vec3::new(50.0, 1.0, 1.0));
        assert!(index.entities_in_range(Vec3::ZERO, Vec3::splat(2.0)).is_empty());
        assert_eq!(
            index.entities_in_range(Vec3::new(49.0, 0.0, 0.0), Vec3::new(51.0, 2.0, 2.0)),
            vec![id]
        );

        store.lock().unwrap().remove_position(id);
        assert_eq!(index.entity_count(), 0);
    }

    #[test]
    fn z_binned_query_partitions_matches() {
        let store = shared_store();
        let low = spawn_at(&store, Vec3::new(1.0, 1.0, 0.5));
        let mid_a = spawn_at(&store, Vec3::new(2.0, 1.0, 1.5));
        let mid_b = spawn_at(&store, Vec3::new(3.0, 1.0, 1.9));
        let _outside = spawn_at(&store, Vec3::new(100.0, 1.0, 1.5));

        let index = PositionIndex::new(Arc::clone(&store)).unwrap();
        let bins = index.entities_in_range_z_binned(Vec3::ZERO, Vec3::splat(8.0), 1.0);

        assert_eq!(bins.len(), 2);
        assert_eq!(bins[&0], vec![low]);
        let mut mids = bins[&1].clone();
        mids.sort();
        let mut expected = vec![mid_a, mid_b];
        expected.sort();
        assert_eq!(mids, expected);
        assert_eq!(z_bin_floor(1, 1.0), 1.0);
        assert_eq!(z_bin_floor(-2, 0.5), -1.0);
    }

    #[test]
    fn z_bins_are_half_open() {
        let store = shared_store();
        let on_edge = spawn_at(&store, Vec3::new(1.0, 1.0, 2.0));
        let index = PositionIndex::new(Arc::clone(&store)).unwrap();
        let bins = index.entities_in_range_z_binned(Vec3::ZERO, Vec3::splat(8.0), 1.0);
        // z exactly on a bin boundary belongs to the upper bin.
        assert_eq!(bins[&2], vec![on_edge]);
        assert!(!bins.contains_key(&1));
    }

    #[test]
    fn non_positive_bin_size_resolves_to_empty() {
        let store = shared_store();
        spawn_at(&store, Vec3::ONE);
        let index = PositionIndex::new(Arc::clone(&store)).unwrap();
        assert!(index
            .entities_in_range_z_binned(Vec3::ZERO, Vec3::splat(8.0), 0.0)
            .is_empty());
    }

    #[test]
    fn disposal_unsubscribes_from_store() {
        let store = shared_store();
        let index = PositionIndex::new(Arc::clone(&store)).unwrap();
        assert_eq!(store.lock().unwrap().subscriber_count(), 1);

        drop(index);
        assert_eq!(store.lock().unwrap().subscriber_count(), 0);
        // Later mutations go nowhere and must not panic.
        spawn_at(&store, Vec3::ONE);
    }

    #[test]
    fn desync_event_is_dropped_without_panic() {
        let tree: Octree<EntityId> = Octree::new(Vec3::ZERO);
        let ghost = EntityId::new();
        // Removing or moving an entity the index never saw must not panic
        // and must leave the tree untouched.
        apply_event(
            &tree,
            &PositionEvent::Removed {
                entity: ghost,
                position: Vec3::ONE,
            },
        );
        apply_event(
            &tree,
            &PositionEvent::Modified {
                entity: ghost,
                old: Vec3::ZERO,
                new: Vec3::ONE,
            },
        );
        assert_eq!(tree.lock().unwrap().count(), 0);

        // Adding the same entity twice keeps the first position.
        apply_event(
            &tree,
            &PositionEvent::Added {
                entity: ghost,
                position: Vec3::ONE,
            },
        );
        apply_event(
            &tree,
            &PositionEvent::Added {
                entity: ghost,
                position: Vec3::splat(2.0),
            },
        );
        assert_eq!(tree.lock().unwrap().count(), 1);
    }

    #[test]
    fn stats_reflect_tree_shape() {
        let store = shared_store();
        spawn_at(&store, Vec3::splat(4.0));
        spawn_at(&store, Vec3::splat(0.4));
        let index = PositionIndex::new(Arc::clone(&store)).unwrap();

        let stats = index.stats();
        assert_eq!(stats.entity_count, 2);
        assert!(stats.node_count > 1);
        assert!(stats.depth > 1);
        assert!(stats.leaf_count > stats.node_count / 2);
        assert_eq!(stats.minimum_extent, Vec3::ZERO);
    }

    #[test]
    fn concurrent_store_writer_and_index_readers() {
        let store = shared_store();
        let index = PositionIndex::new(Arc::clone(&store)).unwrap();

        std::thread::scope(|scope| {
            let writer_store = Arc::clone(&store);
            scope.spawn(move || {
                let mut ids = Vec::new();
                for i in 0..300u32 {
                    let f = i as f32;
                    let id = EntityId::new();
                    writer_store
                        .lock()
                        .unwrap()
                        .set_position(id, Vec3::new(f % 31.0, f % 17.0, f % 11.0));
                    ids.push(id);
                    if i % 4 == 0 {
                        writer_store.lock().unwrap().remove_position(ids[i as usize / 2]);
                    }
                }
            });
            for _ in 0..3 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let hits =
                            index.entities_in_range(Vec3::splat(-64.0), Vec3::splat(64.0));
                        // All live points sit inside the probe box, so a
                        // consistent snapshot can never exceed the writes.
                        assert!(hits.len() <= 300);
                    }
                });
            }
        });

        // Writer done: the index must agree exactly with the store.
        let store_guard = store.lock().unwrap();
        assert_eq!(index.entity_count(), store_guard.len());
        let mut indexed = index.entities_in_range(Vec3::splat(-64.0), Vec3::splat(64.0));
        indexed.sort();
        let mut expected: Vec<EntityId> = store_guard.positions().keys().copied().collect();
        expected.sort();
        assert_eq!(indexed, expected);
    }
}
