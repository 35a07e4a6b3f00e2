use glam::Vec3;
use simspace_common::EntityId;
use simspace_index::PositionIndex;

/// Spatial index inspector for developer tooling.
///
/// Provides read-only queries against the position index for debugging,
/// profiling, and development UI.
pub struct IndexInspector;

impl IndexInspector {
    /// Produce a summary of the index state.
    pub fn summary(index: &PositionIndex) -> IndexSummary {
        let stats = index.stats();
        IndexSummary {
            entity_count: stats.entity_count,
            node_count: stats.node_count,
            leaf_count: stats.leaf_count,
            depth: stats.depth,
            minimum_extent: [
                stats.minimum_extent.x,
                stats.minimum_extent.y,
                stats.minimum_extent.z,
            ],
            maximum_extent: [
                stats.maximum_extent.x,
                stats.maximum_extent.y,
                stats.maximum_extent.z,
            ],
        }
    }

    /// Entities within `radius` of a center point, via an axis-aligned
    /// probe box. Good enough for debug overlays; not a sphere query.
    pub fn entities_near(index: &PositionIndex, center: Vec3, radius: f32) -> Vec<EntityId> {
        index.entities_in_range(center - Vec3::splat(radius), center + Vec3::splat(radius))
    }
}

/// Summary of the spatial index for the inspector.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSummary {
    pub entity_count: usize,
    pub node_count: usize,
    pub leaf_count: usize,
    pub depth: usize,
    pub minimum_extent: [f32; 3],
    pub maximum_extent: [f32; 3],
}

impl std::fmt::Display for IndexSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Index: entities={} nodes={} leaves={} depth={} bounds=[({:.1}, {:.1}, {:.1}) .. ({:.1}, {:.1}, {:.1}))",
            self.entity_count,
            self.node_count,
            self.leaf_count,
            self.depth,
            self.minimum_extent[0],
            self.minimum_extent[1],
            self.minimum_extent[2],
            self.maximum_extent[0],
            self.maximum_extent[1],
            self.maximum_extent[2],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simspace_ecs::PositionStore;
    use std::sync::{Arc, Mutex};

    fn index_with(points: &[Vec3]) -> PositionIndex {
        let store = Arc::new(Mutex::new(PositionStore::new()));
        {
            let mut guard = store.lock().unwrap();
            for p in points {
                guard.set_position(EntityId::new(), *p);
            }
        }
        PositionIndex::new(store).unwrap()
    }

    #[test]
    fn summary_of_empty_index() {
        let index = index_with(&[]);
        let summary = IndexInspector::summary(&index);
        assert_eq!(summary.entity_count, 0);
        assert_eq!(summary.node_count, 1);
        assert_eq!(summary.leaf_count, 1);
        assert_eq!(summary.depth, 1);
    }

    #[test]
    fn summary_tracks_subdivision() {
        let index = index_with(&[Vec3::splat(4.0), Vec3::splat(0.4)]);
        let summary = IndexInspector::summary(&index);
        assert_eq!(summary.entity_count, 2);
        assert!(summary.node_count > 1);
        assert!(summary.depth > 1);
    }

    #[test]
    fn summary_display_is_readable() {
        let index = index_with(&[Vec3::ONE]);
        let text = IndexInspector::summary(&index).to_string();
        assert!(text.contains("entities=1"));
        assert!(text.contains("bounds=["));
    }

    #[test]
    fn entities_near_uses_probe_box() {
        let index = index_with(&[Vec3::new(1.0, 1.0, 1.0), Vec3::new(6.0, 6.0, 6.0)]);
        let near = IndexInspector::entities_near(&index, Vec3::new(1.0, 1.0, 1.0), 2.0);
        assert_eq!(near.len(), 1);
        let all = IndexInspector::entities_near(&index, Vec3::splat(4.0), 10.0);
        assert_eq!(all.len(), 2);
    }
}
