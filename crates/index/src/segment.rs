use glam::Vec3;
use simspace_common::EntityId;
use simspace_spatial::Aabb;

use crate::indexer::{IndexError, PositionIndex, SharedPositionStore};

/// A 3D segment coordinate in the fixed world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SegmentCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Geometry of the world-segment grid: pure mappings between world
/// positions, segment coordinates, and covering boxes. Segments are the
/// unit of network subscription and load/unload granularity.
#[derive(Debug, Clone, Copy)]
pub struct SegmentGeometry {
    segment_length: f32,
}

impl SegmentGeometry {
    pub fn new(segment_length: f32) -> Self {
        assert!(segment_length > 0.0, "segment_length must be positive");
        Self { segment_length }
    }

    pub fn segment_length(&self) -> f32 {
        self.segment_length
    }

    /// Segment containing a world position (floor division per axis).
    pub fn segment_of(&self, position: Vec3) -> SegmentCoord {
        SegmentCoord {
            x: (position.x / self.segment_length).floor() as i32,
            y: (position.y / self.segment_length).floor() as i32,
            z: (position.z / self.segment_length).floor() as i32,
        }
    }

    /// Half-open covering box of a segment: a position on the upper face
    /// already belongs to the neighboring segment.
    pub fn segment_bounds(&self, segment: SegmentCoord) -> Aabb {
        let min = Vec3::new(segment.x as f32, segment.y as f32, segment.z as f32)
            * self.segment_length;
        Aabb::new(min, min + Vec3::splat(self.segment_length))
    }
}

/// Segment-granular view over a position index.
///
/// Answers "which entities occupy this segment" for load/unload and
/// network subscription decisions by delegating to the range query over
/// the segment's covering box.
pub struct WorldSegmentIndex {
    index: PositionIndex,
    geometry: SegmentGeometry,
}

impl WorldSegmentIndex {
    pub fn new(store: SharedPositionStore, geometry: SegmentGeometry) -> Result<Self, IndexError> {
        Ok(Self {
            index: PositionIndex::new(store)?,
            geometry,
        })
    }

    pub fn geometry(&self) -> SegmentGeometry {
        self.geometry
    }

    /// The underlying position index, for range queries that are not
    /// segment-aligned.
    pub fn index(&self) -> &PositionIndex {
        &self.index
    }

    pub fn segment_of(&self, position: Vec3) -> SegmentCoord {
        self.geometry.segment_of(position)
    }

    /// All entities inside the segment's covering box.
    pub fn entities_in_segment(&self, segment: SegmentCoord) -> Vec<EntityId> {
        let bounds = self.geometry.segment_bounds(segment);
        self.index.entities_in_range(bounds.min, bounds.max)
    }
}
