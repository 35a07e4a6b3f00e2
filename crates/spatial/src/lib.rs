//! Spatial partitioning: concurrent point octree with scoped locking.
//!
//! The octree maintains an exact correspondence between a live set of
//! (id, position) pairs and a hierarchical cubic partition, answering
//! axis-aligned range queries in O(log n + k). It knows nothing about
//! entities or components; the indexer layer owns that mapping.
//!
//! # Invariants
//! - Every stored point lies inside the covering cube, lower-inclusive and
//!   upper-exclusive per axis.
//! - The covering cube only grows, never shrinks, for the tree's lifetime.
//! - All access goes through [`Octree::lock`]; operations are methods on the
//!   returned guard, so holding the lock is enforced at compile time.

mod bounds;
mod error;
mod node;
mod octree;

pub use bounds::{Aabb, Cube};
pub use error::SpatialError;
pub use octree::{DEFAULT_CUBE_EXTENT, LEAF_CAPACITY, Octree, OctreeGuard, OctreeStats};
