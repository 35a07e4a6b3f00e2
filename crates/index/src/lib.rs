//! Position indexers: semantic spatial queries over live entity positions.
//!
//! An indexer subscribes to the position store's change notifications and
//! mirrors every add, move, and remove into a concurrent octree. Consumers
//! (culling, world management, AI perception, interaction checks) only ever
//! call the read API here; none of them touches the octree directly.
//!
//! # Invariants
//! - Each notification is applied under one short octree critical section;
//!   handlers never call back into the store.
//! - Read queries never fail a frame: internal faults are logged and
//!   resolved to an empty result.
//! - Store/index desync (`AlreadyPresent`/`NotFound` on the write side) is
//!   logged at error level, never swallowed.

mod indexer;
mod segment;

pub use indexer::{IndexError, IndexStats, PositionIndex, SharedPositionStore, z_bin_floor};
pub use segment::{SegmentCoord, SegmentGeometry, WorldSegmentIndex};
