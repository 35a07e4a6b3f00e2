use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use glam::Vec3;

use crate::bounds::{Aabb, Cube};
use crate::error::SpatialError;
use crate::node::{Node, NodeId, NodeKind};

/// Maximum points a leaf may hold before it subdivides.
pub const LEAF_CAPACITY: usize = 1;

/// Edge length of the covering cube of a freshly constructed tree.
pub const DEFAULT_CUBE_EXTENT: f32 = 8.0;

/// Leaves at this edge length or below stop subdividing and hold points
/// beyond capacity. Coincident points would otherwise split forever.
const MIN_LEAF_EXTENT: f32 = 1e-4;

/// Concurrent point octree over ids of type `I`.
///
/// The tree itself is the sole owner of its nodes; every operation goes
/// through the guard returned by [`Octree::lock`], and query results are
/// freshly collected values, so no internal reference can outlive a locked
/// scope. Acquiring the lock twice from one thread deadlocks; that is
/// caller error, not a supported mode.
#[derive(Debug)]
pub struct Octree<I> {
    inner: Mutex<OctreeCore<I>>,
}

/// Scoped lock guard over one octree.
///
/// Dropping the guard releases the lock on every exit path. The guard
/// cannot be cloned or re-used after release.
pub struct OctreeGuard<'a, I> {
    core: MutexGuard<'a, OctreeCore<I>>,
}

/// Structural counters from a full traversal, for instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OctreeStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub depth: usize,
}

#[derive(Debug)]
struct OctreeCore<I> {
    nodes: Vec<Node<I>>,
    root: NodeId,
    count: usize,
    /// Last-known position per id. Remove and update descend straight to
    /// the owning leaf instead of scanning the tree.
    positions: HashMap<I, Vec3>,
}

impl<I> Octree<I>
where
    I: Copy + Eq + Hash + fmt::Debug,
{
    /// Empty tree: a single leaf covering
    /// `[origin, origin + DEFAULT_CUBE_EXTENT)` per axis.
    pub fn new(origin: Vec3) -> Self {
        let root_cube = Cube::new(origin, DEFAULT_CUBE_EXTENT);
        Self {
            inner: Mutex::new(OctreeCore {
                nodes: vec![Node::leaf(root_cube)],
                root: NodeId(0),
                count: 0,
                positions: HashMap::new(),
            }),
        }
    }

    /// Empty tree at `origin`, then every pair inserted through the normal
    /// add path, so bulk load and incremental load produce identical
    /// structure. Fails on a duplicate id in the input.
    pub fn with_data<It>(origin: Vec3, initial: It) -> Result<Self, SpatialError>
    where
        It: IntoIterator<Item = (I, Vec3)>,
    {
        let tree = Self::new(origin);
        {
            let mut guard = tree.lock()?;
            for (id, position) in initial {
                guard.add(position, id)?;
            }
        }
        Ok(tree)
    }

    /// Block until exclusive access is granted, then return the guard.
    ///
    /// A mutex poisoned by a panicking holder surfaces as
    /// [`SpatialError::LockPoisoned`]; the tree's invariants cannot be
    /// trusted past a mid-mutation panic.
    pub fn lock(&self) -> Result<OctreeGuard<'_, I>, SpatialError> {
        let core = self.inner.lock().map_err(|_| SpatialError::LockPoisoned)?;
        Ok(OctreeGuard { core })
    }
}

impl<I> OctreeGuard<'_, I>
where
    I: Copy + Eq + Hash + fmt::Debug,
{
    /// Net adds minus removes. O(1).
    pub fn count(&self) -> usize {
        self.core.count
    }

    pub fn is_empty(&self) -> bool {
        self.core.count == 0
    }

    /// Lower corner of the covering cube. O(1).
    pub fn minimum_extent(&self) -> Vec3 {
        self.core.root_cube().min()
    }

    /// Upper (exclusive) corner of the covering cube. O(1).
    pub fn maximum_extent(&self) -> Vec3 {
        self.core.root_cube().max()
    }

    /// Insert a point. Expands the covering cube first if the position
    /// falls outside it.
    pub fn add(&mut self, position: Vec3, id: I) -> Result<(), SpatialError> {
        self.core.add(position, id)
    }

    /// Remove a point by id, returning its last position.
    pub fn remove(&mut self, id: I) -> Result<Vec3, SpatialError> {
        self.core.remove(id)
    }

    /// Move a point. Stays in place when the new position is still inside
    /// the owning leaf's region; otherwise behaves exactly like remove
    /// followed by add, including any expansion that implies.
    pub fn update_position(&mut self, id: I, new_position: Vec3) -> Result<(), SpatialError> {
        self.core.update_position(id, new_position)
    }

    /// Append `selector(position, id)` to `out` for every point inside the
    /// half-open box. Visits only nodes whose region intersects the box.
    /// No ordering guarantee among matches.
    pub fn elements_in_range<T, F>(&self, range: &Aabb, out: &mut Vec<T>, selector: F)
    where
        F: FnMut(Vec3, I) -> T,
    {
        self.core.elements_in_range(range, out, selector);
    }

    /// Full-traversal structural counters.
    pub fn stats(&self) -> OctreeStats {
        self.core.stats()
    }
}

impl<I> OctreeCore<I>
where
    I: Copy + Eq + Hash + fmt::Debug,
{
    fn root_cube(&self) -> Cube {
        self.nodes[self.root.index()].cube
    }

    fn alloc(&mut self, node: Node<I>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn add(&mut self, position: Vec3, id: I) -> Result<(), SpatialError> {
        if !position.is_finite() {
            return Err(SpatialError::non_finite(position));
        }
        if self.positions.contains_key(&id) {
            return Err(SpatialError::already_present(&id));
        }
        self.expand_to_contain(position);
        self.insert_point(self.root, position, id);
        self.positions.insert(id, position);
        self.count += 1;
        Ok(())
    }

    fn remove(&mut self, id: I) -> Result<Vec3, SpatialError> {
        let position = self
            .positions
            .get(&id)
            .copied()
            .ok_or_else(|| SpatialError::not_found(&id))?;
        let leaf_id = self.descend_to_leaf(self.root, position);
        let removed = match &mut self.nodes[leaf_id.index()].kind {
            NodeKind::Leaf { points } => points
                .iter()
                .position(|(_, pid)| *pid == id)
                .map(|i| points.swap_remove(i).0),
            NodeKind::Internal { .. } => None,
        };
        // The cache is kept in sync with the tree; a miss here means the
        // point is genuinely gone.
        let position = removed.ok_or_else(|| SpatialError::not_found(&id))?;
        self.positions.remove(&id);
        self.count -= 1;
        Ok(position)
    }

    fn update_position(&mut self, id: I, new_position: Vec3) -> Result<(), SpatialError> {
        if !new_position.is_finite() {
            return Err(SpatialError::non_finite(new_position));
        }
        let old_position = self
            .positions
            .get(&id)
            .copied()
            .ok_or_else(|| SpatialError::not_found(&id))?;
        let leaf_id = self.descend_to_leaf(self.root, old_position);
        if self.nodes[leaf_id.index()].cube.contains_point(new_position) {
            // Cheap path: the point stays inside its current leaf region.
            if let NodeKind::Leaf { points } = &mut self.nodes[leaf_id.index()].kind
                && let Some(entry) = points.iter_mut().find(|(_, pid)| *pid == id)
            {
                entry.0 = new_position;
                self.positions.insert(id, new_position);
                return Ok(());
            }
            Err(SpatialError::not_found(&id))
        } else {
            self.remove(id)?;
            self.add(new_position, id)
        }
    }

    fn elements_in_range<T, F>(&self, range: &Aabb, out: &mut Vec<T>, mut selector: F)
    where
        F: FnMut(Vec3, I) -> T,
    {
        let mut stack = vec![self.root];
        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id.index()];
            if !node.cube.intersects(range) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf { points } => {
                    for (position, id) in points {
                        if range.contains_point(*position) {
                            out.push(selector(*position, *id));
                        }
                    }
                }
                NodeKind::Internal { children } => stack.extend_from_slice(children),
            }
        }
    }

    fn stats(&self) -> OctreeStats {
        let mut stats = OctreeStats {
            node_count: 0,
            leaf_count: 0,
            depth: 0,
        };
        let mut stack = vec![(self.root, 1usize)];
        while let Some((node_id, depth)) = stack.pop() {
            stats.node_count += 1;
            stats.depth = stats.depth.max(depth);
            match &self.nodes[node_id.index()].kind {
                NodeKind::Leaf { .. } => stats.leaf_count += 1,
                NodeKind::Internal { children } => {
                    for child in children {
                        stack.push((*child, depth + 1));
                    }
                }
            }
        }
        stats
    }

    /// Double the covering cube toward `target` until it is contained.
    ///
    /// Each round re-roots: the old root keeps its region and becomes the
    /// child at the far end of every grown axis, the other seven octants
    /// start as empty leaves. Existing points are untouched.
    fn expand_to_contain(&mut self, target: Vec3) {
        while !self.root_cube().contains_point(target) {
            let old = self.root_cube();
            let grow_low = [
                target.x < old.origin.x,
                target.y < old.origin.y,
                target.z < old.origin.z,
            ];
            let new_origin = Vec3::new(
                if grow_low[0] { old.origin.x - old.size } else { old.origin.x },
                if grow_low[1] { old.origin.y - old.size } else { old.origin.y },
                if grow_low[2] { old.origin.z - old.size } else { old.origin.z },
            );
            let new_cube = Cube::new(new_origin, old.size * 2.0);
            let octant = grow_low[0] as usize
                | ((grow_low[1] as usize) << 1)
                | ((grow_low[2] as usize) << 2);

            let mut children = [self.root; 8];
            for (i, child) in children.iter_mut().enumerate() {
                if i != octant {
                    *child = self.alloc(Node::leaf(new_cube.octant_cube(i)));
                }
            }
            self.root = self.alloc(Node::internal(new_cube, children));
            tracing::debug!(
                min = ?new_cube.min(),
                max = ?new_cube.max(),
                "octree bounds expanded"
            );
        }
    }

    fn descend_to_leaf(&self, start: NodeId, position: Vec3) -> NodeId {
        let mut node_id = start;
        loop {
            let node = &self.nodes[node_id.index()];
            match &node.kind {
                NodeKind::Leaf { .. } => return node_id,
                NodeKind::Internal { children } => {
                    node_id = children[node.cube.octant_of(position)];
                }
            }
        }
    }

    /// Insert below `start`, splitting any leaf pushed over capacity.
    fn insert_point(&mut self, start: NodeId, position: Vec3, id: I) {
        let leaf_id = self.descend_to_leaf(start, position);
        let cube = self.nodes[leaf_id.index()].cube;
        if let NodeKind::Leaf { points } = &mut self.nodes[leaf_id.index()].kind {
            points.push((position, id));
            if points.len() > LEAF_CAPACITY && cube.size > MIN_LEAF_EXTENT {
                self.split_leaf(leaf_id);
            }
        }
    }

    /// Turn a leaf into an internal node with eight fresh leaf children and
    /// redistribute its points by octant. Re-insertion may cascade further
    /// splits while points share an octant.
    fn split_leaf(&mut self, leaf_id: NodeId) {
        let cube = self.nodes[leaf_id.index()].cube;
        let points = match &mut self.nodes[leaf_id.index()].kind {
            NodeKind::Leaf { points } => std::mem::take(points),
            NodeKind::Internal { .. } => return,
        };

        let mut children = [leaf_id; 8];
        for (i, child) in children.iter_mut().enumerate() {
            *child = self.alloc(Node::leaf(cube.octant_cube(i)));
        }
        self.nodes[leaf_id.index()].kind = NodeKind::Internal { children };

        for (position, id) in points {
            self.insert_point(leaf_id, position, id);
        }
    }
}
