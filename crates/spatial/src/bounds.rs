use glam::Vec3;

/// Axis-aligned box with half-open extent: a point is inside when
/// `min <= p < max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Half-open containment test.
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x < self.max.x
            && p.y >= self.min.y
            && p.y < self.max.y
            && p.z >= self.min.z
            && p.z < self.max.z
    }

    /// Whether two half-open boxes overlap. Boxes that merely touch on a
    /// face do not overlap.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }
}

/// Cubic region owned by one octree node: origin corner plus edge length.
/// Like [`Aabb`], the region is half-open per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cube {
    pub origin: Vec3,
    pub size: f32,
}

impl Cube {
    pub fn new(origin: Vec3, size: f32) -> Self {
        Self { origin, size }
    }

    pub fn min(&self) -> Vec3 {
        self.origin
    }

    pub fn max(&self) -> Vec3 {
        self.origin + Vec3::splat(self.size)
    }

    pub fn midpoint(&self) -> Vec3 {
        self.origin + Vec3::splat(self.size * 0.5)
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.as_aabb().contains_point(p)
    }

    pub fn as_aabb(&self) -> Aabb {
        Aabb::new(self.min(), self.max())
    }

    pub fn intersects(&self, range: &Aabb) -> bool {
        self.as_aabb().intersects(range)
    }

    /// Octant index for a point inside this cube.
    ///
    /// Bit 0 = upper x half, bit 1 = upper y half, bit 2 = upper z half.
    /// A coordinate exactly on the midpoint belongs to the upper half; the
    /// same rule applies on insert and on every later descent, so a point
    /// always resolves to the same leaf.
    pub fn octant_of(&self, p: Vec3) -> usize {
        let mid = self.midpoint();
        (p.x >= mid.x) as usize
            | (((p.y >= mid.y) as usize) << 1)
            | (((p.z >= mid.z) as usize) << 2)
    }

    /// The cubic region of one of the eight children.
    pub fn octant_cube(&self, octant: usize) -> Cube {
        let half = self.size * 0.5;
        let origin = self.origin
            + Vec3::new(
                if octant & 1 != 0 { half } else { 0.0 },
                if octant & 2 != 0 { half } else { 0.0 },
                if octant & 4 != 0 { half } else { 0.0 },
            );
        Cube::new(origin, half)
    }
}
