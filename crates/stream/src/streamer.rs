use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use simspace_index::{SegmentCoord, WorldSegmentIndex};

/// Streaming configuration: active and preload radii (in segments) plus
/// per-update load/unload budgets.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Radius around the viewer that is fully active (ticked + rendered).
    pub active_radius: i32,
    /// Radius around the viewer that is kept loaded.
    pub preload_radius: i32,
    /// Maximum segments to load per update.
    pub load_budget: usize,
    /// Maximum segments to unload per update.
    pub unload_budget: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            active_radius: 1,
            preload_radius: 2,
            load_budget: 8,
            unload_budget: 8,
        }
    }
}

/// Statistics from the last streaming update, for instrumentation.
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub segments_loaded: usize,
    pub segments_unloaded: usize,
    pub total_loaded: usize,
    pub update_time: Duration,
}

/// Tracks loaded segments and decides budgeted load/unload work around a
/// moving viewer, querying the segment index for occupancy.
pub struct SegmentStreamer {
    pub config: StreamConfig,
    loaded: BTreeSet<SegmentCoord>,
    stats: StreamStats,
}

impl SegmentStreamer {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            loaded: BTreeSet::new(),
            stats: StreamStats::default(),
        }
    }

    /// Advance streaming for the viewer's current segment. Returns the
    /// segments loaded and unloaded this update, each capped by its
    /// budget. Only segments that actually contain entities are loaded;
    /// empty space costs nothing.
    pub fn update(
        &mut self,
        viewer: SegmentCoord,
        index: &WorldSegmentIndex,
    ) -> (Vec<SegmentCoord>, Vec<SegmentCoord>) {
        let _span = tracing::info_span!("stream_update").entered();
        let start = Instant::now();

        let desired = segments_in_radius(viewer, self.config.preload_radius);

        let to_load: Vec<SegmentCoord> = desired
            .iter()
            .filter(|s| !self.loaded.contains(s))
            .filter(|s| !index.entities_in_segment(**s).is_empty())
            .take(self.config.load_budget)
            .copied()
            .collect();

        let to_unload: Vec<SegmentCoord> = self
            .loaded
            .iter()
            .filter(|s| !desired.contains(s))
            .take(self.config.unload_budget)
            .copied()
            .collect();

        for segment in &to_load {
            tracing::debug!(?segment, "loading segment");
            self.loaded.insert(*segment);
        }
        for segment in &to_unload {
            tracing::debug!(?segment, "unloading segment");
            self.loaded.remove(segment);
        }

        self.stats = StreamStats {
            segments_loaded: to_load.len(),
            segments_unloaded: to_unload.len(),
            total_loaded: self.loaded.len(),
            update_time: start.elapsed(),
        };
        tracing::trace!(
            loaded = to_load.len(),
            unloaded = to_unload.len(),
            total = self.loaded.len(),
            "stream update complete"
        );

        (to_load, to_unload)
    }

    /// Loaded segments within the active radius of the viewer.
    pub fn active_segments(&self, viewer: SegmentCoord) -> BTreeSet<SegmentCoord> {
        let active = segments_in_radius(viewer, self.config.active_radius);
        self.loaded.intersection(&active).copied().collect()
    }

    pub fn loaded_segments(&self) -> &BTreeSet<SegmentCoord> {
        &self.loaded
    }

    pub fn is_loaded(&self, segment: SegmentCoord) -> bool {
        self.loaded.contains(&segment)
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}

/// All segments within a cubic radius of a center segment.
fn segments_in_radius(center: SegmentCoord, radius: i32) -> BTreeSet<SegmentCoord> {
    let mut result = BTreeSet::new();
    for dx in -radius..=radius {
        for dy in -radius..=radius {
            for dz in -radius..=radius {
                result.insert(SegmentCoord::new(
                    center.x + dx,
                    center.y + dy,
                    center.z + dz,
                ));
            }
        }
    }
    result
}
