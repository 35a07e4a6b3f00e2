//! Segment streaming: which world segments to load and unload around a
//! viewer, decided from the spatial index under per-update budgets.
//!
//! # Invariants
//! - Streaming is a read-only consumer of the segment index; it never
//!   mutates positions.
//! - Decision order is deterministic (BTreeSet bookkeeping).
//! - Load/unload work per update never exceeds the configured budgets.

mod streamer;

pub use streamer::{SegmentStreamer, StreamConfig, StreamStats};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_usable() {
        let config = StreamConfig::default();
        assert!(config.preload_radius >= config.active_radius);
        assert!(config.load_budget > 0);
    }
}
