//! Cluster time.
//!
//! Members agree on a shared notion of time by tracking an offset from
//! their local wall clock; the offset is adjusted when the master's
//! heartbeat carries a different cluster time. Invocation timestamps use
//! this clock so timeout arithmetic agrees across members.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock plus an adjustable cluster offset.
#[derive(Debug, Default)]
pub struct ClusterClock {
    offset_millis: AtomicI64,
}

impl ClusterClock {
    /// Create a clock with zero offset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cluster time in milliseconds since the epoch.
    #[must_use]
    pub fn cluster_time_millis(&self) -> i64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        wall.saturating_add(self.offset_millis.load(Ordering::Relaxed))
    }

    /// Current offset from the local wall clock.
    #[must_use]
    pub fn offset_millis(&self) -> i64 {
        self.offset_millis.load(Ordering::Relaxed)
    }

    /// Replace the offset from the local wall clock.
    pub fn set_offset_millis(&self, offset: i64) {
        self.offset_millis.store(offset, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_shifts_cluster_time() {
        let clock = ClusterClock::new();
        let before = clock.cluster_time_millis();
        clock.set_offset_millis(60_000);
        let after = clock.cluster_time_millis();
        assert!(after >= before + 59_000);
    }

    #[test]
    fn negative_offset() {
        let clock = ClusterClock::new();
        clock.set_offset_millis(-5_000);
        assert_eq!(clock.offset_millis(), -5_000);
    }
}
