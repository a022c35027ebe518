//! Lock contention analysis for reconstructed timelines.
//!
//! Aggregates `BlockedSync` segments by sync object to find the objects
//! threads spend the most time waiting on.
//!
//! # Architecture
//!
//! - **`ContentionStats`** - Aggregation, one segment at a time
//! - **`analyze_contention()`** - Batch analysis of a whole `Timeline`
//!
//! ```text
//! Timeline
//!     │
//!     └──► BlockedSync segments ──► ContentionStats.record_segment()
//!                                        │
//!                                        └──► to_hotspots() ──► Vec<ContentionHotspot>
//! ```

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeMap, HashMap};

use crate::domain::{Duration, SyncId, ThreadId};
use crate::timeline::{StateSegment, ThreadState, Timeline};

// =============================================================================
// CONTENTION HOTSPOT (OUTPUT TYPE)
// =============================================================================

/// A sync object with aggregated blocking statistics.
///
/// ```text
/// CONTENTION (total blocked 1.20ms)
/// ─────────────────────────────────────────────
///   queue-lock      3 waits   0.90ms   75.0%
///   monitor@0x2a    1 wait    0.30ms   25.0%
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ContentionHotspot {
    pub object: SyncId,

    /// Number of blocked segments on this object.
    pub waits: u64,

    pub total_blocked: Duration,

    /// Longest single wait.
    pub max_blocked: Duration,

    /// Share of all blocked-on-sync time (0.0 - 100.0).
    pub percentage: f64,

    /// Per-thread blocked time, ordered by thread id.
    pub threads: BTreeMap<ThreadId, Duration>,
}

// =============================================================================
// CONTENTION STATS (AGGREGATOR)
// =============================================================================

#[derive(Debug, Default)]
pub struct ContentionStats {
    objects: HashMap<SyncId, ObjectStats>,

    /// Denominator for percentages.
    total_blocked: u64,
}

#[derive(Debug, Default)]
struct ObjectStats {
    waits: u64,
    total: u64,
    max: u64,
    threads: BTreeMap<ThreadId, u64>,
}

impl ContentionStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one segment. Anything but a `BlockedSync` segment with an object is ignored.
    pub fn record_segment(&mut self, segment: &StateSegment) {
        if segment.state != ThreadState::BlockedSync {
            return;
        }
        let Some(object) = segment.sync_object() else {
            return;
        };

        let blocked = segment.duration().0;
        self.total_blocked += blocked;

        let stats = self.objects.entry(object).or_default();
        stats.waits += 1;
        stats.total += blocked;
        stats.max = stats.max.max(blocked);
        *stats.threads.entry(segment.thread).or_insert(0) += blocked;
    }

    #[must_use]
    pub fn total_blocked(&self) -> Duration {
        Duration(self.total_blocked)
    }

    /// Hotspots by total blocked time, descending; ties by object id
    #[must_use]
    pub fn to_hotspots(&self) -> Vec<ContentionHotspot> {
        let mut hotspots: Vec<ContentionHotspot> = self
            .objects
            .iter()
            .map(|(&object, stats)| {
                let percentage = if self.total_blocked > 0 {
                    (stats.total as f64 / self.total_blocked as f64) * 100.0
                } else {
                    0.0
                };
                ContentionHotspot {
                    object,
                    waits: stats.waits,
                    total_blocked: Duration(stats.total),
                    max_blocked: Duration(stats.max),
                    percentage,
                    threads: stats.threads.iter().map(|(&t, &ns)| (t, Duration(ns))).collect(),
                }
            })
            .collect();

        hotspots.sort_by(|a, b| b.total_blocked.cmp(&a.total_blocked).then(a.object.cmp(&b.object)));
        hotspots
    }
}

/// Analyze a whole timeline for lock contention.
#[must_use]
pub fn analyze_contention(timeline: &Timeline) -> Vec<ContentionHotspot> {
    let mut stats = ContentionStats::new();
    for lane in &timeline.lanes {
        for segment in &lane.segments {
            stats.record_segment(segment);
        }
    }
    stats.to_hotspots()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timestamp;
    use crate::timeline::{SegmentCause, ThreadLane};

    fn blocked(thread: u32, object: u64, start: u64, end: u64) -> StateSegment {
        StateSegment {
            thread: ThreadId(thread),
            state: ThreadState::BlockedSync,
            start: Timestamp(start),
            end: Timestamp(end),
            cause: Some(SegmentCause::Sync { object: SyncId(object), timeout: None }),
            annotation: None,
            synthesized: false,
        }
    }

    #[test]
    fn test_empty_stats() {
        let stats = ContentionStats::new();
        assert_eq!(stats.total_blocked(), Duration(0));
        assert!(stats.to_hotspots().is_empty());
    }

    #[test]
    fn test_ignores_non_sync_segments() {
        let mut stats = ContentionStats::new();
        stats.record_segment(&StateSegment { state: ThreadState::Sleeping, cause: None, ..blocked(1, 1, 0, 50) });
        assert!(stats.to_hotspots().is_empty());
    }

    #[test]
    fn test_analyze_contention_sorted_by_total() {
        let timeline = Timeline {
            start: Timestamp(0),
            end: Timestamp(200),
            lanes: vec![
                ThreadLane { thread: ThreadId(1), segments: vec![blocked(1, 0xA, 10, 25), blocked(1, 0xB, 30, 130)] },
                ThreadLane { thread: ThreadId(2), segments: vec![blocked(2, 0xA, 0, 35)] },
            ],
            violations: vec![],
        };

        let hotspots = analyze_contention(&timeline);
        assert_eq!(hotspots.len(), 2);

        assert_eq!(hotspots[0].object, SyncId(0xB));
        assert_eq!(hotspots[0].total_blocked, Duration(100));
        assert!((hotspots[0].percentage - 100.0 * 100.0 / 150.0).abs() < 1e-9);

        let a = &hotspots[1];
        assert_eq!(a.waits, 2);
        assert_eq!(a.total_blocked, Duration(50));
        assert_eq!(a.max_blocked, Duration(35));
        assert_eq!(a.threads[&ThreadId(1)], Duration(15));
        assert_eq!(a.threads[&ThreadId(2)], Duration(35));
    }

    #[test]
    fn test_ties_break_by_object_id() {
        let mut stats = ContentionStats::new();
        stats.record_segment(&blocked(1, 9, 0, 10));
        stats.record_segment(&blocked(1, 3, 10, 20));
        let order: Vec<u64> = stats.to_hotspots().iter().map(|h| h.object.0).collect();
        assert_eq!(order, vec![3, 9]);
    }
}
