//! Timeline data model: thread states, segments, lanes, diagnostics.

use std::fmt;

use tview_common::{STATE_BLOCKED_IO, STATE_BLOCKED_SYNC, STATE_EXECUTING, STATE_SLEEPING};

use crate::domain::{Duration, StringOffset, SyncId, ThreadId, Timestamp};
use crate::format::EventType;

/// Per-thread state machine states.
///
/// `NotStarted` and `Ended` never appear on a segment; they bracket the
/// thread's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    NotStarted,
    Executing,
    BlockedSync,
    BlockedIo,
    Sleeping,
    Ended,
}

impl ThreadState {
    /// Stable numeric code used by exporters; `None` for the lifetime brackets
    #[must_use]
    pub fn code(self) -> Option<u8> {
        match self {
            ThreadState::Executing => Some(STATE_EXECUTING),
            ThreadState::BlockedSync => Some(STATE_BLOCKED_SYNC),
            ThreadState::BlockedIo => Some(STATE_BLOCKED_IO),
            ThreadState::Sleeping => Some(STATE_SLEEPING),
            ThreadState::NotStarted | ThreadState::Ended => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ThreadState::NotStarted => "NotStarted",
            ThreadState::Executing => "Executing",
            ThreadState::BlockedSync => "BlockedSync",
            ThreadState::BlockedIo => "BlockedIo",
            ThreadState::Sleeping => "Sleeping",
            ThreadState::Ended => "Ended",
        }
    }

    /// Blocked or sleeping
    #[must_use]
    pub fn is_waiting(self) -> bool {
        matches!(self, ThreadState::BlockedSync | ThreadState::BlockedIo | ThreadState::Sleeping)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a waiting segment is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentCause {
    Sync { object: SyncId, timeout: Option<Duration> },
    Io { operation: StringOffset, target: StringOffset },
    Sleep { requested: Duration },
}

/// A maximal interval during which one thread held one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSegment {
    pub thread: ThreadId,
    pub state: ThreadState,
    pub start: Timestamp,
    pub end: Timestamp,
    pub cause: Option<SegmentCause>,
    /// Latest annotation recorded while this segment was open
    pub annotation: Option<StringOffset>,
    /// Zero-duration segment inserted to repair a broken event sequence
    pub synthesized: bool,
}

impl StateSegment {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end.since(self.start)
    }

    /// Half-open containment; zero-duration segments contain their instant.
    #[must_use]
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        (self.start <= timestamp && timestamp < self.end) || (self.start == self.end && self.start == timestamp)
    }

    #[must_use]
    pub fn sync_object(&self) -> Option<SyncId> {
        match self.cause {
            Some(SegmentCause::Sync { object, .. }) => Some(object),
            _ => None,
        }
    }
}

/// How an event sequence broke the per-thread protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// First event of the thread was not `ThreadStart`
    MissingThreadStart,
    /// Exit event without the matching blocked or sleeping state
    UnexpectedExit { event: EventType, state: ThreadState },
    /// `LockAcquired` for another object than the one being waited on
    MismatchedSyncObject { expected: SyncId, found: SyncId },
    /// Entry event while already blocked or sleeping
    UnexpectedEntry { event: EventType, state: ThreadState },
    DuplicateThreadStart,
    EventAfterEnd,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::MissingThreadStart => write!(f, "first event is not ThreadStart"),
            ViolationKind::UnexpectedExit { event, state } => write!(f, "{event:?} while {state}"),
            ViolationKind::MismatchedSyncObject { expected, found } => {
                write!(f, "acquired {found} while waiting for {expected}")
            }
            ViolationKind::UnexpectedEntry { event, state } => write!(f, "{event:?} while already {state}"),
            ViolationKind::DuplicateThreadStart => write!(f, "second ThreadStart"),
            ViolationKind::EventAfterEnd => write!(f, "event after ThreadEnd"),
        }
    }
}

/// A repaired protocol violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceViolation {
    pub thread: ThreadId,
    pub timestamp: Timestamp,
    pub kind: ViolationKind,
}

impl fmt::Display for SequenceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.thread, self.timestamp, self.kind)
    }
}

/// One thread's segments, contiguous and in time order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLane {
    pub thread: ThreadId,
    pub segments: Vec<StateSegment>,
}

impl ThreadLane {
    #[must_use]
    pub fn start(&self) -> Option<Timestamp> {
        self.segments.first().map(|s| s.start)
    }

    #[must_use]
    pub fn end(&self) -> Option<Timestamp> {
        self.segments.last().map(|s| s.end)
    }

    /// Segment covering `timestamp`; the later one at a boundary
    #[must_use]
    pub fn segment_at(&self, timestamp: Timestamp) -> Option<&StateSegment> {
        self.segments.iter().rev().find(|s| s.contains(timestamp))
    }

    /// Total time spent in `state`
    #[must_use]
    pub fn time_in(&self, state: ThreadState) -> Duration {
        Duration(self.segments.iter().filter(|s| s.state == state).map(|s| s.duration().0).sum())
    }
}

/// Reconstructed per-thread timelines for a whole trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    pub start: Timestamp,
    pub end: Timestamp,
    /// Sorted by thread id
    pub lanes: Vec<ThreadLane>,
    pub violations: Vec<SequenceViolation>,
}

impl Timeline {
    #[must_use]
    pub fn lane(&self, thread: ThreadId) -> Option<&ThreadLane> {
        self.lanes.iter().find(|lane| lane.thread == thread)
    }

    /// All segments by start time, then thread id, then position in the lane.
    #[must_use]
    pub fn ordered_segments(&self) -> Vec<&StateSegment> {
        let mut ordered: Vec<&StateSegment> = self.lanes.iter().flat_map(|lane| &lane.segments).collect();
        ordered.sort_by_key(|segment| (segment.start, segment.thread));
        ordered
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.lanes.iter().map(|lane| lane.segments.len()).sum()
    }
}
