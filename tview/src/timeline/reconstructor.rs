//! Event stream → per-thread state segments.
//!
//! Each thread is replayed on its own through a small state machine:
//!
//! ```text
//!                 LockAttempt / MonitorWait
//!            ┌──────────────────────────────► BlockedSync ─┐
//!            │            IoStart                          │ LockAcquired
//! ThreadStart│  ┌───────────────────────────► BlockedIo ───┤ IoEnd
//! ──────► Executing       SleepStart                       │ SleepEnd
//!            │  └───────────────────────────► Sleeping ────┘
//!            │ ThreadEnd
//!            └──────► Ended
//! ```
//!
//! Broken sequences are repaired with zero-duration segments and reported as
//! [`SequenceViolation`]s, or rejected when reconstructing strictly.

use std::collections::BTreeMap;

use log::debug;

use super::segment::{SegmentCause, SequenceViolation, StateSegment, ThreadLane, ThreadState, Timeline, ViolationKind};
use crate::domain::{StringOffset, SyncId, ThreadId, TimelineError, Timestamp};
use crate::format::{Event, EventRecord, EventType, Trace};

/// Reconstruct every thread, repairing protocol violations.
#[must_use]
pub fn reconstruct(trace: &Trace) -> Timeline {
    build(trace)
}

/// Reconstruct every thread, failing on the first protocol violation.
pub fn reconstruct_strict(trace: &Trace) -> Result<Timeline, TimelineError> {
    let timeline = build(trace);
    match timeline.violations.first() {
        Some(&SequenceViolation { thread, timestamp, kind }) => {
            Err(TimelineError::MalformedSequence { thread, timestamp, kind })
        }
        None => Ok(timeline),
    }
}

/// Violations come out grouped by thread in id order, each thread's in event order.
fn build(trace: &Trace) -> Timeline {
    let mut per_thread: BTreeMap<ThreadId, Vec<&EventRecord>> = BTreeMap::new();
    for info in &trace.threads {
        per_thread.entry(info.id).or_default();
    }
    for record in &trace.events {
        per_thread.entry(record.thread).or_default().push(record);
    }

    let mut lanes = Vec::with_capacity(per_thread.len());
    let mut violations = Vec::new();
    let mut end = trace.header.end_time;

    for (thread, mut events) in per_thread {
        // Stable: equal timestamps keep recorded order
        events.sort_by_key(|record| record.timestamp);

        let segments = if events.is_empty() {
            idle_thread(trace, thread)
        } else {
            let mut replay = Replay::new(thread);
            for record in &events {
                replay.apply(record);
            }
            let last_event = events.last().map_or(trace.header.end_time, |r| r.timestamp);
            let (segments, found) = replay.finish(trace.header.end_time.max(last_event));
            violations.extend(found);
            segments
        };

        if let Some(last) = segments.last() {
            end = end.max(last.end);
        }
        lanes.push(ThreadLane { thread, segments });
    }

    debug!(
        "Reconstructed {} threads, {} segments, {} violations",
        lanes.len(),
        lanes.iter().map(|l| l.segments.len()).sum::<usize>(),
        violations.len()
    );
    Timeline { start: trace.header.start_time, end, lanes, violations }
}

/// A table thread with no events ran for its whole recorded lifetime
fn idle_thread(trace: &Trace, thread: ThreadId) -> Vec<StateSegment> {
    let Some(info) = trace.thread(thread) else {
        return Vec::new();
    };
    vec![StateSegment {
        thread,
        state: ThreadState::Executing,
        start: info.start,
        end: info.end.max(info.start),
        cause: None,
        annotation: None,
        synthesized: false,
    }]
}

/// The segment currently being built
struct Open {
    state: ThreadState,
    start: Timestamp,
    cause: Option<SegmentCause>,
    annotation: Option<StringOffset>,
}

/// Replay of a single thread's events
struct Replay {
    thread: ThreadId,
    state: ThreadState,
    open: Option<Open>,
    segments: Vec<StateSegment>,
    violations: Vec<SequenceViolation>,
}

impl Replay {
    fn new(thread: ThreadId) -> Self {
        Self {
            thread,
            state: ThreadState::NotStarted,
            open: None,
            segments: Vec::new(),
            violations: Vec::new(),
        }
    }

    fn apply(&mut self, record: &EventRecord) {
        let now = record.timestamp;

        match self.state {
            ThreadState::Ended => {
                self.violation(now, ViolationKind::EventAfterEnd);
                return;
            }
            ThreadState::NotStarted => {
                if record.event == Event::ThreadStart {
                    self.begin(ThreadState::Executing, now, None);
                    return;
                }
                self.violation(now, ViolationKind::MissingThreadStart);
                self.begin(ThreadState::Executing, now, None);
            }
            _ => {}
        }

        match record.event {
            Event::ThreadStart => self.violation(now, ViolationKind::DuplicateThreadStart),
            Event::ThreadEnd => {
                self.close(now);
                self.state = ThreadState::Ended;
            }
            Event::LockAttempt { object } => {
                self.enter(EventType::LockAttempt, ThreadState::BlockedSync, now, SegmentCause::Sync {
                    object,
                    timeout: None,
                });
            }
            Event::MonitorWait { object, timeout } => {
                self.enter(EventType::MonitorWait, ThreadState::BlockedSync, now, SegmentCause::Sync {
                    object,
                    timeout,
                });
            }
            Event::SleepStart { duration } => {
                self.enter(EventType::SleepStart, ThreadState::Sleeping, now, SegmentCause::Sleep {
                    requested: duration,
                });
            }
            Event::IoStart { operation, target } => {
                self.enter(EventType::IoStart, ThreadState::BlockedIo, now, SegmentCause::Io { operation, target });
            }
            Event::LockAcquired { object } => self.acquire(object, now),
            Event::SleepEnd => self.exit(EventType::SleepEnd, ThreadState::Sleeping, now, None),
            Event::IoEnd => self.exit(EventType::IoEnd, ThreadState::BlockedIo, now, None),
            Event::Unlock { .. } | Event::MonitorNotify { .. } => {}
            Event::Annotation { message } => {
                if let Some(open) = self.open.as_mut() {
                    open.annotation = Some(message);
                }
            }
        }
    }

    /// Close everything still open at `end`
    fn finish(mut self, end: Timestamp) -> (Vec<StateSegment>, Vec<SequenceViolation>) {
        self.close(end);
        (self.segments, self.violations)
    }

    fn enter(&mut self, event: EventType, state: ThreadState, now: Timestamp, cause: SegmentCause) {
        if self.state != ThreadState::Executing {
            self.violation(now, ViolationKind::UnexpectedEntry { event, state: self.state });
            self.close(now);
            self.synthesize(ThreadState::Executing, now, None);
        }
        self.close(now);
        self.begin(state, now, Some(cause));
    }

    fn acquire(&mut self, object: SyncId, now: Timestamp) {
        let waited_on = self.open.as_ref().and_then(|open| match open.cause {
            Some(SegmentCause::Sync { object, .. }) => Some(object),
            _ => None,
        });
        if self.state == ThreadState::BlockedSync {
            if let Some(expected) = waited_on.filter(|&expected| expected != object) {
                self.violation(now, ViolationKind::MismatchedSyncObject { expected, found: object });
            }
        }
        let cause = SegmentCause::Sync { object, timeout: None };
        self.exit(EventType::LockAcquired, ThreadState::BlockedSync, now, Some(cause));
    }

    /// Leave `expected` for Executing. Out of sequence, a zero-duration
    /// `expected` segment is inserted first.
    fn exit(
        &mut self,
        event: EventType,
        expected: ThreadState,
        now: Timestamp,
        cause: Option<SegmentCause>,
    ) {
        if self.state != expected {
            self.violation(now, ViolationKind::UnexpectedExit { event, state: self.state });
            self.close(now);
            self.synthesize(expected, now, cause);
        }
        self.close(now);
        self.begin(ThreadState::Executing, now, None);
    }

    fn begin(&mut self, state: ThreadState, start: Timestamp, cause: Option<SegmentCause>) {
        self.state = state;
        self.open = Some(Open { state, start, cause, annotation: None });
    }

    fn close(&mut self, end: Timestamp) {
        if let Some(open) = self.open.take() {
            self.segments.push(StateSegment {
                thread: self.thread,
                state: open.state,
                start: open.start,
                end: end.max(open.start),
                cause: open.cause,
                annotation: open.annotation,
                synthesized: false,
            });
        }
    }

    fn synthesize(&mut self, state: ThreadState, at: Timestamp, cause: Option<SegmentCause>) {
        self.segments.push(StateSegment {
            thread: self.thread,
            state,
            start: at,
            end: at,
            cause,
            annotation: None,
            synthesized: true,
        });
    }

    fn violation(&mut self, timestamp: Timestamp, kind: ViolationKind) {
        debug!("{} at {timestamp}: {kind}", self.thread);
        self.violations.push(SequenceViolation { thread: self.thread, timestamp, kind });
    }
}
