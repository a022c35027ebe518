//! Segment details for presentation layers.
//!
//! [`Inspector::describe`] is a pure projection of a segment against the
//! trace tables: it never mutates, and fails with `NotFound` only when the
//! segment points at a sync object or string the tables do not hold.

use std::fmt;

use crate::domain::{Duration, QueryError, StringOffset, SyncId, ThreadId, Timestamp};
use crate::format::Trace;
use crate::timeline::{SegmentCause, StateSegment, ThreadState};

/// Everything a UI shows for one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDetails {
    pub thread: ThreadId,
    pub thread_name: String,
    pub state: ThreadState,
    pub start: Timestamp,
    pub end: Timestamp,
    pub duration: Duration,
    /// Sync object name, or `"<operation> <target>"` for I/O
    pub waiting_for: Option<String>,
    pub timeout: Option<Duration>,
    pub annotation: Option<String>,
}

impl fmt::Display for SegmentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>12} .. {:<12} {:>10}  {:<11}",
            self.start.to_string(),
            self.end.to_string(),
            self.duration.to_string(),
            self.state.label()
        )?;
        if let Some(waiting_for) = &self.waiting_for {
            write!(f, "  on {waiting_for}")?;
        }
        if let Some(timeout) = self.timeout {
            write!(f, " (timeout {timeout})")?;
        }
        if let Some(annotation) = &self.annotation {
            write!(f, "  \"{annotation}\"")?;
        }
        Ok(())
    }
}

/// Read-only lookups against a decoded trace
#[derive(Debug, Clone, Copy)]
pub struct Inspector<'a> {
    trace: &'a Trace,
}

impl<'a> Inspector<'a> {
    #[must_use]
    pub fn new(trace: &'a Trace) -> Self {
        Self { trace }
    }

    pub fn describe(&self, segment: &StateSegment) -> Result<SegmentDetails, QueryError> {
        let (waiting_for, timeout) = match segment.cause {
            Some(SegmentCause::Sync { object, timeout }) => (Some(self.sync_name(object)?.to_string()), timeout),
            Some(SegmentCause::Io { operation, target }) => {
                (Some(format!("{} {}", self.string(operation)?, self.string(target)?)), None)
            }
            Some(SegmentCause::Sleep { .. }) | None => (None, None),
        };
        let annotation = segment.annotation.map(|offset| self.string(offset).map(str::to_string)).transpose()?;

        Ok(SegmentDetails {
            thread: segment.thread,
            thread_name: self.thread_name(segment.thread),
            state: segment.state,
            start: segment.start,
            end: segment.end,
            duration: segment.duration(),
            waiting_for,
            timeout,
            annotation,
        })
    }

    /// Name from the thread table, or the capture-side default for unlisted threads
    #[must_use]
    pub fn thread_name(&self, thread: ThreadId) -> String {
        self.trace
            .thread_name(thread)
            .map_or_else(|| format!("Thread-{}", thread.0), str::to_string)
    }

    pub fn sync_name(&self, object: SyncId) -> Result<&'a str, QueryError> {
        let info = self
            .trace
            .sync_object(object)
            .ok_or_else(|| QueryError::NotFound(format!("sync object {object}")))?;
        self.string(info.name)
    }

    pub fn string(&self, offset: StringOffset) -> Result<&'a str, QueryError> {
        self.trace
            .strings
            .resolve(offset)
            .map_err(|_| QueryError::NotFound(format!("string {offset}")))
    }
}

/// Shorthand for [`Inspector::describe`]
pub fn describe(trace: &Trace, segment: &StateSegment) -> Result<SegmentDetails, QueryError> {
    Inspector::new(trace).describe(segment)
}
