//! Timeline reconstruction
//!
//! Turns a decoded [`Trace`](crate::format::Trace) into per-thread
//! [`ThreadLane`]s of non-overlapping [`StateSegment`]s, plus the
//! diagnostics for any event sequence that had to be repaired.

mod reconstructor;
mod segment;

pub use reconstructor::{reconstruct, reconstruct_strict};
pub use segment::{
    SegmentCause, SequenceViolation, StateSegment, ThreadLane, ThreadState, Timeline, ViolationKind,
};
