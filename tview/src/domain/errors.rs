//! Structured error types for tview
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::{ThreadId, Timestamp};
use crate::timeline::ViolationKind;
use thiserror::Error;

/// Failures reading or writing the binary trace format.
///
/// Every rejection that happens after the magic check carries the number of
/// event records that were still structurally readable, so tooling can say
/// "N events recovered" instead of an opaque "failed to open".
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Unsupported trace format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Malformed trace: {reason} ({events_recovered} events recoverable)")]
    MalformedTrace { reason: String, events_recovered: u32 },

    #[error("Incomplete trace: capture never finalized, header and tables missing ({events_recovered} events recoverable)")]
    IncompleteTrace { events_recovered: u32 },

    #[error("Trace too large: {0} exceeds the 32-bit offset range")]
    TooLarge(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FormatError {
    /// Shorthand for a malformed-trace error with nothing recoverable
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        FormatError::MalformedTrace { reason: reason.into(), events_recovered: 0 }
    }

    /// Events that survived, for errors that can report it
    #[must_use]
    pub fn events_recovered(&self) -> Option<u32> {
        match self {
            FormatError::MalformedTrace { events_recovered, .. }
            | FormatError::IncompleteTrace { events_recovered } => Some(*events_recovered),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Capture session is closed")]
    CaptureClosed,

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for capture option {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("Malformed event sequence on {thread} at {timestamp}: {kind}")]
    MalformedSequence { thread: ThreadId, timestamp: Timestamp, kind: ViolationKind },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Not found in trace tables: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_trace_reports_count() {
        let err = FormatError::IncompleteTrace { events_recovered: 42 };
        assert!(err.to_string().contains("42 events recoverable"));
        assert_eq!(err.events_recovered(), Some(42));
    }

    #[test]
    fn test_unsupported_version_display() {
        let err = FormatError::UnsupportedVersion { found: 9, supported: 1 };
        assert_eq!(err.to_string(), "Unsupported trace format version 9 (supported: 1)");
        assert_eq!(err.events_recovered(), None);
    }

    #[test]
    fn test_malformed_sequence_display() {
        let err = TimelineError::MalformedSequence {
            thread: ThreadId(3),
            timestamp: Timestamp(99),
            kind: ViolationKind::EventAfterEnd,
        };
        let text = err.to_string();
        assert!(text.contains("T3"));
        assert!(text.contains("99ns"));
    }
}
