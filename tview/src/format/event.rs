//! Event records and their typed payloads.
//!
//! [`Event`] is a sum type: the payload layout is fully determined by the
//! variant, and both the codec and the timeline reconstructor match on it
//! exhaustively, so adding an event kind is a compile error everywhere it
//! needs handling.

use tview_common::{
    payload_size, EVENT_ANNOTATION, EVENT_IO_END, EVENT_IO_START, EVENT_LOCK_ACQUIRED,
    EVENT_LOCK_ATTEMPT, EVENT_MONITOR_NOTIFY, EVENT_MONITOR_WAIT, EVENT_SLEEP_END,
    EVENT_SLEEP_START, EVENT_THREAD_END, EVENT_THREAD_START, EVENT_UNLOCK, RECORD_HEADER_SIZE,
};

use crate::domain::{Duration, FormatError, StringOffset, SyncId, ThreadId, Timestamp};

/// Wire-level event type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ThreadStart,
    ThreadEnd,
    LockAttempt,
    LockAcquired,
    Unlock,
    MonitorWait,
    MonitorNotify,
    Annotation,
    SleepStart,
    SleepEnd,
    IoStart,
    IoEnd,
}

impl EventType {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            EventType::ThreadStart => EVENT_THREAD_START,
            EventType::ThreadEnd => EVENT_THREAD_END,
            EventType::LockAttempt => EVENT_LOCK_ATTEMPT,
            EventType::LockAcquired => EVENT_LOCK_ACQUIRED,
            EventType::Unlock => EVENT_UNLOCK,
            EventType::MonitorWait => EVENT_MONITOR_WAIT,
            EventType::MonitorNotify => EVENT_MONITOR_NOTIFY,
            EventType::Annotation => EVENT_ANNOTATION,
            EventType::SleepStart => EVENT_SLEEP_START,
            EventType::SleepEnd => EVENT_SLEEP_END,
            EventType::IoStart => EVENT_IO_START,
            EventType::IoEnd => EVENT_IO_END,
        }
    }

    /// `None` for codes this reader does not know (skippable via `data_size`)
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            EVENT_THREAD_START => EventType::ThreadStart,
            EVENT_THREAD_END => EventType::ThreadEnd,
            EVENT_LOCK_ATTEMPT => EventType::LockAttempt,
            EVENT_LOCK_ACQUIRED => EventType::LockAcquired,
            EVENT_UNLOCK => EventType::Unlock,
            EVENT_MONITOR_WAIT => EventType::MonitorWait,
            EVENT_MONITOR_NOTIFY => EventType::MonitorNotify,
            EVENT_ANNOTATION => EventType::Annotation,
            EVENT_SLEEP_START => EventType::SleepStart,
            EVENT_SLEEP_END => EventType::SleepEnd,
            EVENT_IO_START => EventType::IoStart,
            EVENT_IO_END => EventType::IoEnd,
            _ => return None,
        })
    }

    /// Payload size in bytes
    #[must_use]
    pub fn payload_size(self) -> usize {
        payload_size(self.code()).unwrap_or(0)
    }
}

/// A single typed occurrence on one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ThreadStart,
    ThreadEnd,
    LockAttempt { object: SyncId },
    LockAcquired { object: SyncId },
    Unlock { object: SyncId },
    /// `timeout: None` is encoded as 0; `Some(Duration(0))` is rejected by [`Event::check`]
    MonitorWait { object: SyncId, timeout: Option<Duration> },
    MonitorNotify { object: SyncId },
    Annotation { message: StringOffset },
    SleepStart { duration: Duration },
    SleepEnd,
    IoStart { operation: StringOffset, target: StringOffset },
    IoEnd,
}

impl Event {
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Event::ThreadStart => EventType::ThreadStart,
            Event::ThreadEnd => EventType::ThreadEnd,
            Event::LockAttempt { .. } => EventType::LockAttempt,
            Event::LockAcquired { .. } => EventType::LockAcquired,
            Event::Unlock { .. } => EventType::Unlock,
            Event::MonitorWait { .. } => EventType::MonitorWait,
            Event::MonitorNotify { .. } => EventType::MonitorNotify,
            Event::Annotation { .. } => EventType::Annotation,
            Event::SleepStart { .. } => EventType::SleepStart,
            Event::SleepEnd => EventType::SleepEnd,
            Event::IoStart { .. } => EventType::IoStart,
            Event::IoEnd => EventType::IoEnd,
        }
    }

    /// Sync object this event refers to, if any
    #[must_use]
    pub fn sync_object(&self) -> Option<SyncId> {
        match *self {
            Event::LockAttempt { object }
            | Event::LockAcquired { object }
            | Event::Unlock { object }
            | Event::MonitorWait { object, .. }
            | Event::MonitorNotify { object } => Some(object),
            _ => None,
        }
    }

    /// String table entries this event refers to
    #[must_use]
    pub fn string_refs(&self) -> [Option<StringOffset>; 2] {
        match *self {
            Event::Annotation { message } => [Some(message), None],
            Event::IoStart { operation, target } => [Some(operation), Some(target)],
            _ => [None, None],
        }
    }

    /// Reject values the wire format cannot represent
    pub fn check(&self) -> Result<(), FormatError> {
        match *self {
            Event::MonitorWait { object, timeout: Some(Duration(0)) } => Err(FormatError::malformed(format!(
                "wait on {object} has a zero timeout, which is reserved for no timeout"
            ))),
            _ => Ok(()),
        }
    }

    pub(crate) fn encode_payload(&self, out: &mut Vec<u8>) {
        match *self {
            Event::ThreadStart | Event::ThreadEnd | Event::SleepEnd | Event::IoEnd => {}
            Event::LockAttempt { object }
            | Event::LockAcquired { object }
            | Event::Unlock { object }
            | Event::MonitorNotify { object } => out.extend_from_slice(&object.0.to_le_bytes()),
            Event::MonitorWait { object, timeout } => {
                out.extend_from_slice(&object.0.to_le_bytes());
                out.extend_from_slice(&timeout.map_or(0, |t| t.0).to_le_bytes());
            }
            Event::Annotation { message } => out.extend_from_slice(&message.0.to_le_bytes()),
            Event::SleepStart { duration } => out.extend_from_slice(&duration.0.to_le_bytes()),
            Event::IoStart { operation, target } => {
                out.extend_from_slice(&operation.0.to_le_bytes());
                out.extend_from_slice(&target.0.to_le_bytes());
            }
        }
    }

    /// Decode the payload of a known event type.
    ///
    /// Bytes past the known layout are ignored; `None` if `data` is too short.
    pub(crate) fn decode_payload(ty: EventType, data: &[u8]) -> Option<Event> {
        if data.len() < ty.payload_size() {
            return None;
        }
        let u64_at = |at: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&data[at..at + 8]);
            u64::from_le_bytes(buf)
        };
        let u32_at = |at: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&data[at..at + 4]);
            u32::from_le_bytes(buf)
        };

        Some(match ty {
            EventType::ThreadStart => Event::ThreadStart,
            EventType::ThreadEnd => Event::ThreadEnd,
            EventType::LockAttempt => Event::LockAttempt { object: SyncId(u64_at(0)) },
            EventType::LockAcquired => Event::LockAcquired { object: SyncId(u64_at(0)) },
            EventType::Unlock => Event::Unlock { object: SyncId(u64_at(0)) },
            EventType::MonitorWait => {
                let timeout = u64_at(8);
                Event::MonitorWait {
                    object: SyncId(u64_at(0)),
                    timeout: (timeout > 0).then_some(Duration(timeout)),
                }
            }
            EventType::MonitorNotify => Event::MonitorNotify { object: SyncId(u64_at(0)) },
            EventType::Annotation => Event::Annotation { message: StringOffset(u32_at(0)) },
            EventType::SleepStart => Event::SleepStart { duration: Duration(u64_at(0)) },
            EventType::SleepEnd => Event::SleepEnd,
            EventType::IoStart => Event::IoStart {
                operation: StringOffset(u32_at(0)),
                target: StringOffset(u32_at(4)),
            },
            EventType::IoEnd => Event::IoEnd,
        })
    }
}

/// One persisted event: when, on which thread, what.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    pub timestamp: Timestamp,
    pub thread: ThreadId,
    pub event: Event,
}

impl EventRecord {
    #[must_use]
    pub fn new(timestamp: Timestamp, thread: ThreadId, event: Event) -> Self {
        Self { timestamp, thread, event }
    }

    /// Size of this record on disk
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.event.event_type().payload_size()
    }

    /// Append the record header and payload to `out`
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        let ty = self.event.event_type();
        out.extend_from_slice(&self.timestamp.0.to_le_bytes());
        out.extend_from_slice(&self.thread.0.to_le_bytes());
        out.push(ty.code());
        // Known payloads are at most 16 bytes
        #[allow(clippy::cast_possible_truncation)]
        out.push(ty.payload_size() as u8);
        out.extend_from_slice(&0u16.to_le_bytes());
        self.event.encode_payload(out);
    }
}
