//! Fixed-size structures: the file header and the thread / sync-object tables.

use std::fmt;

use tview_common::{
    FLAG_FINALIZED, HEADER_SIZE, OFF_DROPPED_EVENTS, OFF_END_TIME, OFF_FLAGS, OFF_MAGIC,
    OFF_NUM_EVENTS, OFF_NUM_SYNC_OBJECTS, OFF_NUM_THREADS, OFF_START_TIME,
    OFF_STRING_TABLE_OFFSET, OFF_STRING_TABLE_SIZE, OFF_SYNC_TABLE_OFFSET,
    OFF_THREAD_TABLE_OFFSET, OFF_VERSION, SYNC_ENTRY_SIZE, SYNC_KIND_MONITOR, SYNC_KIND_MUTEX,
    THREAD_ENTRY_SIZE, TRACE_FORMAT_VERSION, TRACE_MAGIC,
};

use crate::domain::{StringOffset, SyncId, ThreadId, Timestamp};

/// File header (64 bytes at offset 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceHeader {
    pub magic: u32,
    pub version: u32,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub num_threads: u32,
    pub num_events: u32,
    pub string_table_offset: u32,
    pub string_table_size: u32,
    pub thread_table_offset: u32,
    pub sync_table_offset: u32,
    pub num_sync_objects: u32,
    /// Events lost to buffer overflow during capture (saturating)
    pub dropped_events: u32,
    pub flags: u32,
}

impl TraceHeader {
    /// Header written when capture starts, before anything is known.
    ///
    /// `FINALIZED` is clear, so a file that never reaches `stop()` is
    /// recognisably incomplete.
    #[must_use]
    pub fn placeholder(start_time: Timestamp) -> Self {
        Self {
            magic: TRACE_MAGIC,
            version: TRACE_FORMAT_VERSION,
            start_time,
            end_time: start_time,
            num_threads: 0,
            num_events: 0,
            string_table_offset: 0,
            string_table_size: 0,
            thread_table_offset: 0,
            sync_table_offset: 0,
            num_sync_objects: 0,
            dropped_events: 0,
            flags: 0,
        }
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.flags & FLAG_FINALIZED != 0
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut put = |at: usize, bytes: &[u8]| out[at..at + bytes.len()].copy_from_slice(bytes);
        put(OFF_MAGIC, &self.magic.to_le_bytes());
        put(OFF_VERSION, &self.version.to_le_bytes());
        put(OFF_START_TIME, &self.start_time.0.to_le_bytes());
        put(OFF_END_TIME, &self.end_time.0.to_le_bytes());
        put(OFF_NUM_THREADS, &self.num_threads.to_le_bytes());
        put(OFF_NUM_EVENTS, &self.num_events.to_le_bytes());
        put(OFF_STRING_TABLE_OFFSET, &self.string_table_offset.to_le_bytes());
        put(OFF_STRING_TABLE_SIZE, &self.string_table_size.to_le_bytes());
        put(OFF_THREAD_TABLE_OFFSET, &self.thread_table_offset.to_le_bytes());
        put(OFF_SYNC_TABLE_OFFSET, &self.sync_table_offset.to_le_bytes());
        put(OFF_NUM_SYNC_OBJECTS, &self.num_sync_objects.to_le_bytes());
        put(OFF_DROPPED_EVENTS, &self.dropped_events.to_le_bytes());
        put(OFF_FLAGS, &self.flags.to_le_bytes());
        out
    }

    /// Read the raw fields. No validation beyond the fixed size.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let u64_at = |at: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(buf)
        };
        Self {
            magic: u32_at(OFF_MAGIC),
            version: u32_at(OFF_VERSION),
            start_time: Timestamp(u64_at(OFF_START_TIME)),
            end_time: Timestamp(u64_at(OFF_END_TIME)),
            num_threads: u32_at(OFF_NUM_THREADS),
            num_events: u32_at(OFF_NUM_EVENTS),
            string_table_offset: u32_at(OFF_STRING_TABLE_OFFSET),
            string_table_size: u32_at(OFF_STRING_TABLE_SIZE),
            thread_table_offset: u32_at(OFF_THREAD_TABLE_OFFSET),
            sync_table_offset: u32_at(OFF_SYNC_TABLE_OFFSET),
            num_sync_objects: u32_at(OFF_NUM_SYNC_OBJECTS),
            dropped_events: u32_at(OFF_DROPPED_EVENTS),
            flags: u32_at(OFF_FLAGS),
        }
    }
}

/// Thread metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: StringOffset,
    /// First observed event
    pub start: Timestamp,
    /// `ThreadEnd` time, or the trace end time if the thread never ended
    pub end: Timestamp,
}

impl ThreadInfo {
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.0.to_le_bytes());
        out.extend_from_slice(&self.name.0.to_le_bytes());
        out.extend_from_slice(&self.start.0.to_le_bytes());
        out.extend_from_slice(&self.end.0.to_le_bytes());
    }

    pub(crate) fn decode(entry: &[u8; THREAD_ENTRY_SIZE]) -> Self {
        let mut start = [0u8; 8];
        let mut end = [0u8; 8];
        start.copy_from_slice(&entry[8..16]);
        end.copy_from_slice(&entry[16..24]);
        Self {
            id: ThreadId(u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]])),
            name: StringOffset(u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]])),
            start: Timestamp(u64::from_le_bytes(start)),
            end: Timestamp(u64::from_le_bytes(end)),
        }
    }
}

/// Kind of synchronization object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncKind {
    Mutex,
    Monitor,
    /// Written by a newer producer; preserved as-is
    Other(u32),
}

impl SyncKind {
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            SyncKind::Mutex => SYNC_KIND_MUTEX,
            SyncKind::Monitor => SYNC_KIND_MONITOR,
            SyncKind::Other(code) => code,
        }
    }

    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            SYNC_KIND_MUTEX => SyncKind::Mutex,
            SYNC_KIND_MONITOR => SyncKind::Monitor,
            other => SyncKind::Other(other),
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncKind::Mutex => write!(f, "mutex"),
            SyncKind::Monitor => write!(f, "monitor"),
            SyncKind::Other(code) => write!(f, "kind{code}"),
        }
    }
}

/// Sync object metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncObjectInfo {
    pub id: SyncId,
    pub name: StringOffset,
    pub kind: SyncKind,
}

impl SyncObjectInfo {
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.0.to_le_bytes());
        out.extend_from_slice(&self.name.0.to_le_bytes());
        out.extend_from_slice(&self.kind.code().to_le_bytes());
    }

    pub(crate) fn decode(entry: &[u8; SYNC_ENTRY_SIZE]) -> Self {
        let mut id = [0u8; 8];
        id.copy_from_slice(&entry[0..8]);
        Self {
            id: SyncId(u64::from_le_bytes(id)),
            name: StringOffset(u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]])),
            kind: SyncKind::from_code(u32::from_le_bytes([entry[12], entry[13], entry[14], entry[15]])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes_round_trip() {
        let header = TraceHeader {
            magic: TRACE_MAGIC,
            version: TRACE_FORMAT_VERSION,
            start_time: Timestamp(5),
            end_time: Timestamp(500),
            num_threads: 2,
            num_events: 17,
            string_table_offset: 900,
            string_table_size: 40,
            thread_table_offset: 820,
            sync_table_offset: 868,
            num_sync_objects: 2,
            dropped_events: 3,
            flags: FLAG_FINALIZED,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], &TRACE_MAGIC.to_le_bytes());
        assert_eq!(&bytes[60..64], &[0, 0, 0, 0]);
        assert_eq!(TraceHeader::from_bytes(&bytes), header);
    }

    #[test]
    fn test_placeholder_is_not_finalized() {
        let header = TraceHeader::placeholder(Timestamp(0));
        assert!(!header.is_finalized());
        assert_eq!(header.magic, TRACE_MAGIC);
    }

    #[test]
    fn test_table_entries_round_trip() {
        let thread = ThreadInfo {
            id: ThreadId(4),
            name: StringOffset(8),
            start: Timestamp(10),
            end: Timestamp(99),
        };
        let mut out = Vec::new();
        thread.encode_into(&mut out);
        let entry: [u8; THREAD_ENTRY_SIZE] = out.as_slice().try_into().unwrap();
        assert_eq!(ThreadInfo::decode(&entry), thread);

        let sync = SyncObjectInfo { id: SyncId(0xfeed), name: StringOffset(0), kind: SyncKind::Other(7) };
        let mut out = Vec::new();
        sync.encode_into(&mut out);
        let entry: [u8; SYNC_ENTRY_SIZE] = out.as_slice().try_into().unwrap();
        assert_eq!(SyncObjectInfo::decode(&entry), sync);
    }

    #[test]
    fn test_sync_kind_display() {
        assert_eq!(SyncKind::Mutex.to_string(), "mutex");
        assert_eq!(SyncKind::from_code(1), SyncKind::Monitor);
        assert_eq!(SyncKind::Other(9).to_string(), "kind9");
    }
}
