//! # Shared On-Disk Constants (Producer ↔ Consumer)
//!
//! Defines the constants that make up the `.tview` binary format contract.
//! Everything that writes a trace (the capture pipeline) and everything that
//! reads one (decoder, inspector, external viewers) agrees on these values.
//!
//! ## File Layout
//!
//! ```text
//! ┌──────────────────────────┐ 0
//! │ header (64 bytes)        │
//! ├──────────────────────────┤ HEADER_SIZE
//! │ event records            │  16-byte record header + payload
//! ├──────────────────────────┤ thread_table_offset
//! │ thread table             │  THREAD_ENTRY_SIZE per thread
//! ├──────────────────────────┤ sync_table_offset
//! │ sync-object table        │  SYNC_ENTRY_SIZE per object
//! ├──────────────────────────┤ string_table_offset
//! │ string table             │  (u32 len, bytes)*
//! └──────────────────────────┘
//! ```
//!
//! All numeric fields are little-endian.

#![cfg_attr(not(test), no_std)]

// ============================================================================
// Identification
// ============================================================================

/// Magic number at offset 0: "TVIE" when read as big-endian ASCII
pub const TRACE_MAGIC: u32 = 0x5456_4945;

/// Current (and only) supported format version
pub const TRACE_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Fixed Sizes
// ============================================================================

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 64;

/// Size of the fixed part of every event record
///
/// timestamp `u64`, thread id `u32`, event type `u8`, data size `u8`, padding `u16`
pub const RECORD_HEADER_SIZE: usize = 16;

/// Largest payload a single record can carry (`data_size` is a `u8`)
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// Thread table entry: id `u32`, name offset `u32`, start `u64`, end `u64`
pub const THREAD_ENTRY_SIZE: usize = 24;

/// Sync-object table entry: id `u64`, name offset `u32`, kind `u32`
pub const SYNC_ENTRY_SIZE: usize = 16;

/// Length prefix of each string table entry
pub const STRING_LEN_PREFIX: usize = 4;

// ============================================================================
// Header Field Offsets
// ============================================================================

pub const OFF_MAGIC: usize = 0;
pub const OFF_VERSION: usize = 4;
pub const OFF_START_TIME: usize = 8;
pub const OFF_END_TIME: usize = 16;
pub const OFF_NUM_THREADS: usize = 24;
pub const OFF_NUM_EVENTS: usize = 28;
pub const OFF_STRING_TABLE_OFFSET: usize = 32;
pub const OFF_STRING_TABLE_SIZE: usize = 36;
pub const OFF_THREAD_TABLE_OFFSET: usize = 40;
pub const OFF_SYNC_TABLE_OFFSET: usize = 44;
pub const OFF_NUM_SYNC_OBJECTS: usize = 48;
pub const OFF_DROPPED_EVENTS: usize = 52;
pub const OFF_FLAGS: usize = 56;

// ============================================================================
// Header Flags
// ============================================================================

/// Set once the capture reached `stop()` and the tables were written.
///
/// A capture writes the header with this bit clear at start, so a process
/// that dies mid-capture leaves a file that readers reject as incomplete.
pub const FLAG_FINALIZED: u32 = 1 << 0;

// ============================================================================
// Event Type Codes
// ============================================================================

/// Thread began executing. Payload: none
pub const EVENT_THREAD_START: u8 = 1;

/// Thread terminated. Payload: none
pub const EVENT_THREAD_END: u8 = 2;

/// Thread is about to block acquiring a lock. Payload: sync id `u64`
pub const EVENT_LOCK_ATTEMPT: u8 = 3;

/// Thread now owns the lock. Payload: sync id `u64`
pub const EVENT_LOCK_ACQUIRED: u8 = 4;

/// Thread released the lock. Payload: sync id `u64`
pub const EVENT_UNLOCK: u8 = 5;

/// Thread waits on a monitor. Payload: sync id `u64`, timeout ns `u64` (0 = none)
pub const EVENT_MONITOR_WAIT: u8 = 6;

/// Thread notified a monitor. Payload: sync id `u64`
pub const EVENT_MONITOR_NOTIFY: u8 = 7;

/// User annotation. Payload: message string offset `u32`
pub const EVENT_ANNOTATION: u8 = 8;

/// Thread went to sleep. Payload: requested duration ns `u64`
pub const EVENT_SLEEP_START: u8 = 9;

/// Thread woke up. Payload: none
pub const EVENT_SLEEP_END: u8 = 10;

/// Thread blocked on I/O. Payload: operation offset `u32`, target offset `u32`
pub const EVENT_IO_START: u8 = 11;

/// I/O completed. Payload: none
pub const EVENT_IO_END: u8 = 12;

// ============================================================================
// Sync Object Kinds
// ============================================================================

pub const SYNC_KIND_MUTEX: u32 = 0;
pub const SYNC_KIND_MONITOR: u32 = 1;

// ============================================================================
// Thread States (derived, used by exporters for stable coloring)
// ============================================================================

/// Thread is running (green)
pub const STATE_EXECUTING: u8 = 1;

/// Blocked on a lock or monitor (red)
pub const STATE_BLOCKED_SYNC: u8 = 2;

/// Blocked on I/O (blue)
pub const STATE_BLOCKED_IO: u8 = 3;

/// Sleeping (gray)
pub const STATE_SLEEPING: u8 = 4;

/// Payload size in bytes for a known event type code, `None` if the code is unknown
#[must_use]
pub const fn payload_size(event_type: u8) -> Option<usize> {
    match event_type {
        EVENT_THREAD_START | EVENT_THREAD_END | EVENT_SLEEP_END | EVENT_IO_END => Some(0),
        EVENT_ANNOTATION => Some(4),
        EVENT_LOCK_ATTEMPT
        | EVENT_LOCK_ACQUIRED
        | EVENT_UNLOCK
        | EVENT_MONITOR_NOTIFY
        | EVENT_SLEEP_START
        | EVENT_IO_START => Some(8),
        EVENT_MONITOR_WAIT => Some(16),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_fit_in_header() {
        assert!(OFF_FLAGS + 4 <= HEADER_SIZE);
    }

    #[test]
    fn every_known_payload_fits_in_a_record() {
        for code in EVENT_THREAD_START..=EVENT_IO_END {
            let size = payload_size(code).unwrap();
            assert!(size <= MAX_PAYLOAD_SIZE);
        }
        assert_eq!(payload_size(0), None);
        assert_eq!(payload_size(200), None);
    }
}
