//! The `.tview` binary trace format
//!
//! - `string_table`: interned, length-prefixed strings addressed by offset
//! - `event`: event records and their typed payloads
//! - `tables`: header, thread table, sync-object table
//! - `codec`: whole-file encode / decode, recoverable-event scan
//!
//! Byte order is little-endian throughout. Constants shared with other
//! producers and consumers live in `tview-common`.

pub mod codec;
pub mod event;
pub mod string_table;
pub mod tables;

pub use codec::{
    decode, decode_with_stats, encode, read_trace_file, scan_recoverable_events,
    write_trace_file, DecodeStats, Trace,
};
pub use event::{Event, EventRecord, EventType};
pub use string_table::{StringTable, StringTableBuilder};
pub use tables::{SyncKind, SyncObjectInfo, ThreadInfo, TraceHeader};
