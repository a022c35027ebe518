//! Whole-trace encoding and decoding.
//!
//! # Decode order
//!
//! 1. Size and magic → `MalformedTrace`
//! 2. Version → `UnsupportedVersion` (nothing else is trusted before this)
//! 3. `FINALIZED` flag → `IncompleteTrace` when capture never reached `stop()`
//! 4. Table bounds, event stream, tables, string references → `MalformedTrace`
//!
//! Failures after step 2 report how many event records were still readable.
//! A decode either returns a complete [`Trace`] or an error, never a partial one.

use std::collections::HashSet;
use std::path::Path;

use log::{debug, warn};
use tview_common::{
    FLAG_FINALIZED, HEADER_SIZE, RECORD_HEADER_SIZE, SYNC_ENTRY_SIZE, THREAD_ENTRY_SIZE,
    TRACE_FORMAT_VERSION, TRACE_MAGIC,
};

use super::event::{Event, EventRecord, EventType};
use super::string_table::StringTable;
use super::tables::{SyncObjectInfo, ThreadInfo, TraceHeader};
use crate::domain::{FormatError, SyncId, ThreadId, Timestamp};

/// A complete, decoded trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub header: TraceHeader,
    pub threads: Vec<ThreadInfo>,
    pub sync_objects: Vec<SyncObjectInfo>,
    pub strings: StringTable,
    /// In the order they were flushed
    pub events: Vec<EventRecord>,
}

/// Counters reported alongside a successful decode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub events_decoded: u32,
    /// Records with an event type this reader does not know
    pub events_skipped: u32,
}

impl Trace {
    /// Build a trace from its parts, computing every layout field of the header.
    pub fn assemble(
        start_time: Timestamp,
        end_time: Timestamp,
        dropped_events: u64,
        threads: Vec<ThreadInfo>,
        sync_objects: Vec<SyncObjectInfo>,
        strings: StringTable,
        events: Vec<EventRecord>,
    ) -> Result<Self, FormatError> {
        let events_len: usize = events.iter().map(EventRecord::encoded_len).sum();
        let header = finalized_header(
            start_time,
            end_time,
            HEADER_SIZE + events_len,
            events.len(),
            threads.len(),
            sync_objects.len(),
            strings.size(),
            dropped_events,
        )?;
        Ok(Self { header, threads, sync_objects, strings, events })
    }

    #[must_use]
    pub fn thread(&self, id: ThreadId) -> Option<&ThreadInfo> {
        self.threads.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn sync_object(&self, id: SyncId) -> Option<&SyncObjectInfo> {
        self.sync_objects.iter().find(|s| s.id == id)
    }

    /// Thread name, if the thread and its name entry exist
    #[must_use]
    pub fn thread_name(&self, id: ThreadId) -> Option<&str> {
        self.thread(id).and_then(|t| self.strings.resolve(t.name).ok())
    }

    /// Events sorted by timestamp, ties broken by thread id, then flush order.
    #[must_use]
    pub fn events_in_global_order(&self) -> Vec<&EventRecord> {
        let mut ordered: Vec<&EventRecord> = self.events.iter().collect();
        ordered.sort_by_key(|e| (e.timestamp, e.thread));
        ordered
    }

    /// Every string offset held by a table or event must be a table entry,
    /// and every event must be representable on the wire.
    pub fn validate_references(&self) -> Result<(), FormatError> {
        for thread in &self.threads {
            self.strings.resolve(thread.name)?;
        }
        for object in &self.sync_objects {
            self.strings.resolve(object.name)?;
        }
        for record in &self.events {
            record.event.check()?;
            for offset in record.event.string_refs().into_iter().flatten() {
                self.strings.resolve(offset)?;
            }
        }
        Ok(())
    }
}

/// Header for a finalized file whose event stream ends at `events_end`.
///
/// Tables follow the events in fixed order: threads, sync objects, strings.
#[allow(clippy::too_many_arguments)]
pub(crate) fn finalized_header(
    start_time: Timestamp,
    end_time: Timestamp,
    events_end: usize,
    num_events: usize,
    num_threads: usize,
    num_sync_objects: usize,
    string_table_size: usize,
    dropped_events: u64,
) -> Result<TraceHeader, FormatError> {
    let thread_table_offset = events_end;
    let sync_table_offset = thread_table_offset + num_threads * THREAD_ENTRY_SIZE;
    let string_table_offset = sync_table_offset + num_sync_objects * SYNC_ENTRY_SIZE;
    let file_end = string_table_offset + string_table_size;

    let fit = |value: usize, what: &'static str| u32::try_from(value).map_err(|_| FormatError::TooLarge(what));
    fit(file_end, "trace file")?;

    Ok(TraceHeader {
        magic: TRACE_MAGIC,
        version: TRACE_FORMAT_VERSION,
        start_time,
        end_time: end_time.max(start_time),
        num_threads: fit(num_threads, "thread count")?,
        num_events: fit(num_events, "event count")?,
        string_table_offset: fit(string_table_offset, "string table offset")?,
        string_table_size: fit(string_table_size, "string table")?,
        thread_table_offset: fit(thread_table_offset, "thread table offset")?,
        sync_table_offset: fit(sync_table_offset, "sync table offset")?,
        num_sync_objects: fit(num_sync_objects, "sync object count")?,
        dropped_events: u32::try_from(dropped_events).unwrap_or(u32::MAX),
        flags: FLAG_FINALIZED,
    })
}

/// Append the thread table, sync-object table and string table.
pub(crate) fn encode_tables(
    out: &mut Vec<u8>,
    threads: &[ThreadInfo],
    sync_objects: &[SyncObjectInfo],
    strings: &StringTable,
) {
    for thread in threads {
        thread.encode_into(out);
    }
    for object in sync_objects {
        object.encode_into(out);
    }
    out.extend_from_slice(strings.as_bytes());
}

/// Serialize a trace. The header's layout fields are recomputed.
pub fn encode(trace: &Trace) -> Result<Vec<u8>, FormatError> {
    trace.validate_references()?;

    let mut body = Vec::new();
    for record in &trace.events {
        record.encode_into(&mut body);
    }
    let header = finalized_header(
        trace.header.start_time,
        trace.header.end_time,
        HEADER_SIZE + body.len(),
        trace.events.len(),
        trace.threads.len(),
        trace.sync_objects.len(),
        trace.strings.size(),
        u64::from(trace.header.dropped_events),
    )?;

    let mut out = Vec::with_capacity(header.string_table_offset as usize + trace.strings.size());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&body);
    encode_tables(&mut out, &trace.threads, &trace.sync_objects, &trace.strings);
    Ok(out)
}

/// Deserialize a trace.
pub fn decode(bytes: &[u8]) -> Result<Trace, FormatError> {
    decode_with_stats(bytes).map(|(trace, _)| trace)
}

/// Deserialize a trace and report how many records were decoded or skipped.
pub fn decode_with_stats(bytes: &[u8]) -> Result<(Trace, DecodeStats), FormatError> {
    let Some(header_bytes) = bytes.first_chunk::<HEADER_SIZE>() else {
        return Err(FormatError::malformed(format!(
            "file is {} bytes, shorter than the {HEADER_SIZE}-byte header",
            bytes.len()
        )));
    };
    let header = TraceHeader::from_bytes(header_bytes);

    if header.magic != TRACE_MAGIC {
        return Err(FormatError::malformed(format!("bad magic 0x{:08x}", header.magic)));
    }
    if header.version != TRACE_FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: header.version,
            supported: TRACE_FORMAT_VERSION,
        });
    }
    if !header.is_finalized() {
        return Err(FormatError::IncompleteTrace { events_recovered: scan_recoverable_events(bytes) });
    }

    let events_end = (header.thread_table_offset as usize).clamp(HEADER_SIZE, bytes.len());
    let malformed = |reason: String| FormatError::MalformedTrace {
        reason,
        events_recovered: count_records(&bytes[HEADER_SIZE..events_end]),
    };

    if header.end_time < header.start_time {
        return Err(malformed(format!(
            "end time {} precedes start time {}",
            header.end_time, header.start_time
        )));
    }
    let layout = TableBounds::check(&header, bytes.len()).map_err(malformed)?;

    let (events, stats) = decode_events(&bytes[HEADER_SIZE..layout.events_end]).map_err(malformed)?;
    let total = stats.events_decoded + stats.events_skipped;
    if total != header.num_events {
        return Err(malformed(format!(
            "header declares {} events, event stream holds {total}",
            header.num_events
        )));
    }
    if stats.events_skipped > 0 {
        warn!("Skipped {} records with unknown event types", stats.events_skipped);
    }

    let threads: Vec<ThreadInfo> = bytes[layout.events_end..layout.sync_start]
        .chunks_exact(THREAD_ENTRY_SIZE)
        .filter_map(|chunk| chunk.first_chunk::<THREAD_ENTRY_SIZE>().map(ThreadInfo::decode))
        .collect();
    let sync_objects: Vec<SyncObjectInfo> = bytes[layout.sync_start..layout.strings_start]
        .chunks_exact(SYNC_ENTRY_SIZE)
        .filter_map(|chunk| chunk.first_chunk::<SYNC_ENTRY_SIZE>().map(SyncObjectInfo::decode))
        .collect();

    let mut seen_threads = HashSet::new();
    if let Some(dup) = threads.iter().find(|t| !seen_threads.insert(t.id)) {
        return Err(malformed(format!("thread {} listed twice in thread table", dup.id)));
    }
    let mut seen_objects = HashSet::new();
    if let Some(dup) = sync_objects.iter().find(|s| !seen_objects.insert(s.id)) {
        return Err(malformed(format!("sync object {} listed twice", dup.id)));
    }

    let strings = StringTable::from_bytes(bytes[layout.strings_start..layout.strings_end].to_vec())
        .map_err(|err| match err {
            FormatError::MalformedTrace { reason, .. } => malformed(reason),
            other => other,
        })?;

    let trace = Trace { header, threads, sync_objects, strings, events };
    trace.validate_references().map_err(|err| match err {
        FormatError::MalformedTrace { reason, .. } => malformed(reason),
        other => other,
    })?;

    debug!(
        "Decoded trace: {} threads, {} sync objects, {} events",
        trace.threads.len(),
        trace.sync_objects.len(),
        trace.events.len()
    );
    Ok((trace, stats))
}

/// Byte ranges of the sections of a finalized file, validated against its length
struct TableBounds {
    events_end: usize,
    sync_start: usize,
    strings_start: usize,
    strings_end: usize,
}

impl TableBounds {
    fn check(header: &TraceHeader, file_len: usize) -> Result<Self, String> {
        let events_end = header.thread_table_offset as usize;
        let sync_start = header.sync_table_offset as usize;
        let strings_start = header.string_table_offset as usize;
        let strings_end = strings_start + header.string_table_size as usize;

        if events_end < HEADER_SIZE {
            return Err(format!("thread table offset {events_end} overlaps the header"));
        }
        if sync_start != events_end + header.num_threads as usize * THREAD_ENTRY_SIZE {
            return Err(format!(
                "sync table offset {sync_start} does not follow {} thread entries at {events_end}",
                header.num_threads
            ));
        }
        if strings_start != sync_start + header.num_sync_objects as usize * SYNC_ENTRY_SIZE {
            return Err(format!(
                "string table offset {strings_start} does not follow {} sync entries at {sync_start}",
                header.num_sync_objects
            ));
        }
        if strings_end > file_len {
            return Err(format!("string table ends at {strings_end}, file is {file_len} bytes (truncated)"));
        }
        Ok(Self { events_end, sync_start, strings_start, strings_end })
    }
}

/// Decode a complete event stream. Unknown event types are skipped.
fn decode_events(mut stream: &[u8]) -> Result<(Vec<EventRecord>, DecodeStats), String> {
    let mut events = Vec::new();
    let mut stats = DecodeStats::default();
    let mut offset = HEADER_SIZE;

    while !stream.is_empty() {
        let Some(raw) = RawRecord::parse(stream) else {
            return Err(format!("event record at offset {offset} is truncated"));
        };

        match EventType::from_code(raw.event_type) {
            Some(ty) => {
                let Some(event) = Event::decode_payload(ty, raw.data) else {
                    return Err(format!(
                        "event record at offset {offset} has {} payload bytes, {ty:?} needs {}",
                        raw.data.len(),
                        ty.payload_size()
                    ));
                };
                events.push(EventRecord::new(raw.timestamp, raw.thread, event));
                stats.events_decoded += 1;
            }
            None => stats.events_skipped += 1,
        }

        offset += raw.len;
        stream = &stream[raw.len..];
    }

    Ok((events, stats))
}

/// Record header plus a borrowed payload
struct RawRecord<'a> {
    timestamp: Timestamp,
    thread: ThreadId,
    event_type: u8,
    data: &'a [u8],
    /// Total bytes including the record header
    len: usize,
}

impl<'a> RawRecord<'a> {
    fn parse(bytes: &'a [u8]) -> Option<Self> {
        let head = bytes.first_chunk::<RECORD_HEADER_SIZE>()?;
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&head[0..8]);
        let data_size = head[13] as usize;
        let len = RECORD_HEADER_SIZE + data_size;
        let data = bytes.get(RECORD_HEADER_SIZE..len)?;
        Some(Self {
            timestamp: Timestamp(u64::from_le_bytes(ts)),
            thread: ThreadId(u32::from_le_bytes([head[8], head[9], head[10], head[11]])),
            event_type: head[12],
            data,
            len,
        })
    }

    /// Structurally usable: fits in the stream and, if known, carries its full payload
    fn is_readable(&self) -> bool {
        EventType::from_code(self.event_type).map_or(true, |ty| self.data.len() >= ty.payload_size())
    }
}

/// Count leading structurally valid records in an event stream
fn count_records(mut stream: &[u8]) -> u32 {
    let mut count = 0u32;
    while let Some(raw) = RawRecord::parse(stream) {
        if !raw.is_readable() {
            break;
        }
        count = count.saturating_add(1);
        stream = &stream[raw.len..];
    }
    count
}

/// How many event records after the header are still readable.
///
/// Works on finalized and unfinalized files alike; stops at the first record
/// that is cut off or shorter than its type requires.
#[must_use]
pub fn scan_recoverable_events(bytes: &[u8]) -> u32 {
    let Some(header_bytes) = bytes.first_chunk::<HEADER_SIZE>() else {
        return 0;
    };
    let header = TraceHeader::from_bytes(header_bytes);
    let end = if header.is_finalized() {
        (header.thread_table_offset as usize).clamp(HEADER_SIZE, bytes.len())
    } else {
        bytes.len()
    };
    count_records(&bytes[HEADER_SIZE..end])
}

/// Read and decode a trace file
pub fn read_trace_file(path: impl AsRef<Path>) -> Result<Trace, FormatError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Encode a trace and write it to `path`
pub fn write_trace_file(path: impl AsRef<Path>, trace: &Trace) -> Result<(), FormatError> {
    let bytes = encode(trace)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Duration, StringOffset};
    use crate::format::string_table::StringTableBuilder;
    use crate::format::tables::SyncKind;
    use tview_common::{EVENT_LOCK_ATTEMPT, OFF_FLAGS, OFF_MAGIC, OFF_NUM_EVENTS, OFF_VERSION};

    /// Two threads contending on one mutex, with I/O, sleep and an annotation
    fn sample_trace() -> Trace {
        let mut strings = StringTableBuilder::new();
        let main = strings.intern("main").unwrap();
        let worker = strings.intern("worker-1").unwrap();
        let mutex_name = strings.intern("mutexA").unwrap();
        let cond_name = strings.intern("queue").unwrap();
        let note = strings.intern("checkpoint").unwrap();
        let read = strings.intern("read").unwrap();
        let file = strings.intern("/etc/hosts").unwrap();
        let strings = strings.finish();

        let (t1, t2) = (ThreadId(1), ThreadId(2));
        let mutex = SyncId(0x7f00_0010);
        let cond = SyncId(0x7f00_0020);
        let events = vec![
            EventRecord::new(Timestamp(0), t1, Event::ThreadStart),
            EventRecord::new(Timestamp(2), t2, Event::ThreadStart),
            EventRecord::new(Timestamp(10), t1, Event::LockAttempt { object: mutex }),
            EventRecord::new(Timestamp(12), t2, Event::Annotation { message: note }),
            EventRecord::new(Timestamp(25), t1, Event::LockAcquired { object: mutex }),
            EventRecord::new(Timestamp(30), t2, Event::IoStart { operation: read, target: file }),
            EventRecord::new(Timestamp(40), t2, Event::IoEnd),
            EventRecord::new(Timestamp(45), t2, Event::MonitorWait { object: cond, timeout: Some(Duration(1_000)) }),
            EventRecord::new(Timestamp(60), t1, Event::MonitorNotify { object: cond }),
            EventRecord::new(Timestamp(61), t2, Event::LockAcquired { object: cond }),
            EventRecord::new(Timestamp(70), t2, Event::SleepStart { duration: Duration(20) }),
            EventRecord::new(Timestamp(90), t2, Event::SleepEnd),
            EventRecord::new(Timestamp(100), t1, Event::Unlock { object: mutex }),
            EventRecord::new(Timestamp(120), t1, Event::ThreadEnd),
        ];
        let threads = vec![
            ThreadInfo { id: t1, name: main, start: Timestamp(0), end: Timestamp(120) },
            ThreadInfo { id: t2, name: worker, start: Timestamp(2), end: Timestamp(130) },
        ];
        let sync_objects = vec![
            SyncObjectInfo { id: mutex, name: mutex_name, kind: SyncKind::Mutex },
            SyncObjectInfo { id: cond, name: cond_name, kind: SyncKind::Monitor },
        ];

        Trace::assemble(Timestamp(0), Timestamp(130), 4, threads, sync_objects, strings, events).unwrap()
    }

    #[test]
    fn test_round_trip_is_field_for_field() {
        let trace = sample_trace();
        let bytes = encode(&trace).unwrap();
        let (decoded, stats) = decode_with_stats(&bytes).unwrap();

        assert_eq!(decoded, trace);
        assert_eq!(stats, DecodeStats { events_decoded: 14, events_skipped: 0 });
        assert_eq!(decoded.header.dropped_events, 4);
        assert_eq!(bytes.len(), decoded.header.string_table_offset as usize + decoded.strings.size());
    }

    #[test]
    fn test_zero_wait_timeout_is_rejected_by_encode() {
        let mut trace = sample_trace();
        trace.events[7].event = Event::MonitorWait { object: SyncId(0x7f00_0020), timeout: Some(Duration(0)) };

        match encode(&trace) {
            Err(FormatError::MalformedTrace { reason, .. }) => assert!(reason.contains("zero timeout")),
            other => panic!("expected MalformedTrace, got {other:?}"),
        }

        trace.events[7].event = Event::MonitorWait { object: SyncId(0x7f00_0020), timeout: None };
        let decoded = decode(&encode(&trace).unwrap()).unwrap();
        assert_eq!(decoded, trace);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let trace = sample_trace();
        assert_eq!(encode(&trace).unwrap(), encode(&trace).unwrap());
    }

    #[test]
    fn test_zero_magic_is_malformed() {
        let mut bytes = encode(&sample_trace()).unwrap();
        bytes[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(&0u32.to_le_bytes());

        match decode(&bytes) {
            Err(FormatError::MalformedTrace { reason, .. }) => assert!(reason.contains("magic")),
            other => panic!("expected MalformedTrace, got {other:?}"),
        }
    }

    #[test]
    fn test_short_file_is_malformed() {
        assert!(matches!(decode(&[0x45, 0x49]), Err(FormatError::MalformedTrace { .. })));
        assert!(matches!(decode(&[]), Err(FormatError::MalformedTrace { .. })));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut bytes = encode(&sample_trace()).unwrap();
        bytes[OFF_VERSION..OFF_VERSION + 4].copy_from_slice(&2u32.to_le_bytes());

        assert!(matches!(
            decode(&bytes),
            Err(FormatError::UnsupportedVersion { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn test_missing_tables_is_incomplete_not_malformed() {
        // What a crash before stop() leaves behind: placeholder header + events
        let trace = sample_trace();
        let mut bytes = TraceHeader::placeholder(Timestamp(0)).to_bytes().to_vec();
        for record in &trace.events {
            record.encode_into(&mut bytes);
        }
        // Half-written last record
        bytes.extend_from_slice(&[1, 2, 3]);

        match decode(&bytes) {
            Err(FormatError::IncompleteTrace { events_recovered }) => assert_eq!(events_recovered, 14),
            other => panic!("expected IncompleteTrace, got {other:?}"),
        }
        assert_eq!(scan_recoverable_events(&bytes), 14);
    }

    #[test]
    fn test_truncated_string_table_reports_recoverable_events() {
        let bytes = encode(&sample_trace()).unwrap();
        let cut = &bytes[..bytes.len() - 3];

        match decode(cut) {
            Err(FormatError::MalformedTrace { reason, events_recovered }) => {
                assert!(reason.contains("truncated"));
                assert_eq!(events_recovered, 14);
            }
            other => panic!("expected MalformedTrace, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_types_are_skipped_using_data_size() {
        let trace = sample_trace();
        let original = encode(&trace).unwrap();

        // Splice a record with a future event type (code 200, 5 payload bytes)
        // right after the header and bump the declared count.
        let mut future = Vec::new();
        future.extend_from_slice(&1u64.to_le_bytes());
        future.extend_from_slice(&1u32.to_le_bytes());
        future.push(200);
        future.push(5);
        future.extend_from_slice(&[0, 0]);
        future.extend_from_slice(&[9, 9, 9, 9, 9]);

        let mut header = TraceHeader::from_bytes(original.first_chunk::<HEADER_SIZE>().unwrap());
        let shift = u32::try_from(future.len()).unwrap();
        header.num_events += 1;
        header.thread_table_offset += shift;
        header.sync_table_offset += shift;
        header.string_table_offset += shift;

        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&future);
        bytes.extend_from_slice(&original[HEADER_SIZE..]);

        let (decoded, stats) = decode_with_stats(&bytes).unwrap();
        assert_eq!(stats.events_skipped, 1);
        assert_eq!(decoded.events, trace.events);
    }

    #[test]
    fn test_event_count_mismatch_is_malformed() {
        let mut bytes = encode(&sample_trace()).unwrap();
        bytes[OFF_NUM_EVENTS..OFF_NUM_EVENTS + 4].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(FormatError::MalformedTrace { .. })));
    }

    #[test]
    fn test_known_event_with_short_payload_is_malformed() {
        let mut strings = StringTableBuilder::new();
        let name = strings.intern("t").unwrap();
        let trace = Trace::assemble(
            Timestamp(0),
            Timestamp(10),
            0,
            vec![ThreadInfo { id: ThreadId(1), name, start: Timestamp(0), end: Timestamp(10) }],
            vec![],
            strings.finish(),
            vec![EventRecord::new(Timestamp(1), ThreadId(1), Event::IoEnd)],
        )
        .unwrap();
        let mut bytes = encode(&trace).unwrap();
        // Relabel the IoEnd record (no payload) as LockAttempt (needs 8 bytes)
        bytes[HEADER_SIZE + 12] = EVENT_LOCK_ATTEMPT;

        assert!(matches!(decode(&bytes), Err(FormatError::MalformedTrace { .. })));
    }

    #[test]
    fn test_dangling_string_reference_is_rejected() {
        let mut trace = sample_trace();
        trace.events.push(EventRecord::new(
            Timestamp(125),
            ThreadId(2),
            Event::Annotation { message: StringOffset(3) },
        ));
        assert!(matches!(encode(&trace), Err(FormatError::MalformedTrace { .. })));
    }

    #[test]
    fn test_unfinalized_flag_wins_over_table_checks() {
        let mut bytes = encode(&sample_trace()).unwrap();
        bytes[OFF_FLAGS..OFF_FLAGS + 4].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(FormatError::IncompleteTrace { .. })));
    }

    #[test]
    fn test_global_order_breaks_ties_by_thread_id() {
        let mut trace = sample_trace();
        trace.events = vec![
            EventRecord::new(Timestamp(5), ThreadId(2), Event::ThreadStart),
            EventRecord::new(Timestamp(5), ThreadId(1), Event::ThreadStart),
            EventRecord::new(Timestamp(3), ThreadId(2), Event::SleepEnd),
        ];
        let order: Vec<(u64, u32)> =
            trace.events_in_global_order().iter().map(|e| (e.timestamp.0, e.thread.0)).collect();
        assert_eq!(order, vec![(3, 2), (5, 1), (5, 2)]);
    }
}
