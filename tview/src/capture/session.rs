//! Capture session lifecycle
//!
//! ```text
//!  start()                      record() x N threads               stop()
//!    │                                 │                              │
//!    ├─ placeholder header ──► sink    ├─► EventQueue ──► flusher ──► sink (records)
//!    └─ spawn flusher                  │                              ├─ join flusher (drain)
//!                                      └─ intern/registry             ├─ close interner
//!                                                                     ├─ tables + strings
//!                                                                     └─ seek(0), patch header
//! ```
//!
//! A session that is dropped without `stop()` is finalized from `Drop`.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

use log::{debug, error, info, warn};

use super::config::CaptureConfig;
use super::flusher::{self, FlusherOutput};
use super::queue::EventQueue;
use super::recorder::Recorder;
use super::registry::{anonymous_sync_name, Interner, Registry};
use crate::domain::{CaptureError, StringOffset, ThreadId, Timestamp};
use crate::format::codec::{encode_tables, finalized_header};
use crate::format::{
    Event, EventRecord, StringTable, StringTableBuilder, SyncObjectInfo, ThreadInfo, TraceHeader,
};

/// Closing flag and the latched failure
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    closing: AtomicBool,
    failed: AtomicBool,
    reported: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl SessionState {
    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closing.store(true, Ordering::Release);
    }

    /// Latch the session failed. Only the first reason is kept.
    pub(crate) fn fail(&self, reason: String) {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            error!("Capture failed: {reason}");
            *failure = Some(reason);
        }
        self.failed.store(true, Ordering::Release);
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether an event may be queued.
    ///
    /// After a failure the first caller gets `CaptureFailed`, everyone after
    /// that gets `Ok(false)` and the event is discarded.
    fn admit(&self) -> Result<bool, CaptureError> {
        if self.is_closing() {
            return Err(CaptureError::CaptureClosed);
        }
        if !self.failed.load(Ordering::Acquire) {
            return Ok(true);
        }
        if self.reported.swap(true, Ordering::AcqRel) {
            Ok(false)
        } else {
            Err(CaptureError::CaptureFailed(self.failure().unwrap_or_default()))
        }
    }
}

/// State shared by the session, its recorders and the flusher
pub(crate) struct Shared {
    pub(crate) state: SessionState,
    pub(crate) queue: EventQueue,
    pub(crate) interner: Interner,
    pub(crate) registry: Registry,
    origin: Instant,
}

impl Shared {
    fn new(config: &CaptureConfig) -> Self {
        Self {
            state: SessionState::default(),
            queue: EventQueue::new(config.buffer_capacity, config.overflow),
            interner: Interner::new(),
            registry: Registry::new(),
            origin: Instant::now(),
        }
    }

    /// Nanoseconds since the session started
    pub(crate) fn now(&self) -> Timestamp {
        Timestamp(u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX))
    }

    pub(crate) fn record(&self, thread: ThreadId, event: Event, timestamp: Timestamp) -> Result<(), CaptureError> {
        event.check()?;
        if self.state.admit()? {
            self.queue.push(EventRecord::new(timestamp, thread, event));
        }
        Ok(())
    }

    pub(crate) fn intern(&self, text: &str) -> Result<StringOffset, CaptureError> {
        self.interner.intern(text)
    }
}

/// What a finalized capture contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Events handed to `record`
    pub events_recorded: u64,
    /// Events persisted in the trace
    pub events_written: u64,
    /// Events lost to queue overflow
    pub events_dropped: u64,
    pub threads: usize,
    pub sync_objects: usize,
    /// String table size in bytes
    pub string_table_size: usize,
    pub end_time: Timestamp,
}

/// A running capture writing to `W`.
///
/// Timestamps are nanoseconds since [`start`](Self::start); the header's
/// start time is therefore always 0.
pub struct CaptureSession<W: Write + Seek + Send + 'static> {
    shared: Arc<Shared>,
    flusher: Option<JoinHandle<FlusherOutput<W>>>,
}

impl CaptureSession<File> {
    /// Create `config.output` and start capturing into it
    pub fn start_file(config: CaptureConfig) -> Result<Self, CaptureError> {
        let file = File::create(&config.output)?;
        info!("Capturing to {}", config.output.display());
        Self::start(file, config)
    }
}

impl<W: Write + Seek + Send + 'static> CaptureSession<W> {
    pub fn start(sink: W, config: CaptureConfig) -> Result<Self, CaptureError> {
        let shared = Arc::new(Shared::new(&config));

        let mut writer = BufWriter::new(sink);
        writer.write_all(&TraceHeader::placeholder(Timestamp(0)).to_bytes())?;
        writer.flush()?;

        let handle = flusher::spawn(writer, Arc::clone(&shared), shared.queue.receiver(), config.flush_interval)?;
        debug!(
            "Capture started: buffer={} overflow={:?} flush_interval={:?}",
            config.buffer_capacity, config.overflow, config.flush_interval
        );

        Ok(Self { shared, flusher: Some(handle) })
    }

    /// Cloneable handle for instrumentation hooks
    #[must_use]
    pub fn recorder(&self) -> Recorder {
        Recorder::new(Arc::clone(&self.shared))
    }

    pub fn record(&self, thread: ThreadId, event: Event, timestamp: Timestamp) -> Result<(), CaptureError> {
        self.shared.record(thread, event, timestamp)
    }

    pub fn intern(&self, text: &str) -> Result<StringOffset, CaptureError> {
        self.shared.intern(text)
    }

    /// Session clock
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.shared.now()
    }

    /// Drain, write the tables and finalize the header.
    ///
    /// Producers must have stopped calling `record` before this is called.
    pub fn stop(mut self) -> Result<CaptureSummary, CaptureError> {
        self.finish().map(|(summary, _)| summary)
    }

    /// Like [`stop`](Self::stop), also handing back the sink
    pub fn stop_into_inner(mut self) -> Result<(CaptureSummary, W), CaptureError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(CaptureSummary, W), CaptureError> {
        let handle = self.flusher.take().ok_or(CaptureError::CaptureClosed)?;
        self.shared.state.close();

        let output = handle
            .join()
            .map_err(|_| CaptureError::CaptureFailed("flusher thread panicked".to_string()))?;
        let strings = self.shared.interner.close()?;

        if let Some(reason) = self.shared.state.failure() {
            return Err(CaptureError::CaptureFailed(reason));
        }

        let end_time = self.shared.now().max(output.last_timestamp);
        let dropped = self.shared.queue.dropped();
        if dropped > 0 {
            warn!("{dropped} events dropped on queue overflow");
        }

        let tables = Tables::finalize(&self.shared.registry, &output, strings, end_time)?;
        let header = finalized_header(
            Timestamp(0),
            end_time,
            output.events_end,
            output.events_written,
            tables.threads.len(),
            tables.sync_objects.len(),
            tables.strings.size(),
            dropped,
        )?;

        let mut tail = Vec::new();
        encode_tables(&mut tail, &tables.threads, &tables.sync_objects, &tables.strings);
        let sink = write_tail(output.writer, &tail, &header).map_err(|err| {
            let reason = format!("finalizing trace: {err}");
            self.shared.state.fail(reason.clone());
            CaptureError::CaptureFailed(reason)
        })?;

        let summary = CaptureSummary {
            events_recorded: self.shared.queue.accepted(),
            events_written: output.events_written as u64,
            events_dropped: dropped,
            threads: tables.threads.len(),
            sync_objects: tables.sync_objects.len(),
            string_table_size: tables.strings.size(),
            end_time,
        };
        info!(
            "Capture finalized: {} events, {} dropped, {} threads, {} sync objects",
            summary.events_written, summary.events_dropped, summary.threads, summary.sync_objects
        );
        Ok((summary, sink))
    }
}

impl<W: Write + Seek + Send + 'static> Drop for CaptureSession<W> {
    fn drop(&mut self) {
        if self.flusher.is_none() {
            return;
        }
        debug!("Capture session dropped without stop(), finalizing");
        if let Err(err) = self.finish() {
            error!("Failed to finalize capture on drop: {err}");
        }
    }
}

/// Thread table, sync table and string table as they will be written
struct Tables {
    threads: Vec<ThreadInfo>,
    sync_objects: Vec<SyncObjectInfo>,
    strings: StringTable,
}

impl Tables {
    fn finalize<W: Write>(
        registry: &Registry,
        output: &FlusherOutput<W>,
        mut strings: StringTableBuilder,
        end_time: Timestamp,
    ) -> Result<Self, CaptureError> {
        let mut threads = Vec::with_capacity(output.threads.threads().len());
        for observed in output.threads.threads() {
            let name = match registry.thread_name(observed.id) {
                Some(name) => name,
                None => strings.intern(&format!("Thread-{}", observed.id.0))?,
            };
            threads.push(ThreadInfo {
                id: observed.id,
                name,
                start: observed.start,
                end: observed.end.unwrap_or(end_time),
            });
        }

        let mut sync_objects = registry.sync_objects();
        for &(id, kind) in &output.referenced_syncs {
            if !registry.is_declared(id) {
                let name = strings.intern(&anonymous_sync_name(kind, id))?;
                debug!("Declaring unnamed sync object {id} as {kind}");
                sync_objects.push(SyncObjectInfo { id, name, kind });
            }
        }

        let strings = strings.finish();
        let names = threads.iter().map(|t| t.name).chain(sync_objects.iter().map(|s| s.name));
        for offset in names.chain(output.string_refs.iter().copied()) {
            strings.resolve(offset)?;
        }

        Ok(Self { threads, sync_objects, strings })
    }
}

/// Append the tables, then overwrite the placeholder header
fn write_tail<W: Write + Seek>(mut writer: BufWriter<W>, tail: &[u8], header: &TraceHeader) -> io::Result<W> {
    writer.write_all(tail)?;
    writer.flush()?;
    let mut sink = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    sink.seek(SeekFrom::Start(0))?;
    sink.write_all(&header.to_bytes())?;
    sink.flush()?;
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FormatError, SyncId};
    use crate::format::{decode, SyncKind};
    use std::io::Cursor;

    fn config() -> CaptureConfig {
        CaptureConfig { flush_interval: std::time::Duration::from_millis(1), ..CaptureConfig::default() }
    }

    #[test]
    fn test_stop_produces_decodable_trace() {
        let session = CaptureSession::start(Cursor::new(Vec::new()), config()).unwrap();
        let t1 = ThreadId(1);
        session.record(t1, Event::ThreadStart, Timestamp(0)).unwrap();
        session.record(t1, Event::LockAttempt { object: SyncId(0x40) }, Timestamp(5)).unwrap();
        session.record(t1, Event::LockAcquired { object: SyncId(0x40) }, Timestamp(8)).unwrap();

        let (summary, sink) = session.stop_into_inner().unwrap();
        assert_eq!(summary.events_written, 3);
        assert_eq!(summary.events_dropped, 0);

        let trace = decode(sink.get_ref()).unwrap();
        assert_eq!(trace.events.len(), 3);
        assert_eq!(trace.thread_name(t1), Some("Thread-1"));
        let object = trace.sync_object(SyncId(0x40)).unwrap();
        assert_eq!(object.kind, SyncKind::Mutex);
        assert_eq!(trace.strings.resolve(object.name).unwrap(), "mutex@0x40");
        // No ThreadEnd: the thread lasts until the trace ends
        assert_eq!(trace.thread(t1).unwrap().end, trace.header.end_time);
    }

    #[test]
    fn test_failure_is_reported_once() {
        let state = SessionState::default();
        assert!(state.admit().unwrap());

        state.fail("disk full".to_string());
        assert!(matches!(state.admit(), Err(CaptureError::CaptureFailed(reason)) if reason == "disk full"));
        assert!(!state.admit().unwrap());
        assert!(!state.admit().unwrap());

        state.close();
        assert!(matches!(state.admit(), Err(CaptureError::CaptureClosed)));
    }

    #[test]
    fn test_zero_wait_timeout_is_refused_at_record() {
        let session = CaptureSession::start(Cursor::new(Vec::new()), config()).unwrap();
        let wait = Event::MonitorWait { object: SyncId(0x80), timeout: Some(crate::domain::Duration(0)) };

        let err = session.record(ThreadId(1), wait, Timestamp(1)).unwrap_err();
        assert!(matches!(err, CaptureError::Format(FormatError::MalformedTrace { .. })));

        let (summary, _) = session.stop_into_inner().unwrap();
        assert_eq!(summary.events_recorded, 0);
        assert_eq!(summary.events_written, 0);
    }

    #[test]
    fn test_dangling_event_string_leaves_header_unfinalized() {
        let session = CaptureSession::start(Cursor::new(Vec::new()), config()).unwrap();
        session
            .record(ThreadId(1), Event::Annotation { message: StringOffset(999) }, Timestamp(1))
            .unwrap();

        let err = session.stop().unwrap_err();
        assert!(matches!(err, CaptureError::Format(FormatError::MalformedTrace { .. })));
    }
}
