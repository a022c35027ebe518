//! Background flusher: drains the event queue into the trace sink.
//!
//! Records are encoded straight into a `BufWriter` as they arrive and pushed
//! to the sink whenever the queue goes idle for one flush interval, so a
//! crash loses at most the last interval's worth of events. Only the tables
//! and the header wait for `stop()`.

use std::collections::{HashMap, HashSet};
use std::io::{self, BufWriter, Seek, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::debug;
use tview_common::HEADER_SIZE;

use super::session::Shared;
use crate::domain::{StringOffset, SyncId, ThreadId, Timestamp};
use crate::format::{Event, EventRecord, SyncKind};

/// Per-thread lifetime as observed in persisted events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ObservedThread {
    pub id: ThreadId,
    pub start: Timestamp,
    pub end: Option<Timestamp>,
}

/// Threads in first-observation order
#[derive(Debug, Default)]
pub(crate) struct ThreadArena {
    slots: HashMap<ThreadId, usize>,
    threads: Vec<ObservedThread>,
}

impl ThreadArena {
    fn observe(&mut self, record: &EventRecord) {
        let slot = *self.slots.entry(record.thread).or_insert_with(|| {
            debug!("First event from thread {} at {}", record.thread, record.timestamp);
            self.threads.push(ObservedThread { id: record.thread, start: record.timestamp, end: None });
            self.threads.len() - 1
        });
        let thread = &mut self.threads[slot];
        thread.start = thread.start.min(record.timestamp);
        if matches!(record.event, Event::ThreadEnd) {
            thread.end = Some(record.timestamp);
        }
    }

    pub(crate) fn threads(&self) -> &[ObservedThread] {
        &self.threads
    }
}

/// Everything the session needs from the flusher to finalize the file
pub(crate) struct FlusherOutput<W: Write> {
    pub writer: BufWriter<W>,
    pub events_written: usize,
    /// File position right after the last record
    pub events_end: usize,
    pub last_timestamp: Timestamp,
    pub threads: ThreadArena,
    /// Sync objects referenced by persisted events, first-reference order
    pub referenced_syncs: Vec<(SyncId, SyncKind)>,
    pub string_refs: HashSet<StringOffset>,
}

struct Flusher<W: Write> {
    shared: Arc<Shared>,
    rx: Receiver<EventRecord>,
    interval: Duration,
    out: FlusherOutput<W>,
    seen_syncs: HashSet<SyncId>,
    scratch: Vec<u8>,
}

/// Start the flusher thread. The sink must already hold the placeholder header.
pub(crate) fn spawn<W: Write + Seek + Send + 'static>(
    writer: BufWriter<W>,
    shared: Arc<Shared>,
    rx: Receiver<EventRecord>,
    interval: Duration,
) -> io::Result<JoinHandle<FlusherOutput<W>>> {
    let flusher = Flusher {
        shared,
        rx,
        interval,
        out: FlusherOutput {
            writer,
            events_written: 0,
            events_end: HEADER_SIZE,
            last_timestamp: Timestamp(0),
            threads: ThreadArena::default(),
            referenced_syncs: Vec::new(),
            string_refs: HashSet::new(),
        },
        seen_syncs: HashSet::new(),
        scratch: Vec::with_capacity(64),
    };
    thread::Builder::new().name("tview-flusher".into()).spawn(move || flusher.run())
}

impl<W: Write> Flusher<W> {
    fn run(mut self) -> FlusherOutput<W> {
        loop {
            if self.shared.state.is_closing() {
                // Producers are quiesced by now: whatever is queued is final
                while let Ok(record) = self.rx.try_recv() {
                    if let Err(err) = self.write(&record) {
                        self.shared.state.fail(format!("writing event record: {err}"));
                        break;
                    }
                }
                break;
            }

            match self.rx.recv_timeout(self.interval) {
                Ok(record) => {
                    if let Err(err) = self.write(&record) {
                        self.shared.state.fail(format!("writing event record: {err}"));
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(err) = self.out.writer.flush() {
                        self.shared.state.fail(format!("flushing trace: {err}"));
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!("Flusher exiting after {} events", self.out.events_written);
        self.out
    }

    fn write(&mut self, record: &EventRecord) -> io::Result<()> {
        self.scratch.clear();
        record.encode_into(&mut self.scratch);
        self.out.writer.write_all(&self.scratch)?;

        self.out.events_written += 1;
        self.out.events_end += self.scratch.len();
        self.out.last_timestamp = self.out.last_timestamp.max(record.timestamp);
        self.out.threads.observe(record);

        if let Some(object) = record.event.sync_object() {
            if self.seen_syncs.insert(object) {
                let kind = match record.event {
                    Event::MonitorWait { .. } | Event::MonitorNotify { .. } => SyncKind::Monitor,
                    _ => SyncKind::Mutex,
                };
                self.out.referenced_syncs.push((object, kind));
            }
        }
        self.out.string_refs.extend(record.event.string_refs().into_iter().flatten());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_arena_tracks_first_and_end() {
        let mut arena = ThreadArena::default();
        arena.observe(&EventRecord::new(Timestamp(5), ThreadId(2), Event::ThreadStart));
        arena.observe(&EventRecord::new(Timestamp(7), ThreadId(1), Event::SleepEnd));
        arena.observe(&EventRecord::new(Timestamp(9), ThreadId(2), Event::ThreadEnd));

        assert_eq!(
            arena.threads(),
            &[
                ObservedThread { id: ThreadId(2), start: Timestamp(5), end: Some(Timestamp(9)) },
                ObservedThread { id: ThreadId(1), start: Timestamp(7), end: None },
            ]
        );
    }
}
