//! # tview - Concurrency Trace Capture and Timeline Reconstruction
//!
//! tview records what the threads of a program are doing (running, waiting
//! on a lock or monitor, blocked on I/O, sleeping) into a compact binary
//! trace, and turns that trace back into per-thread timelines that show
//! which thread waited on which object, and for how long.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Instrumented Application                    │
//! │          Recorder hooks: lock / wait / sleep / io / ...         │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ record(thread, event, timestamp)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Capture Pipeline                          │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  EventQueue  │──▶│   Flusher    │──▶│  .tview file │         │
//! │  │  (bounded)   │   │  (thread)    │   │  (sink)      │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │  Interner + Registry ── tables at stop() ─────┘                 │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ decode
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Timeline   │──▶│    Query     │──▶│    Export    │         │
//! │  │ Reconstructor│   │  (describe)  │   │ (trace.json) │         │
//! │  └──────┬───────┘   └──────────────┘   └──────────────┘         │
//! │         ▼                                                       │
//! │  ┌──────────────┐                                               │
//! │  │   Analysis   │                                               │
//! │  │ (contention) │                                               │
//! │  └──────────────┘                                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`format`]: The `.tview` binary format
//!   - Header, event records, thread / sync-object / string tables
//!   - Lossless encode / decode, recoverable-event scan for damaged files
//!
//! - [`capture`]: Recording sessions
//!   - `CaptureSession`: placeholder header, background flusher, finalize on `stop()` or drop
//!   - `Recorder`: cloneable instrumentation hooks
//!   - `CaptureConfig`: buffer size, overflow policy, flush interval
//!
//! - [`timeline`]: Per-thread state machine replay into `StateSegment`s
//!
//! - [`query`]: `describe()` a segment against the trace tables
//!
//! - [`analysis`]: Contention summary per sync object
//!
//! - [`export`]: Chrome Trace Event Format JSON for Perfetto / `chrome://tracing`
//!
//! - [`cli`]: Command-line argument parsing for the `tview` binary
//!
//! - [`domain`]: Core domain types (`ThreadId`, `SyncId`, `Timestamp`, ...) and errors
//!
//! ## Typical Usage
//!
//! ```no_run
//! use tview::capture::{CaptureConfig, CaptureSession};
//! use tview::domain::{SyncId, ThreadId};
//! use tview::format::read_trace_file;
//! use tview::timeline::reconstruct;
//!
//! # fn main() -> anyhow::Result<()> {
//! let session = CaptureSession::start_file(CaptureConfig::from_agent_args("output=app.tview")?)?;
//! let recorder = session.recorder();
//!
//! recorder.on_thread_start(ThreadId(1), "main")?;
//! recorder.on_lock_attempt(ThreadId(1), SyncId(0x10), "state")?;
//! recorder.on_lock_acquired(ThreadId(1), SyncId(0x10), "state")?;
//! recorder.on_thread_end(ThreadId(1))?;
//! session.stop()?;
//!
//! let trace = read_trace_file("app.tview")?;
//! let timeline = reconstruct(&trace);
//! for segment in timeline.ordered_segments() {
//!     println!("{} {} {}..{}", segment.thread, segment.state, segment.start, segment.end);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! - **Trace**: one recording session, one file
//! - **Event**: a timestamped, typed occurrence on one thread
//! - **State segment**: a derived interval during which a thread held one state
//! - **Interning**: every string is stored once and referenced by byte offset
//! - **Sync object**: anything lock- or monitor-like that events refer to

pub mod analysis;
pub mod capture;
pub mod cli;
pub mod domain;
pub mod export;
pub mod format;
pub mod query;
pub mod timeline;
