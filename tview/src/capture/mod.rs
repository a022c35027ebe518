//! Event capture pipeline
//!
//! - `config`: [`CaptureConfig`], agent-style argument parsing
//! - `queue`: bounded event queue with the overflow policy
//! - `registry`: string interner, sync-object and thread-name registries
//! - `flusher`: background thread writing records to the sink
//! - `session`: [`CaptureSession`] start / stop / finalize
//! - `recorder`: [`Recorder`] instrumentation hooks

pub mod config;
mod flusher;
mod queue;
mod recorder;
mod registry;
mod session;

pub use config::{
    CaptureConfig, OverflowPolicy, DEFAULT_BLOCK_TIMEOUT, DEFAULT_BUFFER_CAPACITY, DEFAULT_FLUSH_INTERVAL,
};
pub use recorder::Recorder;
pub use session::{CaptureSession, CaptureSummary};
