//! Instrumentation hooks
//!
//! A [`Recorder`] is what instrumented code holds. Every hook stamps the
//! event with the session clock before doing any interning, then queues
//! exactly one event.

use std::sync::Arc;

use super::registry::anonymous_sync_name;
use super::session::Shared;
use crate::domain::{CaptureError, Duration, StringOffset, SyncId, ThreadId, Timestamp};
use crate::format::{Event, SyncKind};

/// Cloneable handle onto a running [`CaptureSession`](super::CaptureSession)
#[derive(Clone)]
pub struct Recorder {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder").field("closing", &self.shared.state.is_closing()).finish()
    }
}

impl Recorder {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.shared.now()
    }

    pub fn record(&self, thread: ThreadId, event: Event, timestamp: Timestamp) -> Result<(), CaptureError> {
        self.shared.record(thread, event, timestamp)
    }

    pub fn intern(&self, text: &str) -> Result<StringOffset, CaptureError> {
        self.shared.intern(text)
    }

    /// Name a thread without recording an event
    pub fn name_thread(&self, thread: ThreadId, name: &str) -> Result<(), CaptureError> {
        let name = self.intern(name)?;
        self.shared.registry.name_thread(thread, name);
        Ok(())
    }

    /// Register a sync object under `name`. The first declaration wins.
    pub fn declare_sync(&self, object: SyncId, kind: SyncKind, name: &str) -> Result<(), CaptureError> {
        self.declare(object, kind, Some(name))
    }

    pub fn on_thread_start(&self, thread: ThreadId, name: &str) -> Result<(), CaptureError> {
        let now = self.now();
        self.name_thread(thread, name)?;
        self.record(thread, Event::ThreadStart, now)
    }

    pub fn on_thread_end(&self, thread: ThreadId) -> Result<(), CaptureError> {
        self.record(thread, Event::ThreadEnd, self.now())
    }

    pub fn on_lock_attempt(&self, thread: ThreadId, object: SyncId, name: &str) -> Result<(), CaptureError> {
        let now = self.now();
        self.declare(object, SyncKind::Mutex, Some(name))?;
        self.record(thread, Event::LockAttempt { object }, now)
    }

    pub fn on_lock_acquired(&self, thread: ThreadId, object: SyncId, name: &str) -> Result<(), CaptureError> {
        let now = self.now();
        self.declare(object, SyncKind::Mutex, Some(name))?;
        self.record(thread, Event::LockAcquired { object }, now)
    }

    pub fn on_unlock(&self, thread: ThreadId, object: SyncId, name: &str) -> Result<(), CaptureError> {
        let now = self.now();
        self.declare(object, SyncKind::Mutex, Some(name))?;
        self.record(thread, Event::Unlock { object }, now)
    }

    /// `timeout_ns == 0` waits without a timeout
    pub fn on_wait(&self, thread: ThreadId, object: SyncId, timeout_ns: u64) -> Result<(), CaptureError> {
        let now = self.now();
        self.declare(object, SyncKind::Monitor, None)?;
        let timeout = (timeout_ns > 0).then_some(Duration(timeout_ns));
        self.record(thread, Event::MonitorWait { object, timeout }, now)
    }

    pub fn on_notify(&self, thread: ThreadId, object: SyncId) -> Result<(), CaptureError> {
        let now = self.now();
        self.declare(object, SyncKind::Monitor, None)?;
        self.record(thread, Event::MonitorNotify { object }, now)
    }

    pub fn on_sleep(&self, thread: ThreadId, duration_ns: u64) -> Result<(), CaptureError> {
        self.record(thread, Event::SleepStart { duration: Duration(duration_ns) }, self.now())
    }

    pub fn on_sleep_end(&self, thread: ThreadId) -> Result<(), CaptureError> {
        self.record(thread, Event::SleepEnd, self.now())
    }

    pub fn on_io(&self, thread: ThreadId, operation: &str, target: &str) -> Result<(), CaptureError> {
        let now = self.now();
        let operation = self.intern(operation)?;
        let target = self.intern(target)?;
        self.record(thread, Event::IoStart { operation, target }, now)
    }

    pub fn on_io_end(&self, thread: ThreadId) -> Result<(), CaptureError> {
        self.record(thread, Event::IoEnd, self.now())
    }

    pub fn on_annotation(&self, thread: ThreadId, message: &str) -> Result<(), CaptureError> {
        let now = self.now();
        let message = self.intern(message)?;
        self.record(thread, Event::Annotation { message }, now)
    }

    fn declare(&self, object: SyncId, kind: SyncKind, name: Option<&str>) -> Result<(), CaptureError> {
        self.shared.registry.declare_sync(object, kind, || match name {
            Some(name) => self.intern(name),
            None => self.intern(&anonymous_sync_name(kind, object)),
        })
    }
}
