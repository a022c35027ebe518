//! Bounded MPMC event queue between producer threads and the flusher.
//!
//! Producers hold a clone of the receiver so that, under
//! [`OverflowPolicy::DropOldest`], they can evict the oldest queued event
//! themselves instead of waiting for the flusher. FIFO order is kept, so
//! each thread's surviving events stay in program order.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::config::OverflowPolicy;
use crate::format::EventRecord;

pub(crate) struct EventQueue {
    tx: Sender<EventRecord>,
    rx: Receiver<EventRecord>,
    policy: OverflowPolicy,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl EventQueue {
    /// A zero capacity would turn the channel into a rendezvous; it is raised to 1.
    pub(crate) fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx, policy, accepted: AtomicU64::new(0), dropped: AtomicU64::new(0) }
    }

    /// Receiving end for the flusher
    pub(crate) fn receiver(&self) -> Receiver<EventRecord> {
        self.rx.clone()
    }

    pub(crate) fn push(&self, record: EventRecord) {
        self.accepted.fetch_add(1, Ordering::Relaxed);

        match self.policy {
            OverflowPolicy::DropOldest => {
                let mut record = record;
                loop {
                    match self.tx.try_send(record) {
                        Ok(()) => return,
                        Err(TrySendError::Full(back)) => {
                            if self.rx.try_recv().is_ok() {
                                self.dropped.fetch_add(1, Ordering::Relaxed);
                            }
                            record = back;
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            self.dropped.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                    }
                }
            }
            OverflowPolicy::Block { timeout } => {
                if self.tx.send_timeout(record, timeout).is_err() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Events handed to `push` so far
    pub(crate) fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Events lost to overflow so far
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
