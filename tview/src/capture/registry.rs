//! Live tables shared by producer threads while capturing.
//!
//! - [`Interner`]: the string table's write path. One mutex, held only for
//!   the duration of a single intern.
//! - [`Registry`]: sync objects (arena, slot assigned at first sight) and
//!   thread names. Separate locks from the interner and from the event
//!   queue, so queuing an event never waits on string interning.
//!
//! Both are frozen at `stop()`; afterwards interning fails with
//! `CaptureClosed`.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use log::debug;

use crate::domain::{CaptureError, StringOffset, SyncId, ThreadId};
use crate::format::{StringTableBuilder, SyncKind, SyncObjectInfo};

/// Concurrent front of a [`StringTableBuilder`]
#[derive(Debug)]
pub(crate) struct Interner {
    table: Mutex<Option<StringTableBuilder>>,
}

impl Interner {
    pub(crate) fn new() -> Self {
        Self { table: Mutex::new(Some(StringTableBuilder::new())) }
    }

    pub(crate) fn intern(&self, text: &str) -> Result<StringOffset, CaptureError> {
        let mut guard = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let table = guard.as_mut().ok_or(CaptureError::CaptureClosed)?;
        Ok(table.intern(text)?)
    }

    /// Take the table out; every later `intern` fails with `CaptureClosed`.
    pub(crate) fn close(&self) -> Result<StringTableBuilder, CaptureError> {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(CaptureError::CaptureClosed)
    }
}

#[derive(Debug, Default)]
struct SyncArena {
    slots: HashMap<SyncId, usize>,
    objects: Vec<SyncObjectInfo>,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    syncs: RwLock<SyncArena>,
    thread_names: Mutex<HashMap<ThreadId, StringOffset>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_declared(&self, id: SyncId) -> bool {
        self.syncs.read().unwrap_or_else(PoisonError::into_inner).slots.contains_key(&id)
    }

    /// Register a sync object on first sight. Later declarations are no-ops.
    ///
    /// `name` is only evaluated for objects not seen before, and outside the
    /// registry lock.
    pub(crate) fn declare_sync(
        &self,
        id: SyncId,
        kind: SyncKind,
        name: impl FnOnce() -> Result<StringOffset, CaptureError>,
    ) -> Result<(), CaptureError> {
        if self.is_declared(id) {
            return Ok(());
        }

        let name = name()?;
        let mut arena = self.syncs.write().unwrap_or_else(PoisonError::into_inner);
        if !arena.slots.contains_key(&id) {
            let slot = arena.objects.len();
            arena.objects.push(SyncObjectInfo { id, name, kind });
            arena.slots.insert(id, slot);
            debug!("Sync object {id} ({kind}) registered in slot {slot}");
        }
        Ok(())
    }

    pub(crate) fn name_thread(&self, thread: ThreadId, name: StringOffset) {
        self.thread_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(thread, name);
    }

    pub(crate) fn thread_name(&self, thread: ThreadId) -> Option<StringOffset> {
        self.thread_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&thread)
            .copied()
    }

    /// Declared sync objects in first-sight order
    pub(crate) fn sync_objects(&self) -> Vec<SyncObjectInfo> {
        self.syncs.read().unwrap_or_else(PoisonError::into_inner).objects.clone()
    }
}

/// Name given to sync objects that were never named by instrumentation
pub(crate) fn anonymous_sync_name(kind: SyncKind, id: SyncId) -> String {
    format!("{kind}@{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_concurrent_interning_is_deduplicated() {
        let interner = Arc::new(Interner::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let interner = Arc::clone(&interner);
                thread::spawn(move || {
                    (0..50).map(|i| interner.intern(&format!("lock-{}", i % 10)).unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<StringOffset>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for offsets in &results[1..] {
            assert_eq!(offsets, &results[0]);
        }
        let table = interner.close().unwrap();
        assert_eq!(table.len(), 10);
    }

    #[test]
    fn test_intern_after_close_fails() {
        let interner = Interner::new();
        interner.intern("before").unwrap();
        interner.close().unwrap();
        assert!(matches!(interner.intern("after"), Err(CaptureError::CaptureClosed)));
        assert!(matches!(interner.close(), Err(CaptureError::CaptureClosed)));
    }

    #[test]
    fn test_declare_sync_keeps_first_name_and_slot() {
        let registry = Registry::new();
        registry.declare_sync(SyncId(1), SyncKind::Mutex, || Ok(StringOffset(0))).unwrap();
        registry.declare_sync(SyncId(2), SyncKind::Monitor, || Ok(StringOffset(8))).unwrap();
        registry
            .declare_sync(SyncId(1), SyncKind::Monitor, || panic!("name must not be evaluated twice"))
            .unwrap();

        let objects = registry.sync_objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0], SyncObjectInfo { id: SyncId(1), name: StringOffset(0), kind: SyncKind::Mutex });
        assert_eq!(objects[1].id, SyncId(2));
    }

    #[test]
    fn test_anonymous_name() {
        assert_eq!(anonymous_sync_name(SyncKind::Monitor, SyncId(0x10)), "monitor@0x10");
    }
}
