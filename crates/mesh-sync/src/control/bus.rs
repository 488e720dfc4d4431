//! Control bus: registry of named values shared across threads
//!
//! Registration happens at engine setup (any thread, takes a write lock).
//! After that the audio thread works exclusively with cached [`ControlRef`]s
//! and the lock-free change queue, so nothing on the hot path locks.
//!
//! Writes from other threads go through a [`ControlHandle`]: the value is
//! stored immediately and a [`ControlChange`] is queued. The audio thread
//! drains the queue at the start of each buffer and runs the same reaction
//! logic it runs for its own writes.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crossbeam::queue::ArrayQueue;

use super::{ControlId, ControlKey, ControlRef, ControlValue};
use crate::error::{SyncError, SyncResult};

/// Default capacity of the external change queue
///
/// A UI dragging a tempo slider produces one write per frame (~60/s);
/// a buffer period is a few milliseconds, so 256 leaves a lot of headroom.
pub const DEFAULT_EXTERNAL_QUEUE_CAPACITY: usize = 256;

/// A value written by another thread, waiting for the audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlChange {
    pub control: ControlId,
    pub value: f64,
}

#[derive(Default)]
struct ControlTable {
    ids: HashMap<ControlKey, ControlId>,
    keys: Vec<ControlKey>,
    values: Vec<Arc<ControlValue>>,
}

/// Shared registry of control values
pub struct ControlBus {
    table: RwLock<ControlTable>,
    pending: Arc<ArrayQueue<ControlChange>>,
}

impl ControlBus {
    /// Create a bus with the default external queue capacity
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_EXTERNAL_QUEUE_CAPACITY)
    }

    /// Create a bus whose external change queue holds `capacity` entries
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self {
            table: RwLock::new(ControlTable::default()),
            pending: Arc::new(ArrayQueue::new(capacity.max(1))),
        }
    }

    /// Register a control, or resolve it if it already exists
    ///
    /// `initial` is only applied when the control is created; an existing
    /// control keeps its current value.
    pub fn register(&self, key: ControlKey, initial: f64) -> ControlRef {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(&id) = table.ids.get(&key) {
            return ControlRef::new(id, Arc::clone(&table.values[id.index()]));
        }

        let id = ControlId(table.values.len() as u32);
        let value = Arc::new(ControlValue::new(initial));
        log::debug!("ControlBus: registered {} as {:?}", key, id);
        table.ids.insert(key.clone(), id);
        table.keys.push(key);
        table.values.push(Arc::clone(&value));
        ControlRef::new(id, value)
    }

    /// Resolve an existing control without creating it
    pub fn lookup(&self, key: &ControlKey) -> SyncResult<ControlRef> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .ids
            .get(key)
            .map(|&id| ControlRef::new(id, Arc::clone(&table.values[id.index()])))
            .ok_or_else(|| SyncError::UnknownControl(key.clone()))
    }

    /// Key a control was registered under
    pub fn key(&self, id: ControlId) -> Option<ControlKey> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.keys.get(id.index()).cloned()
    }

    /// Current value of a control by key
    pub fn get(&self, key: &ControlKey) -> Option<f64> {
        self.lookup(key).ok().map(|control| control.get())
    }

    /// Get a write handle for use from a non-audio thread
    pub fn handle(&self, key: &ControlKey) -> SyncResult<ControlHandle> {
        let control = self.lookup(key)?;
        Ok(self.handle_for(&control))
    }

    /// Write handle for a control already resolved on this bus
    pub fn handle_for(&self, control: &ControlRef) -> ControlHandle {
        ControlHandle {
            control: control.clone(),
            pending: Arc::clone(&self.pending),
        }
    }

    /// Number of registered controls
    pub fn len(&self) -> usize {
        self.table
            .read()
            .map(|table| table.values.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pop the oldest pending external change (audio thread)
    #[inline]
    pub fn pop_external(&self) -> Option<ControlChange> {
        self.pending.pop()
    }

    /// Number of external changes waiting for the audio thread
    pub fn pending_external(&self) -> usize {
        self.pending.len()
    }
}

impl Default for ControlBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Write access to one control from outside the audio thread
///
/// Cloning is cheap - shared state is behind Arcs.
#[derive(Clone)]
pub struct ControlHandle {
    control: ControlRef,
    pending: Arc<ArrayQueue<ControlChange>>,
}

impl ControlHandle {
    pub fn id(&self) -> ControlId {
        self.control.id()
    }

    /// Read the current value (lock-free)
    pub fn get(&self) -> f64 {
        self.control.get()
    }

    pub fn get_bool(&self) -> bool {
        self.control.get_bool()
    }

    /// Store a value and queue it for the audio thread's reactions
    ///
    /// Never blocks. If the queue is full the value is still stored but the
    /// audio thread will not react to this particular write.
    pub fn set(&self, value: f64) {
        self.control.set(value);
        let change = ControlChange {
            control: self.control.id(),
            value,
        };
        if self.pending.push(change).is_err() {
            log::warn!(
                "ControlHandle: external change queue full, dropping notification for {:?}",
                self.control.id()
            );
        }
    }

    pub fn set_bool(&self, on: bool) {
        self.set(if on { 1.0 } else { 0.0 });
    }
}
