//! Observer registration for control changes
//!
//! A connection ties a control to a reaction slot `S` (a small `Copy` enum
//! naming the handler). Dispatch snapshots the matching slots into a
//! fixed-size array before running them, so handlers are free to connect
//! and disconnect while a change is being delivered.

use super::ControlId;

/// Maximum number of slots a single control can notify per change
pub const MAX_LISTENERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Connection<S> {
    control: ControlId,
    slot: S,
}

/// Table of `(control, slot)` connections
#[derive(Debug, Clone)]
pub struct Connections<S> {
    entries: Vec<Connection<S>>,
}

impl<S: Copy + Eq> Connections<S> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-allocate so connecting on the audio thread never reallocates
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Connect `slot` to changes of `control`
    ///
    /// Returns false if the connection already existed.
    pub fn connect(&mut self, control: ControlId, slot: S) -> bool {
        if self.is_connected(control, slot) {
            return false;
        }
        self.entries.push(Connection { control, slot });
        true
    }

    /// Remove a connection. Returns false if it did not exist.
    pub fn disconnect(&mut self, control: ControlId, slot: S) -> bool {
        match self
            .entries
            .iter()
            .position(|c| c.control == control && c.slot == slot)
        {
            Some(idx) => {
                self.entries.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self, control: ControlId, slot: S) -> bool {
        self.entries
            .iter()
            .any(|c| c.control == control && c.slot == slot)
    }

    /// Snapshot the slots listening to `control`
    pub fn listeners(&self, control: ControlId) -> Listeners<S> {
        let mut listeners = Listeners {
            slots: [None; MAX_LISTENERS],
            len: 0,
            pos: 0,
        };
        for connection in self.entries.iter().filter(|c| c.control == control) {
            if listeners.len == MAX_LISTENERS {
                log::error!(
                    "Connections: more than {} listeners on {:?}, dropping the rest",
                    MAX_LISTENERS,
                    control
                );
                break;
            }
            listeners.slots[listeners.len] = Some(connection.slot);
            listeners.len += 1;
        }
        listeners
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Copy + Eq> Default for Connections<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned snapshot of the slots to notify for one change
#[derive(Debug, Clone, Copy)]
pub struct Listeners<S> {
    slots: [Option<S>; MAX_LISTENERS],
    len: usize,
    pos: usize,
}

impl<S: Copy> Iterator for Listeners<S> {
    type Item = S;

    fn next(&mut self) -> Option<S> {
        if self.pos >= self.len {
            return None;
        }
        let slot = self.slots[self.pos];
        self.pos += 1;
        slot
    }
}
