//! Control keys and lock-free scalar values

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Name of a control: `(group, item)`, e.g. `("[Master]", "sync_bpm")`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlKey {
    group: String,
    item: String,
}

impl ControlKey {
    /// Create a key from its group and item names
    pub fn new(group: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            item: item.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn item(&self) -> &str {
        &self.item
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.group, self.item)
    }
}

/// Dense index of a registered control
///
/// Keys are resolved to ids once at registration; the audio thread only
/// ever compares ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(pub(crate) u32);

impl ControlId {
    /// Position of the control in the bus table
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Which side of the engine wrote a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written on the audio thread
    Engine,
    /// Written by another thread (UI, MIDI, scripting)
    External,
}

/// A single scalar control value
///
/// Stored as the bit pattern of an `f64` in an `AtomicU64`, so readers never
/// observe a torn value. Relaxed ordering is enough: cross-thread change
/// notifications travel through the bus queue, which provides the
/// happens-before edge.
#[derive(Debug)]
pub struct ControlValue {
    bits: AtomicU64,
}

impl ControlValue {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Read as a toggle (any non-zero value is "on")
    #[inline]
    pub fn get_bool(&self) -> bool {
        self.get() != 0.0
    }

    #[inline]
    pub fn set_bool(&self, on: bool) {
        self.set(if on { 1.0 } else { 0.0 });
    }
}

impl Default for ControlValue {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// A resolved control: its id plus a shared handle to the value
///
/// Cached by audio-thread code so reads and writes never touch the bus
/// table. Writing through a `ControlRef` does not notify anyone; use
/// `SyncCoordinator::publish` for writes that should trigger reactions.
#[derive(Debug, Clone)]
pub struct ControlRef {
    id: ControlId,
    value: Arc<ControlValue>,
}

impl ControlRef {
    pub(crate) fn new(id: ControlId, value: Arc<ControlValue>) -> Self {
        Self { id, value }
    }

    #[inline]
    pub fn id(&self) -> ControlId {
        self.id
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.value.get()
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.value.set(value);
    }

    #[inline]
    pub fn get_bool(&self) -> bool {
        self.value.get_bool()
    }

    #[inline]
    pub fn set_bool(&self, on: bool) {
        self.value.set_bool(on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_value_roundtrips_f64_bits() {
        let value = ControlValue::new(124.0);
        assert_eq!(value.get(), 124.0);

        value.set(-0.25);
        assert_eq!(value.get(), -0.25);

        value.set(20671.875);
        assert_eq!(value.get(), 20671.875);
    }

    #[test]
    fn test_control_value_toggle() {
        let value = ControlValue::default();
        assert!(!value.get_bool());

        value.set_bool(true);
        assert!(value.get_bool());
        assert_eq!(value.get(), 1.0);

        // Any non-zero value counts as on
        value.set(0.3);
        assert!(value.get_bool());
    }

    #[test]
    fn test_control_key_display() {
        let key = ControlKey::new("[Master]", "sync_bpm");
        assert_eq!(key.to_string(), "[Master],sync_bpm");
        assert_eq!(key.group(), "[Master]");
        assert_eq!(key.item(), "sync_bpm");
    }
}
