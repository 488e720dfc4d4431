//! Common types for mesh-sync
//!
//! Deck identity, per-deck sync modes and the tagged sync source that says
//! who currently holds timing authority.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sample rate assumed until the audio backend reports the real one
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Master tempo used before any deck or config provides one
pub const DEFAULT_BPM: f64 = 124.0;

/// Samples per beat used whenever the computed value is not strictly positive
/// (roughly 124 BPM at 44.1kHz)
pub const FALLBACK_SAMPLES_PER_BEAT: f64 = 21338.0;

/// Control group for the coordinator's own published values
pub const MASTER_GROUP: &str = "[Master]";

/// Identifier of a playback deck (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeckId(pub usize);

impl DeckId {
    /// Create a new deck ID
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the deck number (1-based, for display)
    pub fn display_number(&self) -> usize {
        self.0 + 1
    }

    /// Control group the deck publishes its live values under, e.g. `[Channel1]`
    pub fn group(&self) -> String {
        format!("[Channel{}]", self.display_number())
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deck {}", self.display_number())
    }
}

/// A deck's role in sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum SyncMode {
    /// Not participating in sync
    #[default]
    None = 0,
    /// Following the master tempo and phase
    Follower = 1,
    /// Defining tempo and phase for everyone else
    Master = 2,
}

impl SyncMode {
    /// Convert from the raw representation stored in atomics
    pub fn from_u8(val: u8) -> Self {
        match val {
            1 => SyncMode::Follower,
            2 => SyncMode::Master,
            _ => SyncMode::None,
        }
    }

    /// Whether the deck takes part in sync at all (Follower or Master)
    #[inline]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SyncMode::None)
    }
}

/// Who currently holds timing authority
///
/// Exactly one variant holds at any time. When `Deck(id)` is active the
/// deck's controller reports a loaded track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncSource {
    /// Nobody; followers have nothing to follow
    #[default]
    None,
    /// The coordinator's virtual clock
    Internal,
    /// A playing deck
    Deck(DeckId),
}

impl SyncSource {
    /// The authoritative deck, if a deck holds authority
    pub fn deck(&self) -> Option<DeckId> {
        match self {
            SyncSource::Deck(deck) => Some(*deck),
            _ => None,
        }
    }

    /// Check if the internal clock is the authority
    pub fn is_internal(&self) -> bool {
        matches!(self, SyncSource::Internal)
    }

    /// Check if nobody holds authority
    pub fn is_none(&self) -> bool {
        matches!(self, SyncSource::None)
    }
}

impl fmt::Display for SyncSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncSource::None => write!(f, "none"),
            SyncSource::Internal => write!(f, "internal clock"),
            SyncSource::Deck(deck) => write!(f, "{}", deck),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_group_names() {
        assert_eq!(DeckId::new(0).group(), "[Channel1]");
        assert_eq!(DeckId::new(3).group(), "[Channel4]");
        assert_eq!(DeckId::new(1).to_string(), "deck 2");
    }

    #[test]
    fn test_sync_mode_from_u8() {
        assert_eq!(SyncMode::from_u8(0), SyncMode::None);
        assert_eq!(SyncMode::from_u8(1), SyncMode::Follower);
        assert_eq!(SyncMode::from_u8(2), SyncMode::Master);
        // Garbage decodes to the safe default
        assert_eq!(SyncMode::from_u8(200), SyncMode::None);

        assert!(!SyncMode::None.is_enabled());
        assert!(SyncMode::Follower.is_enabled());
        assert!(SyncMode::Master.is_enabled());
    }

    #[test]
    fn test_sync_source_accessors() {
        assert!(SyncSource::default().is_none());
        assert!(SyncSource::Internal.is_internal());
        assert_eq!(SyncSource::Deck(DeckId(2)).deck(), Some(DeckId(2)));
        assert_eq!(SyncSource::Internal.deck(), None);
    }
}
