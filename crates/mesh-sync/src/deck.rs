//! Deck-side sync contract
//!
//! A deck's rate controller is owned by the playback engine, not by sync.
//! The coordinator only needs to read its identity, sync mode, file BPM and
//! whether a track is loaded (the [`RateControl`] trait), plus the live
//! values the deck publishes on the control bus ([`DeckControls`]).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::control::{ControlBus, ControlKey, ControlRef};
use crate::types::{DeckId, SyncMode};

/// Bus item: playback rate multiplier actually applied by the engine
pub const RATE_ENGINE: &str = "rate_engine";
/// Bus item: the deck's current effective tempo
pub const BPM: &str = "bpm";
/// Bus item: normalized position within the current beat, [0, 1)
pub const BEAT_DISTANCE: &str = "beat_distance";
/// Bus item: play/pause flag
pub const PLAY: &str = "play";

/// What the sync coordinator needs from a deck's rate controller
///
/// Implementations are shared between the audio thread and the UI, so all
/// methods take `&self`; mode changes must be visible to both.
pub trait RateControl: Send + Sync {
    /// Which deck this controller drives
    fn deck(&self) -> DeckId;

    /// Control group the deck publishes under
    fn group(&self) -> String {
        self.deck().group()
    }

    fn sync_mode(&self) -> SyncMode;

    fn set_sync_mode(&self, mode: SyncMode);

    /// Tempo of the loaded track at rate 1.0
    fn file_bpm(&self) -> f64;

    /// Whether a track buffer is loaded and playable
    fn has_loaded_buffer(&self) -> bool;
}

/// The live values a deck publishes on the bus
#[derive(Debug, Clone)]
pub struct DeckControls {
    pub rate_engine: ControlRef,
    pub bpm: ControlRef,
    pub beat_distance: ControlRef,
    pub play: ControlRef,
}

impl DeckControls {
    /// Register (or resolve) the deck's controls under `group`
    pub fn register(bus: &ControlBus, group: &str) -> Self {
        Self {
            rate_engine: bus.register(ControlKey::new(group, RATE_ENGINE), 1.0),
            bpm: bus.register(ControlKey::new(group, BPM), 0.0),
            beat_distance: bus.register(ControlKey::new(group, BEAT_DISTANCE), 0.0),
            play: bus.register(ControlKey::new(group, PLAY), 0.0),
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.play.get_bool()
    }
}

/// Lock-free rate controller state for a deck
///
/// A ready-made [`RateControl`] for decks that don't carry their own. The
/// playback engine writes track metadata when loading; sync reads and
/// updates the mode.
pub struct DeckRateControl {
    deck: DeckId,
    /// Sync mode: 0=None, 1=Follower, 2=Master
    mode: AtomicU8,
    /// File BPM as f64 bits
    file_bpm: AtomicU64,
    loaded: AtomicBool,
}

impl DeckRateControl {
    /// Create state for an empty deck
    pub fn new(deck: DeckId) -> Self {
        Self {
            deck,
            mode: AtomicU8::new(SyncMode::None as u8),
            file_bpm: AtomicU64::new(0.0f64.to_bits()),
            loaded: AtomicBool::new(false),
        }
    }

    /// Mark a track as loaded with the given file BPM
    pub fn load(&self, file_bpm: f64) {
        self.file_bpm.store(file_bpm.to_bits(), Ordering::Relaxed);
        self.loaded.store(true, Ordering::Relaxed);
    }

    /// Mark the deck as empty
    pub fn unload(&self) {
        self.loaded.store(false, Ordering::Relaxed);
        self.file_bpm.store(0.0f64.to_bits(), Ordering::Relaxed);
    }
}

impl RateControl for DeckRateControl {
    fn deck(&self) -> DeckId {
        self.deck
    }

    fn sync_mode(&self) -> SyncMode {
        SyncMode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    fn set_sync_mode(&self, mode: SyncMode) {
        self.mode.store(mode as u8, Ordering::Relaxed);
    }

    fn file_bpm(&self) -> f64 {
        f64::from_bits(self.file_bpm.load(Ordering::Relaxed))
    }

    fn has_loaded_buffer(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_rate_control_defaults() {
        let rate = DeckRateControl::new(DeckId(1));
        assert_eq!(rate.deck(), DeckId(1));
        assert_eq!(rate.group(), "[Channel2]");
        assert_eq!(rate.sync_mode(), SyncMode::None);
        assert!(!rate.has_loaded_buffer());
        assert_eq!(rate.file_bpm(), 0.0);
    }

    #[test]
    fn test_load_and_unload() {
        let rate = DeckRateControl::new(DeckId(0));
        rate.load(174.0);
        assert!(rate.has_loaded_buffer());
        assert_eq!(rate.file_bpm(), 174.0);

        rate.set_sync_mode(SyncMode::Master);
        rate.unload();
        assert!(!rate.has_loaded_buffer());
        // Mode belongs to the deck, not the track
        assert_eq!(rate.sync_mode(), SyncMode::Master);
    }

    #[test]
    fn test_deck_controls_register_under_group() {
        let bus = ControlBus::new();
        let controls = DeckControls::register(&bus, "[Channel1]");

        assert_eq!(controls.rate_engine.get(), 1.0);
        assert!(!controls.is_playing());
        assert_eq!(bus.len(), 4);

        let play = bus.lookup(&ControlKey::new("[Channel1]", PLAY)).unwrap();
        assert_eq!(play.id(), controls.play.id());

        // Registering again resolves the same controls
        let again = DeckControls::register(&bus, "[Channel1]");
        assert_eq!(again.bpm.id(), controls.bpm.id());
        assert_eq!(bus.len(), 4);
    }
}
