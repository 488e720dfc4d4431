//! Ordered deck registry
//!
//! Election walks decks in registration order, so this is a Vec rather
//! than a map. Deck counts are tiny (4 in mesh-player); linear lookup is fine.

use std::sync::Arc;

use crate::deck::{DeckControls, RateControl};
use crate::types::{DeckId, SyncMode};

/// A registered deck: its rate controller and the live values it publishes
#[derive(Clone)]
pub struct DeckEntry {
    pub controller: Arc<dyn RateControl>,
    pub controls: DeckControls,
}

impl DeckEntry {
    #[inline]
    pub fn deck(&self) -> DeckId {
        self.controller.deck()
    }

    #[inline]
    pub fn sync_mode(&self) -> SyncMode {
        self.controller.sync_mode()
    }

    /// Playing and taking part in sync
    #[inline]
    pub fn is_playing_sync(&self) -> bool {
        self.sync_mode().is_enabled() && self.controls.is_playing()
    }
}

/// Decks known to the coordinator, in registration order
#[derive(Clone, Default)]
pub struct DeckRegistry {
    entries: Vec<DeckEntry>,
}

impl DeckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a deck, or replace it in place if already registered
    ///
    /// Returns the replaced entry.
    pub fn insert(&mut self, entry: DeckEntry) -> Option<DeckEntry> {
        let deck = entry.deck();
        match self.entries.iter_mut().find(|e| e.deck() == deck) {
            Some(existing) => Some(std::mem::replace(existing, entry)),
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn get(&self, deck: DeckId) -> Option<&DeckEntry> {
        self.entries.iter().find(|e| e.deck() == deck)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeckEntry> {
        self.entries.iter()
    }

    /// Number of decks in Follower or Master mode that are playing
    pub fn playing_sync_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_playing_sync()).count()
    }
}
