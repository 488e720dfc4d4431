//! Sync commands from the UI thread
//!
//! Mode requests and play-state changes come from UI and MIDI handlers but
//! must run on the audio thread, where the coordinator lives. They travel
//! over an `rtrb` ring: pushing and popping never block.
//!
//! ```ignore
//! // At startup
//! let (mut tx, mut rx) = command_channel(config.command_queue_capacity);
//!
//! // UI thread
//! tx.push(SyncCommand::RequestSync { deck: DeckId(0) });
//!
//! // Audio thread, once per buffer
//! sync.process(&mut rx, buffer_samples);
//! ```

use crate::error::SyncResult;
use crate::types::{DeckId, SyncMode};

use super::SyncCoordinator;

/// Commands sent to the sync coordinator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncCommand {
    /// Deck asks for a specific sync mode
    RequestSyncMode { deck: DeckId, mode: SyncMode },
    /// Sync button pressed; the coordinator picks Master or Follower
    RequestSync { deck: DeckId },
    /// Deck started or stopped playing
    SetDeckPlaying { deck: DeckId, playing: bool },
    /// Deck's rate slider moved while in sync
    SetRateSlider { deck: DeckId, bpm: f64 },
}

/// Create a sync command channel
///
/// Returns `(Producer, Consumer)`: the producer goes to the UI thread, the
/// consumer to the audio thread.
pub fn command_channel(
    capacity: usize,
) -> (rtrb::Producer<SyncCommand>, rtrb::Consumer<SyncCommand>) {
    rtrb::RingBuffer::new(capacity.max(1))
}

impl SyncCoordinator {
    /// Apply a single command
    pub fn apply_command(&mut self, command: SyncCommand) -> SyncResult<()> {
        match command {
            SyncCommand::RequestSyncMode { deck, mode } => self.request_sync_mode(deck, mode),
            SyncCommand::RequestSync { deck } => self.request_sync(deck),
            SyncCommand::SetDeckPlaying { deck, playing } => {
                self.on_deck_playing_changed(deck, playing)
            }
            SyncCommand::SetRateSlider { deck, bpm } => self.set_rate_slider(deck, bpm),
        }
    }

    /// Drain and apply all pending commands (audio thread)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<SyncCommand>) {
        while let Ok(command) = rx.pop() {
            if let Err(e) = self.apply_command(command) {
                log::warn!("SyncCoordinator: dropped {:?}: {}", command, e);
            }
        }
    }

    /// Per-buffer entry point: commands, then external control writes, then
    /// the internal clock tick
    pub fn process(&mut self, rx: &mut rtrb::Consumer<SyncCommand>, buffer_samples: usize) {
        self.process_commands(rx);
        self.process_external_changes();
        self.advance(buffer_samples);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SyncConfig;
    use crate::control::ControlBus;
    use crate::deck::DeckRateControl;
    use crate::types::SyncSource;

    fn coordinator(decks: usize) -> SyncCoordinator {
        let mut sync = SyncCoordinator::new(Arc::new(ControlBus::new()), SyncConfig::default());
        for i in 0..decks {
            let rate = Arc::new(DeckRateControl::new(DeckId(i)));
            rate.load(124.0);
            sync.add_deck(rate);
        }
        sync
    }

    #[test]
    fn test_command_channel_creation() {
        let (mut tx, mut rx) = command_channel(4);

        tx.push(SyncCommand::RequestSync { deck: DeckId(0) }).unwrap();

        let command = rx.pop().unwrap();
        assert_eq!(command, SyncCommand::RequestSync { deck: DeckId(0) });
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_channel_is_bounded() {
        let (mut tx, _rx) = command_channel(2);
        let command = SyncCommand::SetDeckPlaying {
            deck: DeckId(0),
            playing: true,
        };
        assert!(tx.push(command).is_ok());
        assert!(tx.push(command).is_ok());
        assert!(tx.push(command).is_err());
    }

    #[test]
    fn test_process_commands_applies_in_order() {
        let mut sync = coordinator(2);
        let (mut tx, mut rx) = command_channel(16);

        tx.push(SyncCommand::RequestSync { deck: DeckId(0) }).unwrap();
        tx.push(SyncCommand::SetDeckPlaying {
            deck: DeckId(0),
            playing: true,
        })
        .unwrap();
        tx.push(SyncCommand::RequestSyncMode {
            deck: DeckId(1),
            mode: SyncMode::Follower,
        })
        .unwrap();
        tx.push(SyncCommand::SetDeckPlaying {
            deck: DeckId(1),
            playing: true,
        })
        .unwrap();

        sync.process_commands(&mut rx);

        assert_eq!(sync.sync_source(), SyncSource::Internal);
        assert_eq!(sync.playing_sync_deck_count(), 2);
    }

    #[test]
    fn test_bad_command_does_not_stop_the_queue() {
        let mut sync = coordinator(1);
        let (mut tx, mut rx) = command_channel(8);

        tx.push(SyncCommand::RequestSync { deck: DeckId(7) }).unwrap();
        tx.push(SyncCommand::SetRateSlider {
            deck: DeckId(0),
            bpm: 132.0,
        })
        .unwrap();

        sync.process_commands(&mut rx);

        assert_eq!(sync.master_bpm(), 132.0);
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_process_ticks_internal_clock() {
        let mut sync = coordinator(0);
        let (_tx, mut rx) = command_channel(8);
        sync.activate_internal_clock();

        sync.process(&mut rx, 1024);

        let expected = 512.0 / sync.samples_per_beat();
        assert!((sync.master_beat_distance() - expected).abs() < 1e-12);
    }
}
