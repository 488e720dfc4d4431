//! mesh-sync - Master sync for mesh decks
//!
//! Keeps tempo and beat phase aligned across decks. At any time exactly one
//! source leads: a playing deck or the internal clock. Followers read the
//! published master tempo and beat distance from the control bus.
//!
//! The coordinator runs on the audio thread:
//!
//! ```ignore
//! let bus = Arc::new(ControlBus::with_queue_capacity(config.external_queue_capacity));
//! let mut sync = SyncCoordinator::new(Arc::clone(&bus), config.clone());
//! let (tx, mut rx) = command_channel(config.command_queue_capacity);
//!
//! // In the audio callback
//! sync.process(&mut rx, buffer_samples);
//! ```

pub mod config;
pub mod control;
pub mod deck;
pub mod error;
pub mod sync;
pub mod types;

pub use config::SyncConfig;
pub use control::{ControlBus, ControlHandle, ControlKey, ControlRef};
pub use deck::{DeckControls, DeckRateControl, RateControl};
pub use error::{SyncError, SyncResult};
pub use sync::{command_channel, SyncCommand, SyncCoordinator, SyncHandle, SyncSnapshot};
pub use types::{DeckId, SyncMode, SyncSource};
