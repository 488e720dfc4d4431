//! Sync error types

use thiserror::Error;

use crate::control::ControlKey;
use crate::types::DeckId;

/// Errors surfaced to callers of the sync API
///
/// Anomalies inside the real-time paths (bad tempo, negative phase, failed
/// binds) are absorbed and logged instead; only caller mistakes end up here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Request named a deck that was never registered
    #[error("Deck not registered with sync: {0}")]
    UnknownDeck(DeckId),

    /// Control key has not been registered on the bus
    #[error("Control not registered: {0}")]
    UnknownControl(ControlKey),

    /// Configuration values are out of range
    #[error("Invalid sync config: {0}")]
    InvalidConfig(String),
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
