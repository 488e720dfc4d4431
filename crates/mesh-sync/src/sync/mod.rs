//! Master sync
//!
//! - `SyncCoordinator`: election of the timing authority and republishing of
//!   master tempo and beat distance (audio thread)
//! - `InternalClock`: beat phase accumulator used when no deck leads
//! - `SyncCommand` / `command_channel`: requests from the UI thread
//! - `SyncHandle`: cross-thread reads and writes of the master controls

mod clock;
mod command;
mod coordinator;
mod handle;
mod registry;

pub use clock::*;
pub use command::*;
pub use coordinator::*;
pub use handle::*;
pub use registry::*;
