//! Tunable control bus
//!
//! Named scalar values shared between the audio thread and the rest of the
//! application:
//! - `ControlBus`: registry keyed by `(group, item)`, plus the queue that
//!   carries writes from other threads to the audio thread
//! - `ControlRef` / `ControlHandle`: cached audio-thread access and
//!   cross-thread write access
//! - `Connections`: which reaction runs when a given control changes

mod bus;
mod connections;
mod value;

pub use bus::*;
pub use connections::*;
pub use value::*;
