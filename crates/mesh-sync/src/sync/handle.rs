//! Cross-thread access to the published sync values
//!
//! The UI reads master tempo and beat distance every frame and writes the
//! tempo slider, internal clock toggle and sample rate. Reads are plain atomic
//! loads; writes are stored immediately and the coordinator reacts to them
//! at the start of the next audio buffer.

use crate::control::{ControlBus, ControlHandle, ControlKey};
use crate::error::SyncResult;
use crate::types::MASTER_GROUP;

use super::coordinator::{
    MasterControls, MASTER_BEAT_DISTANCE, SAMPLE_RATE, SYNC_BPM, SYNC_MASTER, SYNC_SLIDER,
};

/// Handle to the `[Master]` sync controls, cheap to clone and `Send`
#[derive(Clone)]
pub struct SyncHandle {
    bpm: ControlHandle,
    beat_distance: ControlHandle,
    sample_rate: ControlHandle,
    internal_master: ControlHandle,
    rate_slider: ControlHandle,
}

impl SyncHandle {
    pub(crate) fn from_controls(bus: &ControlBus, master: &MasterControls) -> Self {
        Self {
            bpm: bus.handle_for(&master.bpm),
            beat_distance: bus.handle_for(&master.beat_distance),
            sample_rate: bus.handle_for(&master.sample_rate),
            internal_master: bus.handle_for(&master.internal_master),
            rate_slider: bus.handle_for(&master.rate_slider),
        }
    }

    /// Resolve the handle from a bus the coordinator has already registered on
    pub fn connect(bus: &ControlBus) -> SyncResult<Self> {
        let handle = |item: &str| bus.handle(&ControlKey::new(MASTER_GROUP, item));
        Ok(Self {
            bpm: handle(SYNC_BPM)?,
            beat_distance: handle(MASTER_BEAT_DISTANCE)?,
            sample_rate: handle(SAMPLE_RATE)?,
            internal_master: handle(SYNC_MASTER)?,
            rate_slider: handle(SYNC_SLIDER)?,
        })
    }

    pub fn master_bpm(&self) -> f64 {
        self.bpm.get()
    }

    /// Master beat phase, [0, 1)
    pub fn beat_distance(&self) -> f64 {
        self.beat_distance.get()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate.get()
    }

    pub fn rate_slider(&self) -> f64 {
        self.rate_slider.get()
    }

    pub fn internal_clock_enabled(&self) -> bool {
        self.internal_master.get_bool()
    }

    /// Override master tempo directly
    pub fn set_master_bpm(&self, bpm: f64) {
        self.bpm.set(bpm);
    }

    /// Move the tempo slider; drives master tempo while the internal clock leads
    pub fn set_rate_slider(&self, bpm: f64) {
        self.rate_slider.set(bpm);
    }

    /// Turn the internal clock on or off
    pub fn set_internal_clock(&self, enabled: bool) {
        self.internal_master.set_bool(enabled);
    }

    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.sample_rate.set(sample_rate as f64);
    }
}

impl super::SyncCoordinator {
    /// Handle for other threads
    pub fn handle(&self) -> SyncHandle {
        SyncHandle::from_controls(self.bus(), self.master_controls())
    }
}
