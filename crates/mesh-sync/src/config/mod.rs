//! Sync configuration
//!
//! Stored as YAML next to the rest of the mesh config. Every field has a
//! default, so partial files load fine.

mod io;
mod paths;

pub use paths::*;

use serde::{Deserialize, Serialize};

use crate::control::DEFAULT_EXTERNAL_QUEUE_CAPACITY;
use crate::error::{SyncError, SyncResult};
use crate::types::{DEFAULT_BPM, DEFAULT_SAMPLE_RATE};

/// Default capacity of the UI → audio command ring
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 64;

/// Sync configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Master tempo at startup; updated from the tempo slider on shutdown
    pub default_bpm: f64,
    /// Sample rate assumed until the audio backend reports one
    pub sample_rate: u32,
    /// Lowest value the tempo slider accepts
    pub rate_slider_min: f64,
    /// Highest value the tempo slider accepts
    pub rate_slider_max: f64,
    /// Capacity of the queue carrying control writes from other threads
    pub external_queue_capacity: usize,
    /// Capacity of the sync command ring
    pub command_queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_bpm: DEFAULT_BPM,
            sample_rate: DEFAULT_SAMPLE_RATE,
            rate_slider_min: 40.0,
            rate_slider_max: 200.0,
            external_queue_capacity: DEFAULT_EXTERNAL_QUEUE_CAPACITY,
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Check that every value is usable by the coordinator
    pub fn validate(&self) -> SyncResult<()> {
        if !(self.rate_slider_min.is_finite() && self.rate_slider_min > 0.0) {
            return Err(SyncError::InvalidConfig(format!(
                "rate_slider_min must be positive, got {}",
                self.rate_slider_min
            )));
        }
        if !(self.rate_slider_max.is_finite() && self.rate_slider_max >= self.rate_slider_min) {
            return Err(SyncError::InvalidConfig(format!(
                "rate_slider_max ({}) must be >= rate_slider_min ({})",
                self.rate_slider_max, self.rate_slider_min
            )));
        }
        if !(self.default_bpm >= self.rate_slider_min && self.default_bpm <= self.rate_slider_max)
        {
            return Err(SyncError::InvalidConfig(format!(
                "default_bpm {} outside slider range {}-{}",
                self.default_bpm, self.rate_slider_min, self.rate_slider_max
            )));
        }
        if self.sample_rate == 0 {
            return Err(SyncError::InvalidConfig("sample_rate must be non-zero".into()));
        }
        if self.external_queue_capacity == 0 || self.command_queue_capacity == 0 {
            return Err(SyncError::InvalidConfig("queue capacities must be non-zero".into()));
        }
        Ok(())
    }

    /// Clamp a tempo into the slider range; NaN lands on the slider minimum
    pub fn clamp_to_slider(&self, bpm: f64) -> f64 {
        if bpm.is_nan() {
            return self.rate_slider_min;
        }
        bpm.clamp(self.rate_slider_min, self.rate_slider_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_bpm, 124.0);
        assert_eq!(config.sample_rate, 44100);
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let config = SyncConfig {
            rate_slider_min: 150.0,
            rate_slider_max: 100.0,
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));

        let config = SyncConfig {
            default_bpm: 300.0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            default_bpm: f64::NAN,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            command_queue_capacity: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_to_slider() {
        let config = SyncConfig::default();
        assert_eq!(config.clamp_to_slider(20.0), 40.0);
        assert_eq!(config.clamp_to_slider(128.0), 128.0);
        assert_eq!(config.clamp_to_slider(500.0), 200.0);
        assert_eq!(config.clamp_to_slider(f64::NAN), 40.0);
    }
}
