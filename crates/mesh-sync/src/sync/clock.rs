//! Internal virtual clock
//!
//! Phase accumulator that keeps a beat going when no deck holds timing
//! authority. Positions are in frames; one beat is `samples_per_beat` frames.

use crate::types::FALLBACK_SAMPLES_PER_BEAT;

/// Subtractions tried before finishing a wrap with a single remainder
///
/// Ordinary tempo jumps need a few hundred at most. Extreme master tempos
/// (a handful of frames per beat) can need far more.
const MAX_WRAP_ITERATIONS: u32 = 4096;

/// Frames per beat for a tempo, clamped to the fallback when not positive
fn samples_per_beat_for(bpm: f64, sample_rate: u32) -> f64 {
    let samples_per_beat = sample_rate as f64 * 60.0 / bpm;
    if samples_per_beat.is_finite() && samples_per_beat > 0.0 {
        samples_per_beat
    } else {
        log::error!(
            "InternalClock: invalid samples per beat {} (bpm {}, sample rate {}), using {}",
            samples_per_beat,
            bpm,
            sample_rate,
            FALLBACK_SAMPLES_PER_BEAT
        );
        FALLBACK_SAMPLES_PER_BEAT
    }
}

/// Beat phase accumulator for the internal clock
#[derive(Debug, Clone)]
pub struct InternalClock {
    sample_rate: u32,
    samples_per_beat: f64,
    /// Frames into the current beat, always in [0, samples_per_beat)
    position: f64,
}

impl InternalClock {
    pub fn new(bpm: f64, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples_per_beat: samples_per_beat_for(bpm, sample_rate),
            position: 0.0,
        }
    }

    #[inline]
    pub fn samples_per_beat(&self) -> f64 {
        self.samples_per_beat
    }

    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Recompute the beat length for a new master tempo
    pub fn set_tempo(&mut self, bpm: f64) {
        self.samples_per_beat = samples_per_beat_for(bpm, self.sample_rate);
        self.wrap();
    }

    /// Change sample rate, keeping the current beat fraction
    pub fn set_sample_rate(&mut self, sample_rate: u32, bpm: f64) {
        let fraction = self.position / self.samples_per_beat;
        self.sample_rate = sample_rate;
        self.samples_per_beat = samples_per_beat_for(bpm, sample_rate);
        self.position = fraction * self.samples_per_beat;
        self.wrap();
    }

    /// Jump to a normalized beat position
    pub fn set_beat_distance(&mut self, beat_distance: f64) {
        if beat_distance < 0.0 {
            log::debug!(
                "InternalClock: negative beat distance {}, clamping to 0",
                beat_distance
            );
        }
        self.position = beat_distance.max(0.0) * self.samples_per_beat;
        self.wrap();
    }

    /// Advance by one audio buffer and return the new beat distance
    ///
    /// `buffer_samples` counts interleaved stereo samples, so the clock moves
    /// by half of it in frames.
    pub fn advance(&mut self, buffer_samples: usize) -> f64 {
        self.position += buffer_samples as f64 / 2.0;
        self.wrap();
        self.beat_distance()
    }

    /// Current position as a fraction of a beat, in [0, 1)
    pub fn beat_distance(&self) -> f64 {
        if self.position < 0.0 {
            log::error!(
                "InternalClock: negative position {}, reporting 0",
                self.position
            );
            return 0.0;
        }
        self.position / self.samples_per_beat
    }

    /// Bring the position back into [0, samples_per_beat)
    fn wrap(&mut self) {
        if !self.position.is_finite() || self.position < 0.0 {
            log::error!("InternalClock: position {} out of range, resetting", self.position);
            self.position = 0.0;
            return;
        }

        let mut iterations = 0;
        while self.position >= self.samples_per_beat {
            self.position -= self.samples_per_beat;
            iterations += 1;
            if iterations > MAX_WRAP_ITERATIONS {
                log::warn!(
                    "InternalClock: position {} still past {} frames/beat after {} beats, using remainder",
                    self.position,
                    self.samples_per_beat,
                    MAX_WRAP_ITERATIONS
                );
                self.position = self.position.rem_euclid(self.samples_per_beat);
                // rem_euclid can round up to the divisor
                if self.position >= self.samples_per_beat {
                    self.position = 0.0;
                }
                return;
            }
        }
    }
}
