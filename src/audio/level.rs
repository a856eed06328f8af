//! Microphone level for the orb display

use super::rms;

const DEFAULT_SMOOTHING: f32 = 0.3;
const NORMALIZE_GAIN: f32 = 10.0;

/// Exponentially smoothed RMS level, normalized to 0..=1
#[derive(Clone, Debug)]
pub struct AudioLevelMeter {
    smoothing: f32,
    smoothed: f32,
}

impl Default for AudioLevelMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioLevelMeter {
    pub fn new() -> Self {
        Self::with_smoothing(DEFAULT_SMOOTHING)
    }

    /// `smoothing` is the weight of the newest block (clamped to 0..=1)
    pub fn with_smoothing(smoothing: f32) -> Self {
        Self {
            smoothing: smoothing.clamp(0.0, 1.0),
            smoothed: 0.0,
        }
    }

    /// Feed one block and return the normalized level
    pub fn update(&mut self, samples: &[f32]) -> f32 {
        let amplitude = rms(samples);
        self.smoothed = self.smoothing * amplitude + (1.0 - self.smoothing) * self.smoothed;
        self.level()
    }

    /// Current normalized level
    pub fn level(&self) -> f32 {
        (self.smoothed * NORMALIZE_GAIN).min(1.0)
    }

    /// Raw smoothed amplitude
    pub fn amplitude(&self) -> f32 {
        self.smoothed
    }

    pub fn reset(&mut self) {
        self.smoothed = 0.0;
    }
}
