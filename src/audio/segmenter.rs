//! Utterance segmentation by RMS energy
//!
//! Blocks above the energy threshold open or extend a segment. A run of
//! quiet audio at least `min_silence_ms` long closes it. Segments with less
//! than `min_speech_ms` of voiced audio are dropped as noise, and a segment
//! that reaches `max_segment_secs` is cut and emitted as is.

use super::rms;
use crate::config::RecognizerConfig;
use tracing::{debug, info};

pub struct EnergySegmenter {
    threshold: f32,
    min_silence_samples: usize,
    min_speech_samples: usize,
    max_samples: usize,
    buffer: Vec<f32>,
    in_speech: bool,
    silence_run: usize,
    voiced: usize,
}

impl EnergySegmenter {
    pub fn new(config: &RecognizerConfig) -> Self {
        let per_ms = config.sample_rate as usize / 1000;
        let max_samples = (config.max_segment_secs.max(0.1) * config.sample_rate as f32) as usize;

        info!(
            "Segmenter: threshold={}, min_silence={}ms, min_speech={}ms, max={}s",
            config.energy_threshold,
            config.min_silence_ms,
            config.min_speech_ms,
            config.max_segment_secs
        );

        Self {
            threshold: config.energy_threshold,
            min_silence_samples: config.min_silence_ms as usize * per_ms,
            min_speech_samples: config.min_speech_ms as usize * per_ms,
            max_samples,
            buffer: Vec::new(),
            in_speech: false,
            silence_run: 0,
            voiced: 0,
        }
    }

    /// Feed a block of mono samples; returns a finished utterance if any
    pub fn push(&mut self, block: &[f32]) -> Option<Vec<f32>> {
        if block.is_empty() {
            return None;
        }

        if rms(block) > self.threshold {
            if !self.in_speech {
                self.in_speech = true;
                self.buffer.clear();
                self.voiced = 0;
            }
            self.silence_run = 0;
            self.voiced += block.len();
            self.buffer.extend_from_slice(block);

            if self.buffer.len() >= self.max_samples {
                debug!("Segment reached maximum length");
                return self.finish();
            }
        } else if self.in_speech {
            // Trailing silence stays in the segment
            self.silence_run += block.len();
            self.buffer.extend_from_slice(block);

            if self.silence_run >= self.min_silence_samples {
                return self.finish();
            }
        }

        None
    }

    pub fn is_in_speech(&self) -> bool {
        self.in_speech
    }

    /// Drop any partial segment
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_speech = false;
        self.silence_run = 0;
        self.voiced = 0;
    }

    fn finish(&mut self) -> Option<Vec<f32>> {
        let voiced = self.voiced;
        self.in_speech = false;
        self.silence_run = 0;
        self.voiced = 0;
        let samples = std::mem::take(&mut self.buffer);

        if voiced >= self.min_speech_samples {
            debug!("Segment complete: {} samples", samples.len());
            Some(samples)
        } else {
            debug!("Discarding {} voiced samples as noise", voiced);
            None
        }
    }
}
