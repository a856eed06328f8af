//! Streaming mono resampler for microphone audio

use crate::{NeoError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

const CHUNK_FRAMES: usize = 1024;

/// Converts device-rate mono audio to the recognizer rate
///
/// Input arrives in arbitrary block sizes; samples are buffered until a full
/// resampler chunk is available. Equal rates pass straight through.
pub struct AudioResampler {
    resampler: Option<SincFixedIn<f32>>,
    pending: Vec<f32>,
    input_rate: u32,
    output_rate: u32,
}

impl AudioResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(NeoError::ConfigError(
                "Sample rates must be greater than 0".into(),
            ));
        }

        let resampler = if input_rate == output_rate {
            None
        } else {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let ratio = output_rate as f64 / input_rate as f64;
            let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_FRAMES, 1)
                .map_err(|e| {
                    NeoError::AudioDeviceError(format!("Failed to create resampler: {}", e))
                })?;
            Some(resampler)
        };

        debug!("Resampler: {} Hz -> {} Hz", input_rate, output_rate);

        Ok(Self {
            resampler,
            pending: Vec::new(),
            input_rate,
            output_rate,
        })
    }

    /// Feed mono samples; returns whatever output is ready
    pub fn process(&mut self, mono: &[f32]) -> Result<Vec<f32>> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(mono.to_vec());
        };

        self.pending.extend_from_slice(mono);
        let mut output = Vec::new();

        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let chunk: Vec<f32> = self.pending.drain(..needed).collect();
            let out = resampler
                .process(&[chunk], None)
                .map_err(|e| NeoError::AudioDeviceError(format!("Resampling failed: {}", e)))?;
            if let Some(channel) = out.into_iter().next() {
                output.extend(channel);
            }
        }

        Ok(output)
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_rejected() {
        assert!(AudioResampler::new(0, 16_000).is_err());
    }

    #[test]
    fn test_same_rate_passthrough() {
        let mut resampler = AudioResampler::new(16_000, 16_000).unwrap();
        assert_eq!(resampler.process(&[0.1, 0.2]).unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn test_downsample_length() {
        let mut resampler = AudioResampler::new(48_000, 16_000).unwrap();
        let mut total = 0;
        for _ in 0..48 {
            total += resampler.process(&[0.0; 1000]).unwrap().len();
        }
        // one second in, roughly a third out minus what is still buffered
        assert!(total > 14_000 && total <= 16_000, "got {}", total);
    }
}
