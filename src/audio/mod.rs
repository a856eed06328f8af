//! Microphone audio processing
//!
//! The level meter and the segmenter are plain sample processors and always
//! compiled. Device capture and resampling need the `whisper` feature.

#[cfg(feature = "whisper")]
pub mod capture;
pub mod level;
#[cfg(feature = "whisper")]
pub mod resampler;
pub mod segmenter;

#[cfg(feature = "whisper")]
pub use capture::AudioCapture;
pub use level::AudioLevelMeter;
#[cfg(feature = "whisper")]
pub use resampler::AudioResampler;
pub use segmenter::EnergySegmenter;

/// Root-mean-square energy of a block of samples
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Average interleaved frames down to one channel
pub fn to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
