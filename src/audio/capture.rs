//! Microphone capture using cpal
//!
//! Blocks from the default input device are averaged to mono and sent over
//! a crossbeam channel. Stream errors are reported as `RecognitionFailed`.

use super::to_mono;
use crate::events::{CoordinatorEvent, EventSender};
use crate::{NeoError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::Sender;
use tracing::{error, info, warn};

/// An open input stream on the default device
///
/// cpal streams are not `Send` on every platform, so a capture is created,
/// used and dropped on the same thread.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| NeoError::AudioDeviceError("No input device available".into()))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let supported = device.default_input_config().map_err(|e| {
            NeoError::AudioDeviceError(format!("Failed to get input config: {}", e))
        })?;
        let config: StreamConfig = supported.into();

        info!(
            "Using input device {} ({}Hz, {} channel(s))",
            name, config.sample_rate.0, config.channels
        );

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Start streaming mono blocks into `audio_tx`
    pub fn start(&mut self, audio_tx: Sender<Vec<f32>>, events: EventSender) -> Result<()> {
        if self.stream.is_some() {
            warn!("Capture already running");
            return Ok(());
        }

        let channels = self.config.channels as usize;
        let err_fn = move |err: cpal::StreamError| {
            error!("Audio input stream error: {}", err);
            events.emit(CoordinatorEvent::RecognitionFailed(err.to_string()));
        };

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // A full channel means the consumer is behind; drop the block
                    let _ = audio_tx.try_send(to_mono(data, channels));
                },
                err_fn,
                None,
            )
            .map_err(|e| {
                NeoError::AudioDeviceError(format!("Failed to build input stream: {}", e))
            })?;

        stream.play().map_err(|e| {
            NeoError::AudioDeviceError(format!("Failed to start input stream: {}", e))
        })?;

        self.stream = Some(stream);
        info!("Audio capture started");
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            info!("Audio capture stopped");
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
