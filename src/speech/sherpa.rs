//! Neural voice: VITS synthesis through sherpa-rs
//!
//! Audio is written to a temporary WAV file and handed to a command-line
//! player, which keeps playback cancellable like the other command voices.

use super::tts::{speakable_text, wait_or_kill, TtsBackend};
use crate::config::NeoConfig;
use crate::{NeoError, Result};
use parking_lot::Mutex;
use sherpa_rs::tts::{VitsTts, VitsTtsConfig};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const PLAYERS: &[&str] = &["aplay", "paplay", "afplay", "play"];

pub struct SherpaBackend {
    tts: Mutex<VitsTts>,
    speaker_id: i32,
    player: PathBuf,
}

impl SherpaBackend {
    /// Load the configured VITS model and find a WAV player
    pub fn load(config: &NeoConfig) -> Result<Self> {
        let locator = config.models.locator();
        let model = locator
            .resolve(&config.models.tts_model_file)
            .ok_or_else(|| {
                NeoError::ModelLoadError(format!("{} not found", config.models.tts_model_file))
            })?;
        let tokens = locator
            .resolve(&config.models.tts_tokens_file)
            .ok_or_else(|| {
                NeoError::ModelLoadError(format!("{} not found", config.models.tts_tokens_file))
            })?;

        let player = match &config.speech.player {
            Some(player) => which::which(player).ok(),
            None => PLAYERS.iter().find_map(|p| which::which(p).ok()),
        }
        .ok_or_else(|| NeoError::Unavailable("WAV player".to_string()))?;

        info!("Loading VITS voice from {}", model.display());

        let vits_config = VitsTtsConfig {
            model: model.to_string_lossy().into_owned(),
            tokens: tokens.to_string_lossy().into_owned(),
            length_scale: 1.0,
            ..Default::default()
        };

        Ok(Self {
            tts: Mutex::new(VitsTts::new(vits_config)),
            speaker_id: config.speech.speaker_id,
            player,
        })
    }

    fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| NeoError::TTSError(format!("Failed to create WAV: {}", e)))?;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| NeoError::TTSError(format!("Failed to write WAV: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| NeoError::TTSError(format!("Failed to finalize WAV: {}", e)))
    }
}

impl TtsBackend for SherpaBackend {
    fn name(&self) -> &str {
        "sherpa"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn say(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        let text = speakable_text(text);
        if text.is_empty() {
            return Ok(());
        }

        let audio = self
            .tts
            .lock()
            .create(&text, self.speaker_id, 1.0)
            .map_err(|e| NeoError::TTSError(format!("Synthesis failed: {}", e)))?;
        if cancel.is_cancelled() {
            return Ok(());
        }

        let file = tempfile::Builder::new()
            .prefix("neo-tts-")
            .suffix(".wav")
            .tempfile()?;
        Self::write_wav(file.path(), &audio.samples, audio.sample_rate as u32)?;
        debug!(
            "Synthesized {} samples at {} Hz",
            audio.samples.len(),
            audio.sample_rate
        );

        let child = Command::new(&self.player)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| NeoError::TTSError(format!("Failed to start player: {}", e)))?;

        wait_or_kill(child, cancel, "WAV player")
    }
}
