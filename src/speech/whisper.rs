//! Speech recognition with Whisper
//!
//! Two threads per running recognizer:
//! - capture: owns the cpal stream (not `Send`) and parks until cancelled
//! - listener: resamples to 16 kHz, meters the level, segments utterances
//!   and transcribes them
//!
//! While inactive the listener keeps draining audio so nothing stale is
//! transcribed when listening resumes.

use crate::audio::{AudioCapture, AudioLevelMeter, AudioResampler, EnergySegmenter};
use crate::collaborators::SpeechRecognizer;
use crate::config::{NeoConfig, RecognizerConfig};
use crate::events::{CoordinatorEvent, EventSender};
use crate::{NeoError, Result};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

const WHISPER_SAMPLE_RATE: u32 = 16_000;
const LEVEL_INTERVAL: Duration = Duration::from_millis(50);
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Loaded Whisper model
pub struct WhisperEngine {
    context: WhisperContext,
    n_threads: i32,
    language: Option<String>,
}

impl WhisperEngine {
    pub fn load(config: &NeoConfig) -> Result<Self> {
        let path = config
            .models
            .locator()
            .resolve(&config.models.whisper_file)
            .ok_or_else(|| {
                NeoError::ModelLoadError(format!("{} not found", config.models.whisper_file))
            })?;

        info!("Loading Whisper model from {}", path.display());

        let path_str = path
            .to_str()
            .ok_or_else(|| NeoError::ModelLoadError("Invalid model path".to_string()))?;
        let context = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| {
                NeoError::ModelLoadError(format!("Failed to load Whisper model: {:?}", e))
            })?;

        Ok(Self {
            context,
            n_threads: config.recognizer.n_threads,
            language: config.recognizer.language.clone(),
        })
    }

    /// Transcribe 16 kHz mono samples
    pub fn transcribe(&self, samples: &[f32]) -> Result<String> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.n_threads);
        params.set_translate(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        if let Some(lang) = &self.language {
            params.set_language(Some(lang));
        }

        let mut state = self.context.create_state().map_err(|e| {
            NeoError::RecognitionError(format!("Failed to create state: {:?}", e))
        })?;
        state
            .full(params, samples)
            .map_err(|e| NeoError::RecognitionError(format!("Transcription failed: {:?}", e)))?;

        let segments = state.full_n_segments().map_err(|e| {
            NeoError::RecognitionError(format!("Failed to get segments: {:?}", e))
        })?;

        let mut text = String::new();
        for i in 0..segments {
            let segment = state.full_get_segment_text(i).map_err(|e| {
                NeoError::RecognitionError(format!("Failed to get segment text: {:?}", e))
            })?;
            text.push_str(&segment);
        }

        Ok(clean_transcript(&text))
    }
}

/// Strip Whisper's non-speech markers such as `[BLANK_AUDIO]` or `(music)`
fn clean_transcript(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Microphone recognizer backed by Whisper
pub struct WhisperRecognizer {
    engine: Arc<WhisperEngine>,
    config: RecognizerConfig,
    active: Arc<AtomicBool>,
    cancel: CancellationToken,
    threads: Vec<JoinHandle<()>>,
}

impl WhisperRecognizer {
    pub fn load(config: &NeoConfig) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(WhisperEngine::load(config)?),
            config: config.recognizer.clone(),
            active: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            threads: Vec::new(),
        })
    }

    fn spawn_capture(
        &self,
        audio_tx: crossbeam_channel::Sender<Vec<f32>>,
        events: EventSender,
    ) -> Result<(JoinHandle<()>, u32)> {
        let (ready_tx, ready_rx) = bounded::<Result<u32>>(1);
        let cancel = self.cancel.clone();

        let handle = thread::Builder::new()
            .name("neo-capture".into())
            .spawn(move || {
                let opened = AudioCapture::open().and_then(|mut capture| {
                    capture.start(audio_tx, events)?;
                    Ok(capture)
                });
                let capture = match opened {
                    Ok(capture) => {
                        let _ = ready_tx.send(Ok(capture.sample_rate()));
                        capture
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while !cancel.is_cancelled() {
                    thread::sleep(Duration::from_millis(50));
                }
                drop(capture);
            })
            .map_err(|e| NeoError::AudioDeviceError(format!("Failed to spawn capture: {}", e)))?;

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(rate)) => Ok((handle, rate)),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(NeoError::AudioDeviceError(
                "Audio device did not start in time".to_string(),
            )),
        }
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn name(&self) -> &str {
        "whisper"
    }

    fn start(&mut self, events: EventSender) -> Result<()> {
        if !self.threads.is_empty() {
            warn!("Recognizer already started");
            return Ok(());
        }

        let (audio_tx, audio_rx) = bounded::<Vec<f32>>(64);
        let (capture, device_rate) = self.spawn_capture(audio_tx, events.clone())?;
        self.threads.push(capture);

        let mut resampler = AudioResampler::new(device_rate, WHISPER_SAMPLE_RATE)?;
        let mut segmenter = EnergySegmenter::new(&RecognizerConfig {
            sample_rate: WHISPER_SAMPLE_RATE,
            ..self.config.clone()
        });
        let mut meter = AudioLevelMeter::new();
        let engine = Arc::clone(&self.engine);
        let active = Arc::clone(&self.active);
        let cancel = self.cancel.clone();

        let listener = thread::Builder::new()
            .name("neo-listener".into())
            .spawn(move || {
                let mut last_level = Instant::now();
                let mut was_active = false;

                while !cancel.is_cancelled() {
                    let block = match audio_rx.recv_timeout(Duration::from_millis(100)) {
                        Ok(block) => block,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => {
                            if !cancel.is_cancelled() {
                                events.emit(CoordinatorEvent::RecognitionFailed(
                                    "audio stream closed".to_string(),
                                ));
                            }
                            break;
                        }
                    };

                    if last_level.elapsed() >= LEVEL_INTERVAL {
                        events.emit(CoordinatorEvent::AudioLevel(meter.update(&block)));
                        last_level = Instant::now();
                    }

                    let is_active = active.load(Ordering::SeqCst);
                    if !is_active {
                        if was_active {
                            segmenter.reset();
                            resampler.reset();
                        }
                        was_active = false;
                        continue;
                    }
                    was_active = true;

                    let samples = match resampler.process(&block) {
                        Ok(samples) => samples,
                        Err(e) => {
                            warn!("Dropping audio block: {}", e);
                            continue;
                        }
                    };
                    let Some(utterance) = segmenter.push(&samples) else {
                        continue;
                    };

                    match engine.transcribe(&utterance) {
                        Ok(text) if !text.is_empty() => {
                            debug!("Recognized: {}", text);
                            // Playback may have started while transcribing
                            if active.load(Ordering::SeqCst) {
                                events.emit(CoordinatorEvent::Recognized(text));
                            }
                        }
                        Ok(_) => debug!("Empty transcription"),
                        Err(e) => error!("Transcription failed: {}", e),
                    }
                }
                debug!("Listener thread exiting");
            })
            .map_err(|e| {
                self.cancel.cancel();
                NeoError::RecognitionError(format!("Failed to spawn listener: {}", e))
            })?;
        self.threads.push(listener);

        info!("Whisper recognizer started ({} Hz device)", device_rate);
        Ok(())
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("Recognizer thread panicked");
            }
        }
        info!("Whisper recognizer stopped");
    }

    fn set_active(&mut self, active: bool) {
        debug!("Recognition {}", if active { "active" } else { "suspended" });
        self.active.store(active, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_transcript() {
        assert_eq!(clean_transcript(" [BLANK_AUDIO] "), "");
        assert_eq!(clean_transcript(" Open the browser. (music)"), "Open the browser.");
        assert_eq!(clean_transcript("hello   there"), "hello there");
    }
}
