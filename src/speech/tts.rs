//! Text-to-speech fallback chain
//!
//! `SpeechOutput` keeps the available voice backends in configured order.
//! Each utterance plays on its own thread; if a backend fails the next one
//! is tried, and the console backend at the end never fails. Only one
//! utterance plays at a time.

use crate::collaborators::Speaker;
use crate::config::{NeoConfig, SpeechConfig, TtsBackendKind};
use crate::events::{CoordinatorEvent, EventSender};
use crate::{NeoError, Result};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A single voice
///
/// `say` blocks until the utterance has been played or `cancel` fires.
pub trait TtsBackend: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn say(&self, text: &str, cancel: &CancellationToken) -> Result<()>;
}

/// Clean text up for synthesizers that read symbols literally
pub fn speakable_text(text: &str) -> String {
    let replacements = [
        ("&", " and "),
        ("%", " percent"),
        ("@", " at "),
        ("+", " plus "),
        ("=", " equals "),
        ("e.g.", "for example"),
        ("i.e.", "that is"),
        ("etc.", "etcetera"),
    ];

    let mut result = text.to_string();
    for (from, to) in replacements {
        result = result.replace(from, to);
    }

    result
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,!?;:'-\"".contains(*c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wait for a child process, killing it if `cancel` fires
pub(crate) fn wait_or_kill(mut child: Child, cancel: &CancellationToken, what: &str) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            debug!("{} interrupted", what);
            return Ok(());
        }
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(()),
            Ok(Some(status)) => {
                return Err(NeoError::TTSError(format!("{} exited with {}", what, status)))
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(NeoError::TTSError(format!("{} wait failed: {}", what, e))),
        }
    }
}

/// Command-line synthesizer such as espeak-ng or `say`
///
/// The text is passed as the last argument.
pub struct CommandBackend {
    name: String,
    program: Option<PathBuf>,
    args: Vec<String>,
}

impl CommandBackend {
    /// Locate `program` on `PATH`; a missing program leaves the backend unavailable
    pub fn new(name: &str, program: &str, args: Vec<String>) -> Self {
        let program = which::which(program).ok();
        Self {
            name: name.to_string(),
            program,
            args,
        }
    }

    /// The stock synthesizer for `kind`, if it is a command-line one
    pub fn for_kind(kind: TtsBackendKind, speech: &SpeechConfig) -> Option<Self> {
        let rate = speech.rate_wpm.to_string();
        match kind {
            TtsBackendKind::EspeakNg => {
                Some(Self::new("espeak-ng", "espeak-ng", vec!["-s".into(), rate]))
            }
            TtsBackendKind::Espeak => Some(Self::new("espeak", "espeak", vec!["-s".into(), rate])),
            TtsBackendKind::SpdSay => Some(Self::new("spd-say", "spd-say", vec!["-w".into()])),
            TtsBackendKind::Say => Some(Self::new("say", "say", vec!["-r".into(), rate])),
            TtsBackendKind::Sherpa | TtsBackendKind::Console => None,
        }
    }
}

impl TtsBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.program.is_some()
    }

    fn say(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| NeoError::Unavailable(self.name.clone()))?;

        let child = Command::new(program)
            .args(&self.args)
            .arg(speakable_text(text))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| NeoError::TTSError(format!("Failed to run {}: {}", self.name, e)))?;

        wait_or_kill(child, cancel, &self.name)
    }
}

/// Prints the line and pretends to speak for a while
pub struct ConsoleBackend {
    label: String,
    per_char: Duration,
}

impl ConsoleBackend {
    pub fn new(label: &str, ms_per_char: u64) -> Self {
        Self {
            label: label.to_string(),
            per_char: Duration::from_millis(ms_per_char),
        }
    }
}

impl TtsBackend for ConsoleBackend {
    fn name(&self) -> &str {
        "console"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn say(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}: {}", self.label, text);
        let _ = stdout.flush();
        drop(stdout);

        let duration = self.per_char * text.chars().count() as u32;
        let start = Instant::now();
        while !cancel.is_cancelled() {
            let remaining = duration.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(POLL_INTERVAL));
        }
        Ok(())
    }
}

fn play_through(
    backends: &[Box<dyn TtsBackend>],
    text: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    let mut last_error = None;
    for backend in backends {
        if cancel.is_cancelled() {
            break;
        }
        match backend.say(text, cancel) {
            Ok(()) => return Ok(backend.name().to_string()),
            Err(e) => {
                warn!("Voice {} failed, trying next: {}", backend.name(), e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| NeoError::TTSError("playback cancelled".into())))
}

/// The speaker used by the assistant
pub struct SpeechOutput {
    backends: Arc<Vec<Box<dyn TtsBackend>>>,
    busy: Arc<AtomicBool>,
    cancel: CancellationToken,
    playback: Option<JoinHandle<()>>,
}

impl SpeechOutput {
    /// Keep the available backends of `candidates`, in order
    pub fn new(candidates: Vec<Box<dyn TtsBackend>>) -> Self {
        let backends: Vec<_> = candidates
            .into_iter()
            .filter(|b| {
                let available = b.is_available();
                if !available {
                    debug!("Voice {} not available", b.name());
                }
                available
            })
            .collect();

        match backends.first() {
            Some(first) => info!(
                "Voice output: {} ({} fallback(s))",
                first.name(),
                backends.len() - 1
            ),
            None => warn!("No voice backend available"),
        }

        Self {
            backends: Arc::new(backends),
            busy: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            playback: None,
        }
    }

    /// Build the chain listed in `speech.backends`
    pub fn from_config(config: &NeoConfig) -> Self {
        let mut candidates: Vec<Box<dyn TtsBackend>> = Vec::new();
        for kind in &config.speech.backends {
            match kind {
                TtsBackendKind::Console => candidates.push(Box::new(ConsoleBackend::new(
                    &config.assistant_name.to_uppercase(),
                    config.speech.console_ms_per_char,
                ))),
                TtsBackendKind::Sherpa => {
                    #[cfg(feature = "sherpa")]
                    match super::sherpa::SherpaBackend::load(config) {
                        Ok(backend) => candidates.push(Box::new(backend)),
                        Err(e) => warn!("Neural voice unavailable: {}", e),
                    }
                    #[cfg(not(feature = "sherpa"))]
                    debug!("Neural voice not compiled in");
                }
                other => {
                    if let Some(backend) = CommandBackend::for_kind(*other, &config.speech) {
                        candidates.push(Box::new(backend));
                    }
                }
            }
        }
        Self::new(candidates)
    }

    /// Name of the preferred available backend
    pub fn active_backend(&self) -> Option<&str> {
        self.backends.first().map(|b| b.name())
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

impl Speaker for SpeechOutput {
    fn name(&self) -> &str {
        self.active_backend().unwrap_or("none")
    }

    fn is_available(&self) -> bool {
        !self.backends.is_empty()
    }

    fn speak(&mut self, text: &str, events: &EventSender) -> Result<()> {
        if self.backends.is_empty() || self.cancel.is_cancelled() {
            return Err(NeoError::Unavailable("Voice output".into()));
        }
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(NeoError::SpeakerBusy);
        }
        if let Some(previous) = self.playback.take() {
            let _ = previous.join();
        }

        let backends = Arc::clone(&self.backends);
        let busy = Arc::clone(&self.busy);
        let cancel = self.cancel.child_token();
        let events = events.clone();
        let text = text.to_string();

        let handle = thread::Builder::new()
            .name("neo-tts".into())
            .spawn(move || {
                events.emit(CoordinatorEvent::SpeechStarted(text.clone()));

                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| play_through(&backends, &text, &cancel)));
                match outcome {
                    Ok(Ok(voice)) => debug!("Spoke {} chars with {}", text.len(), voice),
                    Ok(Err(e)) => error!("Every voice backend failed: {}", e),
                    Err(_) => error!("Voice backend panicked"),
                }

                // Clear before notifying so the next speak is accepted
                busy.store(false, Ordering::SeqCst);
                events.emit(CoordinatorEvent::SpeechFinished);
            })
            .map_err(|e| {
                self.busy.store(false, Ordering::SeqCst);
                NeoError::TTSError(format!("Failed to start playback thread: {}", e))
            })?;

        self.playback = Some(handle);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.playback.take() {
            if handle.join().is_err() {
                warn!("Playback thread panicked");
            }
        }
        info!("Voice output stopped");
    }
}
