//! Contracts between the coordinator and the outside world
//!
//! The coordinator only knows these traits. Concrete engines (Whisper,
//! mistral.rs, espeak, the terminal) live in their own modules and are
//! wired together in `setup`.
//!
//! Outbound notifications always go through an `EventSender` so they are
//! handled on the coordinator thread.

use crate::events::EventSender;
use crate::state::SessionState;
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Speech-to-text engine
pub trait SpeechRecognizer: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Start the audio stream; recognized text is sent as `Recognized`
    fn start(&mut self, events: EventSender) -> Result<()>;

    /// Stop the audio stream and join its threads
    fn stop(&mut self);

    /// Enable or disable recognition without closing the stream
    fn set_active(&mut self, active: bool);
}

/// Text-to-speech engine
pub trait Speaker: Send {
    fn name(&self) -> &str;

    /// Whether any voice backend is usable
    fn is_available(&self) -> bool;

    /// Speak `text` without blocking
    ///
    /// Implementations send `SpeechStarted` and then exactly one
    /// `SpeechFinished`. A call while an utterance is playing fails with
    /// `NeoError::SpeakerBusy`.
    fn speak(&mut self, text: &str, events: &EventSender) -> Result<()>;

    /// Stop playback and join playback threads
    fn shutdown(&mut self);
}

/// Text generation backend
///
/// `generate` blocks and is always called from a worker thread. `cancel`
/// is advisory: backends that can stop early should check it, others may
/// ignore it since late results are discarded anyway.
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<String>;
}

/// Runs system actions for action commands
///
/// Always returns text to show or log; failures are reported in the text.
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, command: &str) -> String;
}

/// Global hotkey source; each activation sends `ToggleListening`
pub trait HotkeyListener: Send {
    fn start(&mut self, events: EventSender) -> Result<()>;

    fn stop(&mut self);
}

/// Orb / status display
pub trait StatusDisplay: Send {
    fn set_state(&mut self, state: SessionState);

    /// Microphone level in 0..=1
    fn set_audio_level(&mut self, level: f32);

    fn set_status(&mut self, text: &str);
}

/// Everything the coordinator talks to
pub struct Collaborators {
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub speaker: Box<dyn Speaker>,
    pub model: Arc<dyn LanguageModel>,
    pub executor: Arc<dyn ActionExecutor>,
    pub hotkey: Option<Box<dyn HotkeyListener>>,
    pub display: Box<dyn StatusDisplay>,
}
