//! Speech input and output
//!
//! - Text-to-speech as an ordered chain of voice backends
//! - Speech-to-text using Whisper (feature `whisper`)

pub mod recognizer;
#[cfg(feature = "sherpa")]
pub mod sherpa;
pub mod tts;
#[cfg(feature = "whisper")]
pub mod whisper;

pub use recognizer::UnavailableRecognizer;
#[cfg(feature = "sherpa")]
pub use sherpa::SherpaBackend;
pub use tts::{speakable_text, CommandBackend, ConsoleBackend, SpeechOutput, TtsBackend};
#[cfg(feature = "whisper")]
pub use whisper::WhisperRecognizer;
