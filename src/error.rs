//! Error types for the Neo assistant
//!
//! Every collaborator failure is converted into a `NeoError` at the adapter
//! boundary. The coordinator turns these into fallback text or status
//! messages; none of them is allowed to stop the event loop.

use thiserror::Error;

/// Neo application errors
#[derive(Error, Debug, Clone)]
pub enum NeoError {
    /// Audio device initialization or operation error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Model file missing or failed to load
    #[error("Model load error: {0}")]
    ModelLoadError(String),

    /// Speech recognition error
    #[error("Recognition error: {0}")]
    RecognitionError(String),

    /// Language model generation error
    #[error("Generation error: {0}")]
    GenerationError(String),

    /// Text-to-speech synthesis or playback error
    #[error("TTS error: {0}")]
    TTSError(String),

    /// A speak request arrived while another utterance was playing
    #[error("Speaker is busy")]
    SpeakerBusy,

    /// Action execution error
    #[error("Action error: {0}")]
    ActionError(String),

    /// A collaborator is not available on this system
    #[error("{0} unavailable")]
    Unavailable(String),

    /// Channel communication error
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// File system I/O error
    #[error("IO error: {0}")]
    IOError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for NeoError {
    fn from(e: std::io::Error) -> Self {
        NeoError::IOError(e.to_string())
    }
}

impl NeoError {
    /// Check if this error is recoverable
    ///
    /// Recoverable errors are expected to clear up on the next turn;
    /// the others need the user to fix the environment or restart.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Hardware/device errors may require user intervention
            NeoError::AudioDeviceError(_) => false,
            // Model errors require restarting
            NeoError::ModelLoadError(_) => false,
            NeoError::RecognitionError(_) => true,
            NeoError::GenerationError(_) => true,
            NeoError::TTSError(_) => true,
            NeoError::SpeakerBusy => true,
            NeoError::ActionError(_) => true,
            NeoError::Unavailable(_) => false,
            // Channel errors indicate internal issues
            NeoError::ChannelError(_) => false,
            NeoError::IOError(_) => false,
            NeoError::ConfigError(_) => false,
        }
    }

    /// Get a user-friendly description of the error
    pub fn user_message(&self) -> String {
        match self {
            NeoError::AudioDeviceError(_) => {
                "Audio device error. Please check your microphone/speakers.".to_string()
            }
            NeoError::ModelLoadError(_) => {
                "Failed to load AI model. Please verify model files are present.".to_string()
            }
            NeoError::RecognitionError(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            NeoError::GenerationError(_) => {
                "AI response generation failed. Please try again.".to_string()
            }
            NeoError::TTSError(_) => {
                "Text-to-speech failed. Response will be shown as text.".to_string()
            }
            NeoError::SpeakerBusy => "Still speaking. Your reply is queued.".to_string(),
            NeoError::ActionError(_) => {
                "I apologize, sir. I was unable to complete that action.".to_string()
            }
            NeoError::Unavailable(what) => format!("{} is not available on this system.", what),
            NeoError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            NeoError::IOError(_) => "File system error occurred.".to_string(),
            NeoError::ConfigError(_) => "Configuration error. Please check settings.".to_string(),
        }
    }
}

/// Result type alias for Neo operations
pub type Result<T> = std::result::Result<T, NeoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(NeoError::GenerationError("boom".into()).is_recoverable());
        assert!(NeoError::SpeakerBusy.is_recoverable());
        assert!(!NeoError::AudioDeviceError("no mic".into()).is_recoverable());
        assert!(!NeoError::Unavailable("Speech recognizer".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: NeoError = io.into();
        assert!(matches!(err, NeoError::IOError(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_unavailable_user_message_names_collaborator() {
        let err = NeoError::Unavailable("Language model".into());
        assert_eq!(err.to_string(), "Language model unavailable");
        assert!(err.user_message().starts_with("Language model"));
    }
}
