//! Stand-in recognizer for builds or machines without speech input

use crate::collaborators::SpeechRecognizer;
use crate::events::EventSender;
use crate::{NeoError, Result};
use tracing::{info, warn};

/// Recognizer that never hears anything
///
/// `start` always fails so the coordinator reports recognition as
/// unavailable. Typed input keeps working; toggling listening only changes
/// the display.
pub struct UnavailableRecognizer {
    reason: String,
}

impl UnavailableRecognizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl SpeechRecognizer for UnavailableRecognizer {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn start(&mut self, _events: EventSender) -> Result<()> {
        info!("Speech recognition unavailable: {}", self.reason);
        Err(NeoError::Unavailable(format!("Speech recognizer ({})", self.reason)))
    }

    fn stop(&mut self) {}

    fn set_active(&mut self, active: bool) {
        if active {
            warn!("Listening enabled but no recognizer is running ({})", self.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_reports_unavailable() {
        let mut recognizer = UnavailableRecognizer::new("not compiled in");
        let (events, rx) = EventSender::channel();
        let err = recognizer.start(events).unwrap_err();
        assert!(matches!(err, NeoError::Unavailable(_)));
        assert!(err.to_string().contains("not compiled in"));
        assert!(rx.try_recv().is_err());
        recognizer.set_active(true);
        recognizer.stop();
        assert_eq!(recognizer.reason(), "not compiled in");
    }
}
