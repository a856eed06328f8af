//! Events marshaled onto the coordinator thread
//!
//! Collaborators run on their own threads and never touch coordinator state.
//! Everything they have to say arrives here as a `CoordinatorEvent` and is
//! handled in order by the single event loop.

use crate::{NeoError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;
use tracing::debug;

/// Identity of a generation request
///
/// Ids increase monotonically, so a completion can be matched against the
/// request that is currently pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Notifications delivered to the coordinator
#[derive(Clone, Debug, PartialEq)]
pub enum CoordinatorEvent {
    /// Speech recognizer produced text
    Recognized(String),
    /// Text input box submitted a line
    Submitted(String),
    /// A generation worker finished
    GenerationComplete { id: RequestId, response: String },
    /// The action executor returned
    ActionComplete { result: String },
    /// Playback of an utterance began
    SpeechStarted(String),
    /// Playback of the current utterance ended
    SpeechFinished,
    /// Microphone level in 0..=1
    AudioLevel(f32),
    /// The recognition stream died
    RecognitionFailed(String),
    /// Hotkey or front end asked to flip listening
    ToggleListening,
    /// Collaborator status line for the display
    Status(String),
    /// Stop the event loop
    Shutdown,
}

/// Cloneable sender used by collaborators to reach the coordinator
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: Sender<CoordinatorEvent>,
}

impl EventSender {
    /// Create a connected sender/receiver pair
    ///
    /// The channel is unbounded: the coordinator may emit into its own
    /// queue from the loop thread, which must never block.
    pub fn channel() -> (Self, Receiver<CoordinatorEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    /// Send an event, failing if the coordinator is gone
    pub fn send(&self, event: CoordinatorEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|e| NeoError::ChannelError(format!("Failed to send event: {}", e)))
    }

    /// Send an event, logging instead of failing
    pub fn emit(&self, event: CoordinatorEvent) {
        if let Err(e) = self.send(event) {
            debug!("Coordinator gone, dropping event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (events, rx) = EventSender::channel();
        events.emit(CoordinatorEvent::SpeechStarted("hi".into()));
        events.emit(CoordinatorEvent::SpeechFinished);

        assert_eq!(
            rx.try_recv().unwrap(),
            CoordinatorEvent::SpeechStarted("hi".into())
        );
        assert_eq!(rx.try_recv().unwrap(), CoordinatorEvent::SpeechFinished);
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (events, rx) = EventSender::channel();
        drop(rx);
        assert!(events.send(CoordinatorEvent::Shutdown).is_err());
        // emit must not panic
        events.emit(CoordinatorEvent::Shutdown);
    }

    #[test]
    fn test_request_id_ordering() {
        assert!(RequestId(2) > RequestId(1));
        assert_eq!(RequestId(7).to_string(), "#7");
    }
}
