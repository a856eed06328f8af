//! Event loop for the turn coordinator
//!
//! Connects the collaborators to the coordinator: every event they send is
//! handled on one thread, in arrival order. Deadlines are checked after each
//! batch of events, and the loop sleeps no longer than the nearest one.

use super::generation::deadline_after;
use super::turn::TurnCoordinator;
use crate::collaborators::Collaborators;
use crate::config::NeoConfig;
use crate::events::{CoordinatorEvent, EventSender};
use crate::state::{Session, SessionState, SharedSession};
use crate::{NeoError, Result};
use crossbeam_channel::{select, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Longest the loop sleeps with no deadline pending
const IDLE_TICK: Duration = Duration::from_millis(100);

/// Handle for driving the assistant from the front end or tests
#[derive(Clone)]
pub struct AssistantHandle {
    events: EventSender,
    session: SharedSession,
}

impl AssistantHandle {
    /// Submit typed text
    pub fn submit_text(&self, text: &str) -> Result<()> {
        self.events.send(CoordinatorEvent::Submitted(text.to_string()))
    }

    /// Inject text as if the recognizer had heard it
    pub fn inject_recognized(&self, text: &str) -> Result<()> {
        self.events
            .send(CoordinatorEvent::Recognized(text.to_string()))
    }

    pub fn toggle_listening(&self) -> Result<()> {
        self.events.send(CoordinatorEvent::ToggleListening)
    }

    /// Ask the event loop to stop
    pub fn shutdown(&self) {
        self.events.emit(CoordinatorEvent::Shutdown);
    }

    /// Sender for collaborators created after the assistant
    pub fn event_sender(&self) -> EventSender {
        self.events.clone()
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn snapshot(&self) -> Session {
        self.session.snapshot()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Poll the session until `pred` holds or `timeout` passes
    pub fn wait_for<F>(&self, timeout: Duration, pred: F) -> bool
    where
        F: Fn(&Session) -> bool,
    {
        let deadline = deadline_after(timeout);
        loop {
            if pred(&*self.session.read()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

/// The assistant before its event loop is running
pub struct Assistant {
    coordinator: TurnCoordinator,
    events_rx: Receiver<CoordinatorEvent>,
}

impl Assistant {
    pub fn new(config: &NeoConfig, collaborators: Collaborators) -> (Self, AssistantHandle) {
        let (events, events_rx) = EventSender::channel();
        let session = SharedSession::new();
        let coordinator =
            TurnCoordinator::new(config, collaborators, session.clone(), events.clone());

        let handle = AssistantHandle { events, session };
        (
            Self {
                coordinator,
                events_rx,
            },
            handle,
        )
    }

    /// Start collaborators and run the event loop on its own thread
    ///
    /// The thread exits after a `Shutdown` event, once every collaborator
    /// has been stopped and joined.
    pub fn start(self) -> Result<JoinHandle<()>> {
        let Assistant {
            mut coordinator,
            events_rx,
        } = self;

        thread::Builder::new()
            .name("neo-coordinator".into())
            .spawn(move || {
                info!("Coordinator started");
                coordinator.start();
                run_loop(&mut coordinator, &events_rx);
                coordinator.shutdown();
            })
            .map_err(|e| NeoError::IOError(format!("Failed to spawn coordinator: {}", e)))
    }
}

fn run_loop(coordinator: &mut TurnCoordinator, events_rx: &Receiver<CoordinatorEvent>) {
    loop {
        let wait = coordinator
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .map_or(IDLE_TICK, |until| until.min(IDLE_TICK));

        select! {
            recv(events_rx) -> event => match event {
                Ok(event) => {
                    if !coordinator.handle_event(event) {
                        return;
                    }
                    // handle whatever queued up behind it before checking timers
                    while let Ok(event) = events_rx.try_recv() {
                        if !coordinator.handle_event(event) {
                            return;
                        }
                    }
                }
                Err(_) => {
                    warn!("Event channel disconnected");
                    return;
                }
            },
            default(wait) => {}
        }

        coordinator.poll_timers(Instant::now());
    }
}
