//! Turn coordinator
//!
//! Runs one turn from input text to spoken reply or finished action and
//! owns the only authoritative session state. It is single-threaded: every
//! method is called from the event loop in `runtime`, and collaborators
//! report back through `CoordinatorEvent`s.
//!
//! Timers are not threads. The coordinator records deadlines and the loop
//! calls `poll_timers` with the current time; `next_deadline` tells the loop
//! how long it may sleep.

use super::generation::{
    deadline_after, spawn_action, spawn_generation, GenerationRequest, WorkerSet,
    GENERATION_FALLBACK,
};
use crate::actions::ACTION_FAILED;
use crate::collaborators::{
    ActionExecutor, Collaborators, HotkeyListener, LanguageModel, Speaker, SpeechRecognizer,
    StatusDisplay,
};
use crate::command::{Command, CommandClassifier, CommandKind};
use crate::config::{CoordinatorConfig, NeoConfig};
use crate::events::{CoordinatorEvent, EventSender, RequestId};
use crate::state::{Activity, SessionState, SharedSession};
use crate::NeoError;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const STATUS_VOICE_ONLINE: &str = "VOICE SYSTEM ONLINE";
pub const STATUS_VOICE_UNAVAILABLE: &str = "VOICE SYSTEM UNAVAILABLE";
pub const STATUS_AI_ONLINE: &str = "AI CORE OPERATIONAL";
pub const STATUS_AI_UNAVAILABLE: &str = "AI CORE UNAVAILABLE";
pub const STATUS_RECOGNITION_ONLINE: &str = "VOICE RECOGNITION ONLINE";
pub const STATUS_RECOGNITION_UNAVAILABLE: &str = "VOICE RECOGNITION UNAVAILABLE";
pub const STATUS_RECOGNITION_DEGRADED: &str = "VOICE RECOGNITION DEGRADED";
pub const STATUS_LISTENING: &str = "LISTENING...";
pub const STATUS_LISTENING_OFF: &str = "LISTENING PAUSED";
pub const STATUS_PROCESSING: &str = "PROCESSING...";
pub const STATUS_TIMED_OUT: &str = "Generation Timed Out";

pub struct TurnCoordinator {
    config: CoordinatorConfig,
    classifier: CommandClassifier,
    greeting: Option<String>,
    session: SharedSession,
    events: EventSender,

    recognizer: Box<dyn SpeechRecognizer>,
    speaker: Box<dyn Speaker>,
    model: Arc<dyn LanguageModel>,
    executor: Arc<dyn ActionExecutor>,
    hotkey: Option<Box<dyn HotkeyListener>>,
    display: Box<dyn StatusDisplay>,

    activity: Activity,
    listening: bool,
    displayed: Option<SessionState>,

    next_request: u64,
    pending: Option<GenerationRequest>,
    action_running: bool,
    cooldown_until: Option<Instant>,
    /// Result of the last action, spoken once its cool-down ends
    action_reply: Option<String>,
    utterances: VecDeque<String>,
    deferred_actions: VecDeque<Command>,

    workers: WorkerSet,
    root: CancellationToken,
    stopped: bool,
}

impl TurnCoordinator {
    pub fn new(
        config: &NeoConfig,
        collaborators: Collaborators,
        session: SharedSession,
        events: EventSender,
    ) -> Self {
        let Collaborators {
            recognizer,
            speaker,
            model,
            executor,
            hotkey,
            display,
        } = collaborators;

        let mut coordinator = Self {
            config: config.coordinator.clone(),
            classifier: CommandClassifier::new(&config.coordinator.action_keywords),
            greeting: config.greeting.clone(),
            session,
            events,
            recognizer,
            speaker,
            model,
            executor,
            hotkey,
            display,
            activity: Activity::Idle,
            listening: false,
            displayed: None,
            next_request: 0,
            pending: None,
            action_running: false,
            cooldown_until: None,
            action_reply: None,
            utterances: VecDeque::new(),
            deferred_actions: VecDeque::new(),
            workers: WorkerSet::new(),
            root: CancellationToken::new(),
            stopped: false,
        };
        coordinator.publish();
        coordinator
    }

    /// Start collaborators, report their status and greet the user
    pub fn start(&mut self) {
        let voice = if self.speaker.is_available() {
            STATUS_VOICE_ONLINE
        } else {
            STATUS_VOICE_UNAVAILABLE
        };
        self.set_status(voice);

        let ai = if self.model.is_available() {
            STATUS_AI_ONLINE
        } else {
            STATUS_AI_UNAVAILABLE
        };
        self.set_status(ai);

        match self.recognizer.start(self.events.clone()) {
            Ok(()) => self.set_status(STATUS_RECOGNITION_ONLINE),
            Err(e) => {
                warn!("Speech recognizer not started: {}", e);
                self.set_status(STATUS_RECOGNITION_UNAVAILABLE);
            }
        }

        if let Some(hotkey) = self.hotkey.as_mut() {
            if let Err(e) = hotkey.start(self.events.clone()) {
                warn!("Hotkey not started: {}", e);
            }
        }

        self.greet();
    }

    /// Speak the configured greeting, if any
    pub fn greet(&mut self) {
        if let Some(greeting) = self.greeting.clone() {
            self.deliver(greeting);
        }
    }

    /// Handle one input utterance
    pub fn submit(&mut self, command: Command) {
        if self.stopped {
            return;
        }
        if command.is_speech() && self.activity.is_speaking() {
            debug!("Dropping speech input while speaking: {}", command.text());
            return;
        }

        info!("{} input: {}", command.source(), command.text());
        self.session.write().last_command = Some(command.text().to_string());
        self.set_status(&format!("INPUT: {}", command.text()));

        match self.classifier.classify(command.text()) {
            CommandKind::Action => {
                if self.activity.is_idle() {
                    self.start_action(command);
                } else {
                    debug!("Deferring action until idle: {}", command.text());
                    self.deferred_actions.push_back(command);
                    self.publish();
                }
            }
            CommandKind::Conversational => self.start_generation(command),
        }
    }

    fn start_action(&mut self, command: Command) {
        self.activity = Activity::Executing;
        self.action_running = true;
        self.publish();

        if let Err(e) = spawn_action(
            &mut self.workers,
            Arc::clone(&self.executor),
            command.text(),
            self.events.clone(),
        ) {
            error!("Could not run action: {}", e);
            self.events.emit(CoordinatorEvent::ActionComplete {
                result: ACTION_FAILED.to_string(),
            });
        }
    }

    fn start_generation(&mut self, command: Command) {
        if let Some(previous) = self.pending.take() {
            debug!("Request {} superseded", previous.id);
            previous.cancel();
        }

        self.next_request += 1;
        let request = GenerationRequest::new(
            RequestId(self.next_request),
            command.text(),
            self.config.generation_timeout(),
            &self.root,
        );

        if let Err(e) = spawn_generation(
            &mut self.workers,
            Arc::clone(&self.model),
            &request,
            self.events.clone(),
        ) {
            error!("Could not start generation: {}", e);
            self.deliver(GENERATION_FALLBACK.to_string());
            return;
        }

        debug!("Request {} dispatched", request.id);
        self.pending = Some(request);
        self.set_status(STATUS_PROCESSING);
        self.publish();
    }

    /// A generation worker finished
    pub fn on_generation_complete(&mut self, id: RequestId, response: String) {
        match &self.pending {
            Some(request) if request.id == id => {}
            _ => {
                debug!("Ignoring stale completion {}", id);
                return;
            }
        }
        self.pending = None;
        self.publish();

        let response = response.trim();
        if response.is_empty() {
            debug!("Empty response for {}, staying quiet", id);
            return;
        }
        self.deliver(response.to_string());
    }

    /// The deadline of request `id` passed
    pub fn on_generation_timeout(&mut self, id: RequestId) {
        match self.pending.take() {
            Some(request) if request.id == id => {
                warn!("Request {} timed out", id);
                request.cancel();
            }
            other => {
                self.pending = other;
                return;
            }
        }
        self.set_status(STATUS_TIMED_OUT);
        self.publish();
        self.deliver(self.config.timeout_apology.clone());
    }

    /// Show a reply and speak it, or queue it behind the current activity
    fn deliver(&mut self, text: String) {
        self.session.write().last_response = Some(text.clone());
        self.set_status(&format!("OUTPUT: {}", text));
        self.utterances.push_back(text);
        self.drain_pending();
    }

    fn speak_now(&mut self, text: String) {
        match self.speaker.speak(&text, &self.events) {
            Ok(()) => {
                self.activity = Activity::Speaking;
            }
            Err(NeoError::SpeakerBusy) => {
                // Previous playback has not reported back yet
                debug!("Speaker busy, requeueing");
                self.utterances.push_front(text);
                self.activity = Activity::Speaking;
            }
            Err(e) => {
                // The reply is already on screen; count the turn as done
                warn!("Could not speak reply: {}", e);
                self.session.write().turns_completed += 1;
            }
        }
        self.publish();
    }

    /// Start queued work while the coordinator is idle
    fn drain_pending(&mut self) {
        while self.activity.is_idle() && !self.stopped {
            if let Some(text) = self.utterances.pop_front() {
                self.speak_now(text);
            } else if let Some(command) = self.deferred_actions.pop_front() {
                self.start_action(command);
            } else {
                break;
            }
        }
        self.publish();
    }

    pub fn on_speech_started(&mut self, text: &str) {
        debug!("Speaking: {}", text);
        self.recognizer.set_active(false);
        if !self.activity.is_speaking() {
            self.activity = Activity::Speaking;
        }
        self.publish();
    }

    pub fn on_speech_finished(&mut self) {
        if self.activity.is_speaking() {
            self.activity = Activity::Idle;
            self.session.write().turns_completed += 1;
        }
        self.drain_pending();
        if self.listening && !self.stopped && !self.activity.is_speaking() {
            self.recognizer.set_active(true);
        }
    }

    /// Flip the listening preference
    ///
    /// Turning listening on while speaking only records the preference; the
    /// recognizer resumes when playback finishes.
    pub fn toggle_listening(&mut self) {
        self.listening = !self.listening;
        info!("Listening {}", if self.listening { "on" } else { "off" });
        if !self.listening {
            self.recognizer.set_active(false);
        } else if !self.activity.is_speaking() {
            self.recognizer.set_active(true);
        }
        self.set_status(if self.listening {
            STATUS_LISTENING
        } else {
            STATUS_LISTENING_OFF
        });
        self.publish();
    }

    /// The action executor returned
    pub fn on_action_complete(&mut self, result: String) {
        if !self.action_running {
            debug!("Ignoring action result: {}", result);
            return;
        }
        self.action_running = false;
        info!("Action result: {}", result);
        self.session.write().last_response = Some(result.clone());
        self.set_status(&format!("OUTPUT: {}", result));
        if result.trim().is_empty() {
            self.session.write().turns_completed += 1;
        } else {
            self.action_reply = Some(result);
        }

        let cooldown = self.config.action_cooldown();
        if cooldown.is_zero() {
            self.finish_executing();
        } else {
            self.cooldown_until = Some(deadline_after(cooldown));
        }
    }

    /// End the cool-down and speak the action result ahead of queued replies
    fn finish_executing(&mut self) {
        self.cooldown_until = None;
        if self.activity.is_executing() {
            self.activity = Activity::Idle;
        }
        if let Some(reply) = self.action_reply.take() {
            self.utterances.push_front(reply);
        }
        self.drain_pending();
    }

    pub fn on_audio_level(&mut self, level: f32) {
        let level = level.clamp(0.0, 1.0);
        self.session.write().audio_level = level;
        self.display.set_audio_level(level);
    }

    pub fn on_recognition_failed(&mut self, reason: &str) {
        error!("Speech recognition failed: {}", reason);
        self.session.write().recognition_degraded = true;
        self.set_status(STATUS_RECOGNITION_DEGRADED);
    }

    /// Fire every deadline that has passed at `now`
    pub fn poll_timers(&mut self, now: Instant) {
        let expired = self
            .pending
            .as_ref()
            .filter(|request| request.is_expired(now))
            .map(|request| request.id);
        if let Some(id) = expired {
            self.on_generation_timeout(id);
        }

        if matches!(self.cooldown_until, Some(until) if now >= until) {
            debug!("Action cool-down over");
            self.finish_executing();
        }
    }

    /// Earliest time `poll_timers` has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let generation = self.pending.as_ref().map(|r| r.deadline);
        match (generation, self.cooldown_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Id and deadline of the in-flight request
    pub fn pending_request(&self) -> Option<(RequestId, Instant)> {
        self.pending.as_ref().map(|r| (r.id, r.deadline))
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_parts(self.activity, self.listening)
    }

    pub fn queued_utterances(&self) -> usize {
        self.utterances.len()
    }

    pub fn deferred_actions(&self) -> usize {
        self.deferred_actions.len()
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Dispatch one event; returns `false` once the loop should stop
    pub fn handle_event(&mut self, event: CoordinatorEvent) -> bool {
        match event {
            CoordinatorEvent::Recognized(text) => {
                if let Some(command) = Command::speech(&text) {
                    self.submit(command);
                }
            }
            CoordinatorEvent::Submitted(text) => {
                if let Some(command) = Command::typed(&text) {
                    self.submit(command);
                }
            }
            CoordinatorEvent::GenerationComplete { id, response } => {
                self.on_generation_complete(id, response)
            }
            CoordinatorEvent::ActionComplete { result } => self.on_action_complete(result),
            CoordinatorEvent::SpeechStarted(text) => self.on_speech_started(&text),
            CoordinatorEvent::SpeechFinished => self.on_speech_finished(),
            CoordinatorEvent::AudioLevel(level) => self.on_audio_level(level),
            CoordinatorEvent::RecognitionFailed(reason) => self.on_recognition_failed(&reason),
            CoordinatorEvent::ToggleListening => self.toggle_listening(),
            CoordinatorEvent::Status(text) => self.set_status(&text),
            CoordinatorEvent::Shutdown => {
                info!("Shutdown requested");
                return false;
            }
        }
        true
    }

    /// Cancel outstanding work, stop collaborators and join workers
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.root.cancel();
        if let Some(request) = self.pending.take() {
            request.cancel();
        }
        self.cooldown_until = None;
        self.action_reply = None;
        self.utterances.clear();
        self.deferred_actions.clear();

        self.recognizer.stop();
        if let Some(hotkey) = self.hotkey.as_mut() {
            hotkey.stop();
        }
        self.speaker.shutdown();

        let detached = self.workers.join_all(self.config.shutdown_timeout());
        if detached > 0 {
            warn!("{} worker(s) still running at exit", detached);
        }

        self.activity = Activity::Idle;
        self.publish();
        info!("Coordinator stopped");
    }

    fn set_status(&mut self, text: &str) {
        debug!("Status: {}", text);
        self.session.write().status = text.to_string();
        self.display.set_status(text);
    }

    /// Copy local state into the shared session and the display
    fn publish(&mut self) {
        let state = self.state();
        {
            let mut session = self.session.write();
            session.activity = self.activity;
            session.listening = self.listening;
            session.generating = self.pending.is_some();
            session.queued_utterances = self.utterances.len() + self.deferred_actions.len();
        }
        if self.displayed != Some(state) {
            debug!("State: {}", state);
            self.displayed = Some(state);
            self.display.set_state(state);
        }
    }
}
