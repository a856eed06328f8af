//! End-to-end tests for the Neo assistant
//!
//! These run the real event loop, speech output and action executor with
//! recording stand-ins for the voice, the microphone, the launcher and the
//! display.

use neo::actions::{Launcher, SystemActions};
use neo::collaborators::{Collaborators, LanguageModel, SpeechRecognizer, StatusDisplay};
use neo::config::NeoConfig;
use neo::coordinator::{Assistant, AssistantHandle};
use neo::events::EventSender;
use neo::llm::{Brain, RuleBasedModel};
use neo::speech::{SpeechOutput, TtsBackend};
use neo::state::SessionState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

/// Voice that records what it says; optionally holds each utterance open
struct RecordingVoice {
    spoken: Arc<Mutex<Vec<String>>>,
    hold: Option<Arc<AtomicBool>>,
}

impl TtsBackend for RecordingVoice {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn say(&self, text: &str, cancel: &CancellationToken) -> neo::Result<()> {
        self.spoken.lock().push(text.to_string());
        if let Some(hold) = &self.hold {
            let started = Instant::now();
            while hold.load(Ordering::SeqCst) && !cancel.is_cancelled() {
                if started.elapsed() > Duration::from_secs(10) {
                    break;
                }
                thread::sleep(Duration::from_millis(5));
            }
        }
        Ok(())
    }
}

struct RecordingRecognizer {
    active: Arc<Mutex<Vec<bool>>>,
    stopped: Arc<AtomicBool>,
}

impl SpeechRecognizer for RecordingRecognizer {
    fn name(&self) -> &str {
        "recording"
    }

    fn start(&mut self, _events: EventSender) -> neo::Result<()> {
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn set_active(&mut self, active: bool) {
        self.active.lock().push(active);
    }
}

#[derive(Default)]
struct RecordingLauncher {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Launcher for RecordingLauncher {
    fn spawn(&self, program: &str, args: &[&str]) -> neo::Result<()> {
        self.calls
            .lock()
            .push(format!("{} {}", program, args.join(" ")).trim().to_string());
        Ok(())
    }

    fn run(&self, program: &str, args: &[&str]) -> neo::Result<()> {
        self.spawn(program, args)
    }
}

struct RecordingDisplay {
    states: Arc<Mutex<Vec<SessionState>>>,
}

impl StatusDisplay for RecordingDisplay {
    fn set_state(&mut self, state: SessionState) {
        self.states.lock().push(state);
    }

    fn set_audio_level(&mut self, _level: f32) {}

    fn set_status(&mut self, _text: &str) {}
}

/// Model that answers only after a fixed delay
struct SlowModel {
    delay: Duration,
    reply: &'static str,
}

impl LanguageModel for SlowModel {
    fn name(&self) -> &str {
        "slow"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn generate(&self, _prompt: &str, _cancel: &CancellationToken) -> neo::Result<String> {
        thread::sleep(self.delay);
        Ok(self.reply.to_string())
    }
}

struct Running {
    handle: AssistantHandle,
    thread: Option<JoinHandle<()>>,
    spoken: Arc<Mutex<Vec<String>>>,
    states: Arc<Mutex<Vec<SessionState>>>,
    active: Arc<Mutex<Vec<bool>>>,
    launched: Arc<Mutex<Vec<String>>>,
    recognizer_stopped: Arc<AtomicBool>,
}

impl Running {
    fn start(config: NeoConfig, model: Brain, hold: Option<Arc<AtomicBool>>) -> Self {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let states = Arc::new(Mutex::new(Vec::new()));
        let active = Arc::new(Mutex::new(Vec::new()));
        let recognizer_stopped = Arc::new(AtomicBool::new(false));
        let launcher = RecordingLauncher::default();
        let launched = Arc::clone(&launcher.calls);

        let voice = RecordingVoice {
            spoken: Arc::clone(&spoken),
            hold,
        };
        let collaborators = Collaborators {
            recognizer: Box::new(RecordingRecognizer {
                active: Arc::clone(&active),
                stopped: Arc::clone(&recognizer_stopped),
            }),
            speaker: Box::new(SpeechOutput::new(vec![Box::new(voice)])),
            model: Arc::new(model),
            executor: Arc::new(SystemActions::with_launcher(Box::new(launcher))),
            hotkey: None,
            display: Box::new(RecordingDisplay {
                states: Arc::clone(&states),
            }),
        };

        let (assistant, handle) = Assistant::new(&config, collaborators);
        let thread = assistant.start().expect("coordinator thread");
        Self {
            handle,
            thread: Some(thread),
            spoken,
            states,
            active,
            launched,
            recognizer_stopped,
        }
    }

    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    fn states(&self) -> Vec<SessionState> {
        self.states.lock().clone()
    }

    fn stop(&mut self) -> Duration {
        let started = Instant::now();
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().expect("coordinator panicked");
        }
        started.elapsed()
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.stop();
    }
}

fn quiet_config() -> NeoConfig {
    NeoConfig::default().without_greeting()
}

/// Test that a greeting without a language model is answered from the canned replies
#[test]
fn test_hello_answered_without_model() {
    let running = Running::start(quiet_config(), Brain::rules_only(), None);

    running.handle.submit_text("hello").unwrap();
    assert!(running
        .handle
        .wait_for(WAIT, |s| s.turns_completed == 1 && s.state() == SessionState::Idle));

    let spoken = running.spoken();
    assert_eq!(spoken.len(), 1);
    assert!(RuleBasedModel::replies_for("hello").contains(&spoken[0].as_str()));
    assert_eq!(
        running.states(),
        vec![SessionState::Idle, SessionState::Speaking, SessionState::Idle]
    );
}

/// Test that an action command runs the executor and speaks its result after the cool-down
#[test]
fn test_open_browser_action() {
    let config = quiet_config().with_action_cooldown(Duration::from_millis(150));
    let running = Running::start(config, Brain::rules_only(), None);

    running.handle.submit_text("open the browser").unwrap();
    assert!(running
        .handle
        .wait_for(WAIT, |s| s.turns_completed == 1 && s.state() == SessionState::Idle));
    assert_eq!(
        *running.launched.lock(),
        vec!["xdg-open https://www.google.com".to_string()]
    );
    assert_eq!(
        running.handle.snapshot().last_response.as_deref(),
        Some("Opening browser, sir.")
    );
    assert_eq!(running.spoken(), vec!["Opening browser, sir.".to_string()]);
    assert_eq!(
        running.states(),
        vec![
            SessionState::Idle,
            SessionState::Executing,
            SessionState::Speaking,
            SessionState::Idle,
        ]
    );
}

/// Test that asking the time speaks the clock reading
#[test]
fn test_time_action_is_spoken() {
    let config = quiet_config().with_action_cooldown(Duration::ZERO);
    let running = Running::start(config, Brain::rules_only(), None);

    running.handle.submit_text("what time is it").unwrap();
    assert!(running
        .handle
        .wait_for(WAIT, |s| s.turns_completed == 1 && s.state() == SessionState::Idle));

    let spoken = running.spoken();
    assert_eq!(spoken.len(), 1);
    assert!(spoken[0].starts_with("The time is "));
    assert!(running.launched.lock().is_empty());
}

/// Test that a reply missing its deadline is replaced by the apology
#[test]
fn test_slow_reply_replaced_by_apology() {
    let config = quiet_config().with_generation_timeout(Duration::from_millis(150));
    let apology = config.coordinator.timeout_apology.clone();
    let slow: Arc<dyn LanguageModel> = Arc::new(SlowModel {
        delay: Duration::from_millis(600),
        reply: "It is sunny.",
    });
    let model = Brain::new(vec![slow]);
    let running = Running::start(config, model, None);

    running.handle.submit_text("what is the weather").unwrap();
    assert!(running.handle.wait_for(WAIT, |s| s.turns_completed == 1));
    assert_eq!(running.spoken(), vec![apology.clone()]);

    // let the late reply arrive
    thread::sleep(Duration::from_millis(900));
    assert_eq!(running.spoken(), vec![apology]);
    assert_eq!(running.handle.snapshot().turns_completed, 1);
}

/// Test that recognized speech is dropped while speaking but typed text is not
#[test]
fn test_speech_dropped_while_speaking() {
    let hold = Arc::new(AtomicBool::new(true));
    let running = Running::start(NeoConfig::default(), Brain::rules_only(), Some(Arc::clone(&hold)));
    assert!(running
        .handle
        .wait_for(WAIT, |s| s.state() == SessionState::Speaking));

    running.handle.inject_recognized("test").unwrap();
    running.handle.submit_text("hello there").unwrap();
    assert!(running
        .handle
        .wait_for(WAIT, |s| s.last_command.as_deref() == Some("hello there")
            && !s.generating));
    assert_eq!(running.spoken().len(), 1);

    hold.store(false, Ordering::SeqCst);
    assert!(running.handle.wait_for(WAIT, |s| s.turns_completed == 2));
    thread::sleep(Duration::from_millis(100));

    let spoken = running.spoken();
    assert_eq!(spoken.len(), 2);
    assert!(RuleBasedModel::replies_for("hello there").contains(&spoken[1].as_str()));
}

/// Test that listening toggles the recognizer and is paused while speaking
#[test]
fn test_listening_toggle_and_suspend() {
    let running = Running::start(quiet_config(), Brain::rules_only(), None);

    running.handle.toggle_listening().unwrap();
    assert!(running
        .handle
        .wait_for(WAIT, |s| s.state() == SessionState::Listening));

    running.handle.submit_text("how are you").unwrap();
    assert!(running.handle.wait_for(WAIT, |s| s.turns_completed == 1
        && s.state() == SessionState::Listening));

    running.handle.toggle_listening().unwrap();
    assert!(running
        .handle
        .wait_for(WAIT, |s| s.state() == SessionState::Idle));

    assert_eq!(*running.active.lock(), vec![true, false, true, false]);
}

/// Test that shutdown interrupts playback and joins the coordinator
#[test]
fn test_shutdown_interrupts_speech() {
    let hold = Arc::new(AtomicBool::new(true));
    let mut running = Running::start(NeoConfig::default(), Brain::rules_only(), Some(hold));
    assert!(running
        .handle
        .wait_for(WAIT, |s| s.state() == SessionState::Speaking));

    let elapsed = running.stop();
    assert!(elapsed < Duration::from_secs(5));
    assert!(running.recognizer_stopped.load(Ordering::SeqCst));
    assert!(running.handle.submit_text("anyone there").is_err());
}
