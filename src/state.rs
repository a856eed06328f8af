//! Session state for the Neo assistant
//!
//! The coordinator is the only writer. It keeps the momentary activity
//! (idle, speaking, executing) apart from the standing listening preference,
//! and publishes both through `SharedSession` so the display, the front end
//! and tests can read them from any thread.

use parking_lot::RwLock;
use std::sync::Arc;

/// What the assistant is doing right now
///
/// Speaking and executing are mutually exclusive by construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Activity {
    #[default]
    Idle,
    /// A reply is being played back
    Speaking,
    /// A system action is running or cooling down
    Executing,
}

impl Activity {
    pub fn is_idle(&self) -> bool {
        matches!(self, Activity::Idle)
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self, Activity::Speaking)
    }

    pub fn is_executing(&self) -> bool {
        matches!(self, Activity::Executing)
    }
}

/// State shown to the user (orb, status line)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Listening,
    Speaking,
    Executing,
}

impl SessionState {
    /// Derive the displayed state from activity and listening preference
    pub fn from_parts(activity: Activity, listening: bool) -> Self {
        match activity {
            Activity::Speaking => SessionState::Speaking,
            Activity::Executing => SessionState::Executing,
            Activity::Idle if listening => SessionState::Listening,
            Activity::Idle => SessionState::Idle,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Speaking => write!(f, "Speaking"),
            SessionState::Executing => write!(f, "Executing"),
        }
    }
}

/// Full session data published by the coordinator
#[derive(Clone, Debug, Default)]
pub struct Session {
    pub activity: Activity,
    /// Standing preference toggled by the hotkey
    pub listening: bool,
    /// Whether a generation request is in flight
    pub generating: bool,
    /// Set when the recognition stream failed after startup
    pub recognition_degraded: bool,
    /// Last status line shown to the user
    pub status: String,
    /// Smoothed microphone level in 0..=1
    pub audio_level: f32,
    pub last_command: Option<String>,
    pub last_response: Option<String>,
    /// Replies waiting for the speaker
    pub queued_utterances: usize,
    /// Completed turns (spoken replies and finished actions)
    pub turns_completed: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_parts(self.activity, self.listening)
    }

    /// Check if nothing is running or pending
    pub fn is_quiet(&self) -> bool {
        self.activity.is_idle() && !self.generating && self.queued_utterances == 0
    }
}

/// Thread-safe shared session
///
/// Wraps `Session` in `Arc<RwLock<>>`. Only the coordinator thread writes.
#[derive(Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, Session> {
        self.inner.read()
    }

    pub(crate) fn write(&self) -> parking_lot::RwLockWriteGuard<'_, Session> {
        self.inner.write()
    }

    /// Get a copy of the current session (no lock held after return)
    pub fn snapshot(&self) -> Session {
        self.inner.read().clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state()
    }

    pub fn activity(&self) -> Activity {
        self.inner.read().activity
    }

    pub fn is_listening(&self) -> bool {
        self.inner.read().listening
    }

    pub fn is_generating(&self) -> bool {
        self.inner.read().generating
    }

    pub fn is_quiet(&self) -> bool {
        self.inner.read().is_quiet()
    }

    pub fn status(&self) -> String {
        self.inner.read().status.clone()
    }
}
