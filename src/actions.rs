//! System actions for action commands
//!
//! Commands are matched by keyword, checked in a fixed order: applications
//! first, then time/date, then volume, then pointer control. Programs are
//! started through a `Launcher` so the phrasing can be tested without
//! spawning anything.

use crate::collaborators::ActionExecutor;
use crate::{NeoError, Result};
use chrono::{Local, NaiveDateTime};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, info, warn};

pub const UNKNOWN_ACTION: &str = "I'm not sure how to execute that, sir.";
pub const ACTION_FAILED: &str = "I apologize, sir. I was unable to complete that action.";
pub const POINTER_UNAVAILABLE: &str = "Mouse/keyboard control unavailable.";

const HOME_PAGE: &str = "https://www.google.com";

/// Starts external programs
pub trait Launcher: Send + Sync {
    /// Start `program` and return without waiting for it
    fn spawn(&self, program: &str, args: &[&str]) -> Result<()>;

    /// Run `program` to completion; a non-zero exit is an error
    fn run(&self, program: &str, args: &[&str]) -> Result<()>;
}

/// Launcher backed by `std::process`
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn spawn(&self, program: &str, args: &[&str]) -> Result<()> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| NeoError::ActionError(format!("{}: {}", program, e)))?;

        // Reap the process when it exits
        let name = program.to_string();
        thread::spawn(move || {
            if let Ok(status) = child.wait() {
                debug!("{} exited with {}", name, status);
            }
        });
        Ok(())
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| NeoError::ActionError(format!("{}: {}", program, e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(NeoError::ActionError(format!("{} exited with {}", program, status)))
        }
    }
}

/// What an action command asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemAction {
    OpenBrowser,
    OpenTerminal,
    OpenEditor,
    TellTime,
    TellDate,
    VolumeUp,
    VolumeDown,
    Mute,
    /// scroll / click / type
    Pointer,
    Unknown,
}

impl SystemAction {
    pub fn parse(command: &str) -> Self {
        let lower = command.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has(&["browser", "chrome", "firefox"]) {
            SystemAction::OpenBrowser
        } else if has(&["terminal", "console"]) {
            SystemAction::OpenTerminal
        } else if has(&["code", "editor", "vscode"]) {
            SystemAction::OpenEditor
        } else if has(&["time"]) {
            SystemAction::TellTime
        } else if has(&["date"]) {
            SystemAction::TellDate
        } else if has(&["volume"]) {
            if has(&["up"]) {
                SystemAction::VolumeUp
            } else if has(&["down", "lower"]) {
                SystemAction::VolumeDown
            } else if has(&["mute"]) {
                SystemAction::Mute
            } else {
                SystemAction::Unknown
            }
        } else if has(&["scroll", "click", "type"]) {
            SystemAction::Pointer
        } else {
            SystemAction::Unknown
        }
    }
}

/// "The time is 03:04 PM, sir."
pub fn time_reply(now: NaiveDateTime) -> String {
    format!("The time is {}, sir.", now.format("%I:%M %p"))
}

/// "Today is Monday, January 05, 2026, sir."
pub fn date_reply(now: NaiveDateTime) -> String {
    format!("Today is {}, sir.", now.format("%A, %B %d, %Y"))
}

/// Desktop action executor
pub struct SystemActions {
    launcher: Box<dyn Launcher>,
}

impl Default for SystemActions {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemActions {
    pub fn new() -> Self {
        Self::with_launcher(Box::new(ProcessLauncher))
    }

    pub fn with_launcher(launcher: Box<dyn Launcher>) -> Self {
        Self { launcher }
    }

    /// Spawn the first program of `candidates` that starts
    fn spawn_first(&self, candidates: &[&str], args: &[&str]) -> Result<()> {
        let mut last_error = None;
        for program in candidates {
            match self.launcher.spawn(program, args) {
                Ok(()) => {
                    debug!("Started {}", program);
                    return Ok(());
                }
                Err(e) => {
                    debug!("{} failed, trying next: {}", program, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| NeoError::ActionError("nothing to start".into())))
    }

    fn perform(&self, action: SystemAction) -> Result<String> {
        let reply = match action {
            SystemAction::OpenBrowser => {
                self.spawn_first(&["xdg-open", "firefox"], &[HOME_PAGE])?;
                "Opening browser, sir.".to_string()
            }
            SystemAction::OpenTerminal => {
                self.spawn_first(&["gnome-terminal", "xterm"], &[])?;
                "Launching terminal, sir.".to_string()
            }
            SystemAction::OpenEditor => {
                self.spawn_first(&["code"], &[])?;
                "Opening code editor, sir.".to_string()
            }
            SystemAction::TellTime => time_reply(Local::now().naive_local()),
            SystemAction::TellDate => date_reply(Local::now().naive_local()),
            SystemAction::VolumeUp => {
                self.launcher.run("amixer", &["set", "Master", "5%+"])?;
                "Volume increased, sir.".to_string()
            }
            SystemAction::VolumeDown => {
                self.launcher.run("amixer", &["set", "Master", "5%-"])?;
                "Volume decreased, sir.".to_string()
            }
            SystemAction::Mute => {
                self.launcher.run("amixer", &["set", "Master", "toggle"])?;
                "Volume muted, sir.".to_string()
            }
            SystemAction::Pointer => POINTER_UNAVAILABLE.to_string(),
            SystemAction::Unknown => UNKNOWN_ACTION.to_string(),
        };
        Ok(reply)
    }
}

impl ActionExecutor for SystemActions {
    fn execute(&self, command: &str) -> String {
        let action = SystemAction::parse(command);
        info!("Executing action {:?}: {}", action, command);
        match self.perform(action) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Action {:?} failed: {}", action, e);
                ACTION_FAILED.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingLauncher {
        calls: Arc<Mutex<Vec<String>>>,
        missing: Vec<&'static str>,
    }

    impl RecordingLauncher {
        fn record(&self, program: &str, args: &[&str]) -> Result<()> {
            self.calls
                .lock()
                .push(format!("{} {}", program, args.join(" ")).trim().to_string());
            if self.missing.contains(&program) {
                Err(NeoError::ActionError(format!("{} not found", program)))
            } else {
                Ok(())
            }
        }
    }

    impl Launcher for RecordingLauncher {
        fn spawn(&self, program: &str, args: &[&str]) -> Result<()> {
            self.record(program, args)
        }

        fn run(&self, program: &str, args: &[&str]) -> Result<()> {
            self.record(program, args)
        }
    }

    fn actions(missing: Vec<&'static str>) -> (SystemActions, Arc<Mutex<Vec<String>>>) {
        let launcher = RecordingLauncher {
            missing,
            ..Default::default()
        };
        let calls = launcher.calls.clone();
        (SystemActions::with_launcher(Box::new(launcher)), calls)
    }

    #[test]
    fn test_open_browser() {
        let (actions, calls) = actions(vec![]);
        assert_eq!(actions.execute("open the browser"), "Opening browser, sir.");
        assert_eq!(*calls.lock(), vec!["xdg-open https://www.google.com"]);
    }

    #[test]
    fn test_browser_falls_back_to_firefox() {
        let (actions, calls) = actions(vec!["xdg-open"]);
        assert_eq!(actions.execute("launch chrome"), "Opening browser, sir.");
        assert_eq!(calls.lock().len(), 2);
        assert_eq!(calls.lock()[1], "firefox https://www.google.com");
    }

    #[test]
    fn test_terminal_and_editor() {
        let (actions, calls) = actions(vec!["gnome-terminal"]);
        assert_eq!(actions.execute("open terminal"), "Launching terminal, sir.");
        assert_eq!(actions.execute("start the editor"), "Opening code editor, sir.");
        assert_eq!(*calls.lock(), vec!["gnome-terminal", "xterm", "code"]);
    }

    #[test]
    fn test_launch_failure_apologizes() {
        let (actions, _) = actions(vec!["code"]);
        assert_eq!(actions.execute("open vscode"), ACTION_FAILED);
    }

    #[test]
    fn test_volume() {
        let (actions, calls) = actions(vec![]);
        assert_eq!(actions.execute("volume up"), "Volume increased, sir.");
        assert_eq!(actions.execute("lower the volume"), "Volume decreased, sir.");
        assert_eq!(actions.execute("mute volume"), "Volume muted, sir.");
        assert_eq!(
            *calls.lock(),
            vec![
                "amixer set Master 5%+",
                "amixer set Master 5%-",
                "amixer set Master toggle"
            ]
        );
    }

    #[test]
    fn test_volume_without_direction_is_unknown() {
        let (actions, calls) = actions(vec![]);
        assert_eq!(actions.execute("show volume"), UNKNOWN_ACTION);
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_pointer_and_unknown() {
        let (actions, calls) = actions(vec![]);
        assert_eq!(actions.execute("scroll down"), POINTER_UNAVAILABLE);
        assert_eq!(actions.execute("click"), POINTER_UNAVAILABLE);
        assert_eq!(actions.execute("run diagnostics"), UNKNOWN_ACTION);
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_time_and_date_phrasing() {
        let at = NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(15, 4, 0)
            .unwrap();
        assert_eq!(time_reply(at), "The time is 03:04 PM, sir.");
        assert_eq!(date_reply(at), "Today is Monday, January 05, 2026, sir.");
    }

    #[test]
    fn test_time_action_uses_clock() {
        let (actions, calls) = actions(vec![]);
        let reply = actions.execute("what time is it");
        assert!(reply.starts_with("The time is "));
        assert!(reply.ends_with(", sir."));
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_parse_priority() {
        // applications are matched before time/date
        assert_eq!(
            SystemAction::parse("open the browser at this time"),
            SystemAction::OpenBrowser
        );
        assert_eq!(SystemAction::parse("show the date"), SystemAction::TellDate);
        // "update" contains "date"
        assert_eq!(SystemAction::parse("run update"), SystemAction::TellDate);
    }
}
