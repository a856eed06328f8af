//! Status display on the terminal

use crate::collaborators::StatusDisplay;
use crate::state::SessionState;
use std::io::{self, Write};

const METER_WIDTH: usize = 20;

/// Render a level in 0..=1 as a fixed-width bar
pub fn level_bar(level: f32, width: usize) -> String {
    let filled = ((level.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Idle => "IDLE",
        SessionState::Listening => "LISTENING",
        SessionState::Speaking => "SPEAKING",
        SessionState::Executing => "EXECUTING",
    }
}

/// Writes state changes and status lines as they happen
///
/// The microphone meter is off by default; when on it redraws a single
/// line in place while listening.
pub struct TerminalDisplay<W: Write + Send = io::Stdout> {
    out: W,
    state: Option<SessionState>,
    meter: bool,
    meter_bucket: Option<usize>,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: None,
            meter: false,
            meter_bucket: None,
        }
    }

    pub fn with_meter(mut self, enabled: bool) -> Self {
        self.meter = enabled;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        // finish an in-place meter line first
        let prefix = if self.meter_bucket.take().is_some() { "\n" } else { "" };
        let _ = writeln!(self.out, "{}{}", prefix, text);
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> StatusDisplay for TerminalDisplay<W> {
    fn set_state(&mut self, state: SessionState) {
        if self.state == Some(state) {
            return;
        }
        self.state = Some(state);
        self.line(&format!("[{}]", state_label(state)));
    }

    fn set_audio_level(&mut self, level: f32) {
        if !self.meter || self.state != Some(SessionState::Listening) {
            return;
        }
        let bucket = (level.clamp(0.0, 1.0) * METER_WIDTH as f32).round() as usize;
        if self.meter_bucket == Some(bucket) {
            return;
        }
        self.meter_bucket = Some(bucket);
        let _ = write!(self.out, "\r  mic {}", level_bar(level, METER_WIDTH));
        let _ = self.out.flush();
    }

    fn set_status(&mut self, text: &str) {
        self.line(&format!("  >> {}", text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(display: TerminalDisplay<Vec<u8>>) -> String {
        String::from_utf8(display.into_inner()).unwrap()
    }

    #[test]
    fn test_level_bar() {
        assert_eq!(level_bar(0.0, 4), "[----]");
        assert_eq!(level_bar(0.5, 4), "[##--]");
        assert_eq!(level_bar(3.0, 4), "[####]");
    }

    #[test]
    fn test_state_changes_printed_once() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.set_state(SessionState::Idle);
        display.set_state(SessionState::Idle);
        display.set_state(SessionState::Speaking);
        display.set_status("OUTPUT: Hello, sir.");

        assert_eq!(
            output(display),
            "[IDLE]\n[SPEAKING]\n  >> OUTPUT: Hello, sir.\n"
        );
    }

    #[test]
    fn test_meter_only_while_listening() {
        let mut display = TerminalDisplay::new(Vec::new()).with_meter(true);
        display.set_audio_level(0.5);
        display.set_state(SessionState::Listening);
        display.set_audio_level(0.5);
        display.set_audio_level(0.5);
        display.set_status("LISTENING...");

        let text = output(display);
        assert_eq!(text.matches("mic").count(), 1);
        assert!(text.ends_with("]\n  >> LISTENING...\n"));
    }

    #[test]
    fn test_meter_disabled_by_default() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.set_state(SessionState::Listening);
        display.set_audio_level(0.9);
        assert_eq!(output(display), "[LISTENING]\n");
    }
}
