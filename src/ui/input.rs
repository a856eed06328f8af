//! Text input box on stdin

use crate::events::{CoordinatorEvent, EventSender};
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// One line typed by the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputLine {
    /// `/listen`
    ToggleListening,
    /// `/quit` or `/exit`
    Quit,
    Text(String),
    Empty,
}

pub fn parse_line(line: &str) -> InputLine {
    let trimmed = line.trim();
    match trimmed {
        "" => InputLine::Empty,
        "/listen" => InputLine::ToggleListening,
        "/quit" | "/exit" => InputLine::Quit,
        text => InputLine::Text(text.to_string()),
    }
}

/// Forward lines from `reader` until `/quit`, EOF or a closed channel
///
/// EOF counts as `/quit`. A line that is not valid UTF-8 is skipped.
pub fn read_input<R: BufRead>(mut reader: R, events: &EventSender) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Failed to read input: {}", e);
                break;
            }
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                warn!("Ignoring input line that is not UTF-8: {}", e);
                continue;
            }
        };
        let event = match parse_line(line) {
            InputLine::Empty => continue,
            InputLine::ToggleListening => CoordinatorEvent::ToggleListening,
            InputLine::Quit => break,
            InputLine::Text(text) => CoordinatorEvent::Submitted(text),
        };
        if events.send(event).is_err() {
            debug!("Coordinator gone, input reader exiting");
            return;
        }
    }
    events.emit(CoordinatorEvent::Shutdown);
}

/// Read stdin on a background thread
///
/// A blocking stdin read cannot be cancelled, so the thread is left
/// detached at shutdown; it exits on the next line or at process exit.
pub fn spawn_stdin_reader(events: EventSender) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("neo-input".into())
        .spawn(move || read_input(io::stdin().lock(), &events))
}
