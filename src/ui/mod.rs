//! Terminal front end
//!
//! - `terminal`: status display (state, status line, microphone meter)
//! - `input`: stdin text box with `/listen` and `/quit`

pub mod input;
pub mod terminal;

pub use input::{parse_line, read_input, spawn_stdin_reader, InputLine};
pub use terminal::{level_bar, TerminalDisplay};
