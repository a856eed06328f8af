pub mod actions;
pub mod audio;
pub mod collaborators;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod hotkey;
pub mod llm;
pub mod setup;
pub mod speech;
pub mod state;
pub mod ui;

pub use error::{NeoError, Result};
