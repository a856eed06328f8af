//! Conversation turn coordination
//!
//! `turn` holds the state machine, `generation` the worker threads it
//! dispatches to and `runtime` the event loop thread that drives it.

pub mod generation;
pub mod runtime;
pub mod turn;

pub use generation::{deadline_after, GenerationRequest, WorkerSet, GENERATION_FALLBACK};
pub use runtime::{Assistant, AssistantHandle};
pub use turn::TurnCoordinator;
