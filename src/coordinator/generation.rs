//! Generation requests and worker threads
//!
//! Every collaborator call the coordinator makes that may block (language
//! model, action executor) runs on its own worker thread. The call is
//! wrapped so an error or a panic still produces exactly one completion
//! event carrying fallback text.

use crate::actions::ACTION_FAILED;
use crate::collaborators::{ActionExecutor, LanguageModel};
use crate::events::{CoordinatorEvent, EventSender, RequestId};
use crate::{NeoError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Spoken when the language model fails outright
pub const GENERATION_FALLBACK: &str =
    "I apologize, sir. I am having trouble processing that request.";

/// Stand-in deadline for timeouts too large to add to the clock
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// `now + timeout`, saturating at a distant deadline instead of overflowing
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// The in-flight language-model call
#[derive(Debug)]
pub struct GenerationRequest {
    pub id: RequestId,
    pub prompt: String,
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

impl GenerationRequest {
    pub fn new(id: RequestId, prompt: &str, timeout: Duration, parent: &CancellationToken) -> Self {
        Self {
            id,
            prompt: prompt.to_string(),
            deadline: deadline_after(timeout),
            cancel: parent.child_token(),
        }
    }

    /// The deadline has been reached at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Advise the worker to stop; its result will be ignored regardless
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Worker threads owned by the coordinator
#[derive(Default)]
pub struct WorkerSet {
    handles: Vec<(String, JoinHandle<()>)>,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, name: &str, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.reap();
        let handle = thread::Builder::new()
            .name(format!("neo-{}", name))
            .spawn(work)
            .map_err(|e| NeoError::IOError(format!("Failed to spawn {} worker: {}", name, e)))?;
        self.handles.push((name.to_string(), handle));
        Ok(())
    }

    /// Join workers that have already finished
    pub fn reap(&mut self) {
        let (done, running): (Vec<_>, Vec<_>) = self
            .handles
            .drain(..)
            .partition(|(_, handle)| handle.is_finished());
        self.handles = running;
        for (name, handle) in done {
            if handle.join().is_err() {
                warn!("{} worker panicked", name);
            }
        }
    }

    /// Number of workers not yet joined
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Join every worker, giving up after `timeout`
    ///
    /// Workers still running at the deadline are detached. Returns how many
    /// were left behind.
    pub fn join_all(&mut self, timeout: Duration) -> usize {
        let deadline = deadline_after(timeout);
        loop {
            self.reap();
            if self.handles.is_empty() {
                return 0;
            }
            if Instant::now() >= deadline {
                let names: Vec<_> = self.handles.iter().map(|(n, _)| n.as_str()).collect();
                warn!("Shutdown timeout reached, detaching {:?}", names);
                let left = self.handles.len();
                self.handles.clear();
                return left;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Run `request` against `model` on a worker thread
pub fn spawn_generation(
    workers: &mut WorkerSet,
    model: Arc<dyn LanguageModel>,
    request: &GenerationRequest,
    events: EventSender,
) -> Result<()> {
    let id = request.id;
    let prompt = request.prompt.clone();
    let cancel = request.cancel.clone();

    workers.spawn("generate", move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| model.generate(&prompt, &cancel)));
        let response = match outcome {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Generation {} failed: {}", id, e);
                GENERATION_FALLBACK.to_string()
            }
            Err(_) => {
                warn!("Generation {} panicked", id);
                GENERATION_FALLBACK.to_string()
            }
        };
        if cancel.is_cancelled() {
            debug!("Generation {} finished after cancellation", id);
        }
        events.emit(CoordinatorEvent::GenerationComplete { id, response });
    })
}

/// Run `command` through `executor` on a worker thread
pub fn spawn_action(
    workers: &mut WorkerSet,
    executor: Arc<dyn ActionExecutor>,
    command: &str,
    events: EventSender,
) -> Result<()> {
    let command = command.to_string();
    workers.spawn("action", move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&command)))
            .unwrap_or_else(|_| {
                warn!("Action executor panicked on {:?}", command);
                ACTION_FAILED.to_string()
            });
        events.emit(CoordinatorEvent::ActionComplete { result });
    })
}
