//! Global hotkey via SIGUSR1
//!
//! Bind a desktop shortcut (Ctrl+Space) to `pkill -USR1 neo`. Each signal
//! toggles listening.

use crate::collaborators::HotkeyListener;
use crate::events::{CoordinatorEvent, EventSender};
use crate::{NeoError, Result};
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct SignalHotkey {
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl Default for SignalHotkey {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHotkey {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            thread: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }
}

#[cfg(unix)]
impl HotkeyListener for SignalHotkey {
    fn start(&mut self, events: EventSender) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        if self.thread.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NeoError::Unavailable(format!("Hotkey runtime ({})", e)))?;

        // Register on this thread so a failure is reported to the caller
        let mut hotkey = {
            let _guard = runtime.enter();
            signal(SignalKind::user_defined1())
                .map_err(|e| NeoError::Unavailable(format!("Hotkey signal ({})", e)))?
        };

        let cancel = self.cancel.clone();
        let handle = std::thread::Builder::new()
            .name("neo-hotkey".into())
            .spawn(move || {
                runtime.block_on(async move {
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            received = hotkey.recv() => {
                                if received.is_none() {
                                    warn!("Hotkey signal stream closed");
                                    break;
                                }
                                info!("Hotkey pressed");
                                events.emit(CoordinatorEvent::ToggleListening);
                            }
                        }
                    }
                });
            })
            .map_err(|e| NeoError::Unavailable(format!("Hotkey thread ({})", e)))?;

        self.thread = Some(handle);
        info!("Hotkey armed: send SIGUSR1 (pkill -USR1 neo) to toggle listening");
        Ok(())
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Hotkey thread panicked");
            }
        }
    }
}

#[cfg(not(unix))]
impl HotkeyListener for SignalHotkey {
    fn start(&mut self, _events: EventSender) -> Result<()> {
        Err(NeoError::Unavailable("Global hotkey".to_string()))
    }

    fn stop(&mut self) {
        self.cancel.cancel();
    }
}
