//! Debounced persistence of the combined exclusions state.
//!
//! Changes are recorded in a shared snapshot and announced to a background worker. The worker
//! waits for a quiet window after the last change before writing, so a burst of mutations turns
//! into a single save. Dropping every [`DebouncedSaver`] flushes pending changes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::exclusions::{ExclusionsData, ExclusionsMode};
use crate::manager::storage::{PersistedState, StateStorage};

/// Default quiet window before a save.
pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(100);

enum Command {
    Changed,
    Flush(oneshot::Sender<()>),
}

/// Handle to the persistence worker.
#[derive(Clone)]
pub struct DebouncedSaver {
    snapshot: Arc<Mutex<PersistedState>>,
    tx: mpsc::UnboundedSender<Command>,
}

impl DebouncedSaver {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(storage: Arc<dyn StateStorage>, delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot = Arc::new(Mutex::new(PersistedState::default()));

        tokio::spawn(run_worker(storage, delay, snapshot.clone(), rx));

        Self { snapshot, tx }
    }

    /// Replace the snapshot without scheduling a save (hydration).
    pub fn reset(&self, state: PersistedState) {
        *self.snapshot.lock() = state;
    }

    /// Record new data for one mode and schedule a save.
    pub fn update(&self, mode: ExclusionsMode, data: &ExclusionsData) {
        *self.snapshot.lock().data_mut(mode) = data.clone();
        self.notify();
    }

    /// Record the selected mode and schedule a save.
    pub fn set_inverted(&self, inverted: bool) {
        self.snapshot.lock().inverted = inverted;
        self.notify();
    }

    /// Write pending changes now and wait for the write to finish.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_err() {
            tracing::warn!("Persistence worker is gone, cannot flush");
            return;
        }
        let _ = ack_rx.await;
    }

    fn notify(&self) {
        if self.tx.send(Command::Changed).is_err() {
            tracing::warn!("Persistence worker is gone, change will not be saved");
        }
    }
}

async fn run_worker(
    storage: Arc<dyn StateStorage>,
    delay: Duration,
    snapshot: Arc<Mutex<PersistedState>>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    // `pending`: the snapshot holds data storage does not have yet.
    // `scheduled`: a quiet window is running.
    let mut pending = false;
    let mut scheduled = false;

    loop {
        let command = if scheduled {
            // Every new change restarts the quiet window
            tokio::select! {
                command = rx.recv() => command,
                _ = tokio::time::sleep(delay) => {
                    scheduled = false;
                    if write_snapshot(storage.as_ref(), &snapshot).await {
                        pending = false;
                    }
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            Some(Command::Changed) => {
                pending = true;
                scheduled = true;
            }
            Some(Command::Flush(ack)) => {
                if pending && write_snapshot(storage.as_ref(), &snapshot).await {
                    pending = false;
                    scheduled = false;
                }
                let _ = ack.send(());
            }
            None => {
                if pending {
                    write_snapshot(storage.as_ref(), &snapshot).await;
                }
                tracing::debug!("Persistence worker stopped");
                break;
            }
        }
    }
}

/// Write the current snapshot. Returns `false` if storage rejected it.
async fn write_snapshot(storage: &dyn StateStorage, snapshot: &Mutex<PersistedState>) -> bool {
    let state = snapshot.lock().clone();
    match storage.save(state).await {
        Ok(()) => true,
        Err(e) => {
            // In-memory state stays authoritative; the data stays pending for the next attempt
            tracing::warn!("Failed to persist exclusions: {}", e);
            false
        }
    }
}
