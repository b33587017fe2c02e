//! State management for the exclusions manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::catalog::ServiceClassifier;
use crate::exclusions::{ExclusionsData, ExclusionsHandler, ExclusionsMode, SaveHook};
use crate::manager::persistence::DebouncedSaver;
use crate::proxy::BypassListConsumer;

/// Both mode handlers.
pub struct ManagerState {
    /// Regular (bypass) exclusions.
    pub regular: ExclusionsHandler,

    /// Selective (VPN-only) exclusions.
    pub selective: ExclusionsHandler,

    /// Whether persisted state has been loaded.
    pub initialized: bool,
}

impl ManagerState {
    /// Create empty handlers wired to the given save hook.
    pub fn new(classifier: Arc<dyn ServiceClassifier>, on_save: SaveHook) -> Self {
        Self {
            regular: ExclusionsHandler::new(
                ExclusionsMode::Regular,
                ExclusionsData::default(),
                classifier.clone(),
                on_save.clone(),
            ),
            selective: ExclusionsHandler::new(
                ExclusionsMode::Selective,
                ExclusionsData::default(),
                classifier,
                on_save,
            ),
            initialized: false,
        }
    }

    pub fn handler(&self, mode: ExclusionsMode) -> &ExclusionsHandler {
        match mode {
            ExclusionsMode::Regular => &self.regular,
            ExclusionsMode::Selective => &self.selective,
        }
    }

    pub fn handler_mut(&mut self, mode: ExclusionsMode) -> &mut ExclusionsHandler {
        match mode {
            ExclusionsMode::Regular => &mut self.regular,
            ExclusionsMode::Selective => &mut self.selective,
        }
    }
}

/// The two output ports shared by both handlers' save hooks.
///
/// The bypass list is pushed synchronously on every change of the active mode; persistence goes
/// through the debounced saver.
pub struct SyncContext {
    inverted: AtomicBool,
    consumer: Arc<dyn BypassListConsumer>,
    saver: DebouncedSaver,
}

impl SyncContext {
    pub fn new(consumer: Arc<dyn BypassListConsumer>, saver: DebouncedSaver) -> Self {
        Self {
            inverted: AtomicBool::new(false),
            consumer,
            saver,
        }
    }

    pub fn current_mode(&self) -> ExclusionsMode {
        ExclusionsMode::from_inverted(self.inverted.load(Ordering::SeqCst))
    }

    pub fn set_mode(&self, mode: ExclusionsMode) {
        self.inverted.store(mode.is_inverted(), Ordering::SeqCst);
    }

    pub fn saver(&self) -> &DebouncedSaver {
        &self.saver
    }

    /// Save hook body.
    pub fn on_change(&self, mode: ExclusionsMode, data: &ExclusionsData) {
        if mode == self.current_mode() {
            self.push_bypass_list(data);
        }
        self.saver.update(mode, data);
    }

    /// Push the enabled patterns of `data` to the consumer. Failures are logged only.
    pub fn push_bypass_list(&self, data: &ExclusionsData) {
        let mode = self.current_mode();
        let patterns = data.bypass_list();
        if let Err(e) = self.consumer.set_bypass_list(&patterns, mode.is_inverted()) {
            tracing::warn!("Failed to push {} bypass list: {}", mode, e);
        }
    }

    /// Build a save hook bound to this context.
    pub fn hook(self: &Arc<Self>) -> SaveHook {
        let context = Arc::clone(self);
        Arc::new(move |mode: ExclusionsMode, data: &ExclusionsData| {
            context.on_change(mode, data)
        })
    }
}
