//! Exclusions manager - owns both mode handlers and keeps the proxy and storage in sync.

pub mod persistence;
pub mod state;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{MappedRwLockWriteGuard, RwLock, RwLockWriteGuard};

use crate::catalog::ServiceClassifier;
use crate::error::Result;
use crate::exclusions::{ExclusionsData, ExclusionsDocument, ExclusionsHandler, ExclusionsMode};
use crate::proxy::BypassListConsumer;

use self::persistence::DebouncedSaver;
use self::state::{ManagerState, SyncContext};

pub use persistence::DEFAULT_SAVE_DEBOUNCE;
pub use storage::{default_storage_path, JsonFileStorage, MemoryStorage, PersistedState, StateStorage};

/// The exclusions manager - main entry point for exclusion operations.
///
/// Every mutation made through [`current`](Self::current) or [`handler`](Self::handler) pushes
/// the bypass list (when it touches the active mode) before the guard is released, and schedules
/// a debounced save of both modes.
pub struct ExclusionsManager {
    state: Arc<RwLock<ManagerState>>,
    sync: Arc<SyncContext>,
    storage: Arc<dyn StateStorage>,
}

impl ExclusionsManager {
    /// Create a new manager. Must be called from within a tokio runtime.
    pub fn new(
        classifier: Arc<dyn ServiceClassifier>,
        storage: Arc<dyn StateStorage>,
        consumer: Arc<dyn BypassListConsumer>,
        save_debounce: Duration,
    ) -> Self {
        let saver = DebouncedSaver::spawn(storage.clone(), save_debounce);
        let sync = Arc::new(SyncContext::new(consumer, saver));
        let state = ManagerState::new(classifier, sync.hook());

        Self {
            state: Arc::new(RwLock::new(state)),
            sync,
            storage,
        }
    }

    /// Load persisted state into both handlers and push the initial bypass list.
    pub async fn init(&self) -> Result<()> {
        let persisted = self.storage.load().await?.unwrap_or_default();
        let mode = ExclusionsMode::from_inverted(persisted.inverted);

        {
            let mut state = self.state.write();
            state.regular.hydrate(persisted.regular.clone());
            state.selective.hydrate(persisted.selective.clone());
            state.initialized = true;

            self.sync.set_mode(mode);
            self.sync.push_bypass_list(state.handler(mode).get_exclusions());
        }

        tracing::info!(
            "Exclusions manager initialized in {} mode ({} regular, {} selective patterns)",
            mode,
            persisted.regular.bypass_list().len(),
            persisted.selective.bypass_list().len()
        );

        self.sync.saver().reset(persisted);
        Ok(())
    }

    /// Check if the manager is initialized.
    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    pub fn current_mode(&self) -> ExclusionsMode {
        self.sync.current_mode()
    }

    pub fn is_inverted(&self) -> bool {
        self.current_mode().is_inverted()
    }

    /// Mutable access to the handler of the active mode.
    pub fn current(&self) -> MappedRwLockWriteGuard<'_, ExclusionsHandler> {
        self.handler(self.current_mode())
    }

    /// Mutable access to the handler of a specific mode.
    pub fn handler(&self, mode: ExclusionsMode) -> MappedRwLockWriteGuard<'_, ExclusionsHandler> {
        RwLockWriteGuard::map(self.state.write(), |state| state.handler_mut(mode))
    }

    /// Snapshot of the active mode's data.
    pub fn get_exclusions(&self) -> ExclusionsData {
        self.get_exclusions_by_mode(self.current_mode())
    }

    pub fn get_exclusions_by_mode(&self, mode: ExclusionsMode) -> ExclusionsData {
        self.state.read().handler(mode).get_exclusions().clone()
    }

    /// Check `url` against the active mode.
    pub fn is_excluded(&self, url: &str) -> bool {
        let mode = self.current_mode();
        self.state.read().handler(mode).is_excluded(url)
    }

    /// The bypass list of the active mode.
    pub fn bypass_list(&self) -> Vec<String> {
        let mode = self.current_mode();
        self.state.read().handler(mode).bypass_list()
    }

    /// Switch the active mode, push its bypass list and persist the choice.
    pub fn set_current_mode(&self, mode: ExclusionsMode) {
        if mode == self.current_mode() {
            tracing::debug!("Exclusions mode already {}", mode);
            return;
        }

        self.sync.set_mode(mode);
        {
            let state = self.state.read();
            self.sync.push_bypass_list(state.handler(mode).get_exclusions());
        }
        self.sync.saver().set_inverted(mode.is_inverted());

        tracing::info!("Exclusions mode switched to {}", mode);
    }

    /// Export both modes as a portable document.
    pub fn export_exclusions(&self) -> ExclusionsDocument {
        let state = self.state.read();
        ExclusionsDocument::new(
            state.regular.get_exclusions().clone(),
            state.selective.get_exclusions().clone(),
        )
    }

    /// Import a document into both modes. Both payloads are validated before either is merged.
    pub fn import_exclusions(&self, document: &ExclusionsDocument) -> Result<()> {
        let regular = document.regular.prepare_import()?;
        let selective = document.selective.prepare_import()?;

        let mut state = self.state.write();
        state.regular.import_exclusions_data(&regular)?;
        state.selective.import_exclusions_data(&selective)?;
        Ok(())
    }

    /// Write pending changes now.
    pub async fn flush(&self) {
        self.sync.saver().flush().await;
    }
}
