//! Durable storage of the combined exclusions state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{ExclusionsError, Result};
use crate::exclusions::{ExclusionsData, ExclusionsMode};

/// Default storage file, relative to the home directory.
const DEFAULT_STORAGE_FILE: &str = ".vpnx/exclusions.json";

/// The persisted blob: both modes plus the selected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub regular: ExclusionsData,
    #[serde(default)]
    pub selective: ExclusionsData,
}

impl PersistedState {
    pub fn data_mut(&mut self, mode: ExclusionsMode) -> &mut ExclusionsData {
        match mode {
            ExclusionsMode::Regular => &mut self.regular,
            ExclusionsMode::Selective => &mut self.selective,
        }
    }
}

/// Key/value style storage for the persisted blob.
pub trait StateStorage: Send + Sync {
    /// Load the blob, `None` if nothing was stored yet.
    fn load(&self) -> BoxFuture<'_, Result<Option<PersistedState>>>;

    /// Replace the stored blob.
    fn save(&self, state: PersistedState) -> BoxFuture<'_, Result<()>>;
}

/// Get the default storage file path.
pub fn default_storage_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_STORAGE_FILE))
}

/// Storage backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStorage for JsonFileStorage {
    fn load(&self) -> BoxFuture<'_, Result<Option<PersistedState>>> {
        Box::pin(async move {
            if !self.path.exists() {
                return Ok(None);
            }

            let content = tokio::fs::read_to_string(&self.path).await?;
            if content.trim().is_empty() {
                return Ok(None);
            }

            let state = serde_json::from_str(&content).map_err(|e| {
                ExclusionsError::Storage(format!(
                    "Failed to parse {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

            Ok(Some(state))
        })
    }

    fn save(&self, state: PersistedState) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }

            let content = serde_json::to_string_pretty(&state)?;

            // Write to a sibling file first so readers never see a partial blob
            let temp = self.temp_path();
            tokio::fs::write(&temp, content).await?;
            tokio::fs::rename(&temp, &self.path).await?;

            tracing::debug!("Exclusions saved to {}", self.path.display());
            Ok(())
        })
    }
}

/// In-memory storage, mostly useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<Option<PersistedState>>,
    saves: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: AtomicUsize::new(0),
        }
    }

    /// The last saved blob.
    pub fn stored(&self) -> Option<PersistedState> {
        self.state.lock().clone()
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self) -> BoxFuture<'_, Result<Option<PersistedState>>> {
        Box::pin(async move { Ok(self.state.lock().clone()) })
    }

    fn save(&self, state: PersistedState) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            *self.state.lock() = Some(state);
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}
