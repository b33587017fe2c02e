//! Configuration schema for the exclusions engine.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ExclusionsError};
use crate::manager::default_storage_path;

/// Default quiet window between the last change and a save, in milliseconds.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 100;

/// Upper bound for the save debounce window.
pub const MAX_SAVE_DEBOUNCE_MS: u64 = 60_000;

fn default_save_debounce_ms() -> u64 {
    DEFAULT_SAVE_DEBOUNCE_MS
}

/// Main engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// File holding the persisted exclusions (default: ~/.vpnx/exclusions.json).
    #[serde(default)]
    pub storage_path: Option<PathBuf>,

    /// JSON service catalog. Without one, no hostname classifies as a service.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Quiet window before persisting changes.
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            catalog_path: None,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ExclusionsError> {
        if self.save_debounce_ms > MAX_SAVE_DEBOUNCE_MS {
            return Err(ConfigError::ValidationError(format!(
                "saveDebounceMs must be at most {} (got {})",
                MAX_SAVE_DEBOUNCE_MS, self.save_debounce_ms
            ))
            .into());
        }

        validate_path("storagePath", self.storage_path.as_ref())?;
        validate_path("catalogPath", self.catalog_path.as_ref())?;

        Ok(())
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// The configured storage path, falling back to the home directory default.
    pub fn resolved_storage_path(&self) -> Option<PathBuf> {
        self.storage_path.clone().or_else(default_storage_path)
    }
}

fn validate_path(field: &str, path: Option<&PathBuf>) -> Result<(), ExclusionsError> {
    match path {
        Some(path) if path.as_os_str().is_empty() => {
            Err(ConfigError::ValidationError(format!("{} cannot be empty", field)).into())
        }
        _ => Ok(()),
    }
}
