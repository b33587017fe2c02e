//! Leaf exclusion entries and the tri-state aggregation rule.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate state of a composite entity (group or service).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExclusionState {
    Enabled,
    PartlyEnabled,
    Disabled,
}

impl ExclusionState {
    /// `true` for `Enabled` and `PartlyEnabled`.
    pub fn is_active(self) -> bool {
        !matches!(self, ExclusionState::Disabled)
    }
}

impl From<bool> for ExclusionState {
    fn from(enabled: bool) -> Self {
        if enabled {
            ExclusionState::Enabled
        } else {
            ExclusionState::Disabled
        }
    }
}

/// Derive a parent state from its children.
///
/// `Enabled` if every child is enabled, `Disabled` if every child is disabled (or there are
/// none), `PartlyEnabled` otherwise.
pub fn aggregate_state<I>(children: I) -> ExclusionState
where
    I: IntoIterator<Item = ExclusionState>,
{
    let mut any_enabled = false;
    let mut any_disabled = false;

    for state in children {
        match state {
            ExclusionState::Enabled => any_enabled = true,
            ExclusionState::Disabled => any_disabled = true,
            ExclusionState::PartlyEnabled => return ExclusionState::PartlyEnabled,
        }
        if any_enabled && any_disabled {
            return ExclusionState::PartlyEnabled;
        }
    }

    if any_enabled {
        ExclusionState::Enabled
    } else {
        ExclusionState::Disabled
    }
}

/// A single hostname pattern (or IP address) with an enabled flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exclusion {
    pub id: String,
    pub hostname: String,
    pub enabled: bool,
}

impl Exclusion {
    /// Create a new enabled exclusion with a fresh id.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self::with_state(hostname, true)
    }

    /// Create a new exclusion with the given enabled flag.
    pub fn with_state(hostname: impl Into<String>, enabled: bool) -> Self {
        Self {
            id: generate_id(),
            hostname: hostname.into(),
            enabled,
        }
    }

    pub fn state(&self) -> ExclusionState {
        self.enabled.into()
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }
}

/// Generate a fresh entity id.
pub(crate) fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
