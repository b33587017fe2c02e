//! Portable export/import formats.
//!
//! Two formats are supported:
//! - a JSON document carrying the full data of both modes, consumed by
//!   [`ExclusionsHandler::import_exclusions_data`](crate::exclusions::ExclusionsHandler::import_exclusions_data)
//! - a plain-text list with one hostname pattern per line, which only keeps enabled patterns

use serde::{Deserialize, Serialize};

use crate::error::{ExclusionsError, Result};
use crate::exclusions::data::{ExclusionsData, ExclusionsMode};
use crate::utils::hostname::{normalize_hostname, WILDCARD_PREFIX};

/// Current version of the export document.
pub const EXPORT_VERSION: u32 = 1;

/// Exported exclusions of both modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionsDocument {
    pub version: u32,
    #[serde(default)]
    pub regular: ExclusionsData,
    #[serde(default)]
    pub selective: ExclusionsData,
}

impl ExclusionsDocument {
    pub fn new(regular: ExclusionsData, selective: ExclusionsData) -> Self {
        Self {
            version: EXPORT_VERSION,
            regular,
            selective,
        }
    }

    pub fn data(&self, mode: ExclusionsMode) -> &ExclusionsData {
        match mode {
            ExclusionsMode::Regular => &self.regular,
            ExclusionsMode::Selective => &self.selective,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse, validate and canonicalize a document. Nothing is accepted unless the whole document
    /// is valid.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut document: ExclusionsDocument = serde_json::from_str(json)
            .map_err(|e| ExclusionsError::InvalidImport(format!("malformed document: {}", e)))?;

        if document.version == 0 || document.version > EXPORT_VERSION {
            return Err(ExclusionsError::InvalidImport(format!(
                "unsupported document version {}",
                document.version
            )));
        }

        document.regular = document.regular.prepare_import()?;
        document.selective = document.selective.prepare_import()?;

        Ok(document)
    }
}

/// One parsed line of a hostname list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameLine {
    /// Normalized hostname (root for wildcard lines).
    pub hostname: String,
    /// Line was a `*.root` pattern.
    pub wildcard: bool,
}

/// Render the enabled patterns of `data`, one per line.
pub fn export_hostnames(data: &ExclusionsData) -> String {
    let mut out = data.bypass_list().join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Parse a hostname list. Blank lines and `#` comments are ignored; malformed lines are
/// skipped with a warning.
pub fn parse_hostname_lines(text: &str) -> Vec<HostnameLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (raw, wildcard) = match line.strip_prefix(WILDCARD_PREFIX) {
                Some(rest) => (rest, true),
                None => (line, false),
            };

            match normalize_hostname(raw) {
                Some(hostname) => Some(HostnameLine { hostname, wildcard }),
                None => {
                    tracing::warn!("Skipping malformed hostname line '{}'", line);
                    None
                }
            }
        })
        .collect()
}
