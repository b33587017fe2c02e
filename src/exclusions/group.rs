//! Exclusions groups: one root domain plus its wildcard and explicit subdomains.

use serde::{Deserialize, Serialize};

use crate::error::{ExclusionsError, Result};
use crate::exclusions::exclusion::{aggregate_state, generate_id, Exclusion, ExclusionState};
use crate::utils::hostname::{
    canonical_pattern, compose_subdomain, is_subdomain_of, is_valid_hostname, matches_pattern,
    normalize_hostname, wildcard_pattern,
};

/// Index of the exact root-domain entry.
pub const ROOT_INDEX: usize = 0;

/// Index of the all-subdomains wildcard entry.
pub const WILDCARD_INDEX: usize = 1;

/// A root domain with its exclusion entries.
///
/// Entry 0 is the exact root domain, entry 1 is the `*.root` wildcard, entries from 2 on are
/// explicit subdomains in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionsGroup {
    pub id: String,
    pub hostname: String,
    pub exclusions: Vec<Exclusion>,
}

impl ExclusionsGroup {
    /// Create a group from a URL or hostname.
    pub fn create(input: &str) -> Result<Self> {
        let root = normalize_hostname(input)
            .ok_or_else(|| ExclusionsError::InvalidHostname(input.to_string()))?;
        Ok(Self::from_root(root))
    }

    /// Create a group from an already normalized root domain, with both default entries enabled.
    pub(crate) fn from_root(root: String) -> Self {
        let exclusions = vec![Exclusion::new(root.clone()), Exclusion::new(wildcard_pattern(&root))];
        Self {
            id: generate_id(),
            hostname: root,
            exclusions,
        }
    }

    /// Aggregate state over all entries.
    pub fn state(&self) -> ExclusionState {
        aggregate_state(self.exclusions.iter().map(Exclusion::state))
    }

    /// The `*.root` pattern of this group.
    pub fn wildcard_hostname(&self) -> String {
        wildcard_pattern(&self.hostname)
    }

    /// Whether `hostname` is one of the two entries every group starts with.
    pub fn is_default_hostname(&self, hostname: &str) -> bool {
        hostname == self.hostname || hostname == self.wildcard_hostname()
    }

    pub fn find_by_hostname(&self, hostname: &str) -> Option<&Exclusion> {
        self.exclusions
            .iter()
            .find(|e| e.hostname.eq_ignore_ascii_case(hostname))
    }

    fn find_by_hostname_mut(&mut self, hostname: &str) -> Option<&mut Exclusion> {
        self.exclusions
            .iter_mut()
            .find(|e| e.hostname.eq_ignore_ascii_case(hostname))
    }

    /// Add an explicit subdomain entry (`label.root`).
    ///
    /// Adding a new subdomain disables the wildcard entry: an explicit subdomain list
    /// supersedes the catch-all. Returns `Ok(false)` if the subdomain was already present.
    pub fn add_subdomain(&mut self, label: &str) -> Result<bool> {
        let hostname = compose_subdomain(label, &self.hostname).ok_or_else(|| {
            ExclusionsError::InvalidSubdomain {
                subdomain: label.to_string(),
                reason: format!("not a valid subdomain of {}", self.hostname),
            }
        })?;

        if self.find_by_hostname(&hostname).is_some() {
            return Ok(false);
        }

        self.exclusions.push(Exclusion::new(hostname));

        let wildcard = self.wildcard_hostname();
        if let Some(entry) = self.find_by_hostname_mut(&wildcard) {
            entry.enabled = false;
        }

        Ok(true)
    }

    /// Remove an entry by id. Returns `false` if no such entry exists.
    pub fn remove_exclusion(&mut self, id: &str) -> bool {
        let before = self.exclusions.len();
        self.exclusions.retain(|e| e.id != id);
        self.exclusions.len() != before
    }

    /// Flip a single entry. Returns `false` if no such entry exists.
    pub fn toggle_exclusion(&mut self, id: &str) -> bool {
        match self.exclusions.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.toggle();
                true
            }
            None => false,
        }
    }

    /// Toggle the whole group: active groups switch fully off, disabled groups fully on.
    pub fn toggle(&mut self) {
        let enabled = !self.state().is_active();
        self.set_enabled(enabled);
    }

    /// Force a uniform value onto every entry.
    pub fn set_enabled(&mut self, enabled: bool) {
        for entry in &mut self.exclusions {
            entry.enabled = enabled;
        }
    }

    /// Re-add semantics: restore missing default entries and enable every entry.
    pub fn reset_enabled(&mut self) {
        if self.find_by_hostname(&self.hostname).is_none() {
            self.exclusions
                .insert(ROOT_INDEX, Exclusion::new(self.hostname.clone()));
        }

        let wildcard = self.wildcard_hostname();
        if self.find_by_hostname(&wildcard).is_none() {
            let index = WILDCARD_INDEX.min(self.exclusions.len());
            self.exclusions.insert(index, Exclusion::new(wildcard));
        }

        self.set_enabled(true);
    }

    /// Enable the wildcard entry, restoring it if it was removed. Returns `true` on change.
    pub fn enable_wildcard(&mut self) -> bool {
        let wildcard = self.wildcard_hostname();
        if self.find_by_hostname(&wildcard).is_none() {
            let index = WILDCARD_INDEX.min(self.exclusions.len());
            self.exclusions.insert(index, Exclusion::new(wildcard));
            return true;
        }
        self.enable_hostname(&wildcard)
    }

    /// Set the entry with `hostname` disabled. Returns `true` if an enabled entry was found.
    pub fn disable_hostname(&mut self, hostname: &str) -> bool {
        match self.find_by_hostname_mut(hostname) {
            Some(entry) if entry.enabled => {
                entry.enabled = false;
                true
            }
            _ => false,
        }
    }

    /// Set the entry with `hostname` enabled. Returns `true` if a disabled entry was found.
    pub fn enable_hostname(&mut self, hostname: &str) -> bool {
        match self.find_by_hostname_mut(hostname) {
            Some(entry) if !entry.enabled => {
                entry.enabled = true;
                true
            }
            _ => false,
        }
    }

    /// Check whether any enabled entry matches `hostname`.
    pub fn matches(&self, hostname: &str) -> bool {
        self.exclusions
            .iter()
            .any(|e| e.enabled && matches_pattern(hostname, &e.hostname))
    }

    /// Hostname patterns of all enabled entries.
    pub fn enabled_patterns(&self) -> impl Iterator<Item = &str> {
        self.exclusions
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.hostname.as_str())
    }

    /// Overwrite entry states from `other` (same root), appending entries that are missing here.
    pub(crate) fn merge_from(&mut self, other: &ExclusionsGroup) {
        for incoming in &other.exclusions {
            match self.find_by_hostname_mut(&incoming.hostname) {
                Some(entry) => entry.enabled = incoming.enabled,
                None => self
                    .exclusions
                    .push(Exclusion::with_state(incoming.hostname.clone(), incoming.enabled)),
            }
        }
    }

    /// Copy of an imported group in the form the engine stores and matches.
    ///
    /// The root goes through the same normalization as user input (`www.`, case, trailing dot),
    /// its two default entries follow it, other entries are lowercased. Entries that collapse
    /// onto the same hostname keep the first occurrence.
    pub(crate) fn canonicalized(&self) -> Result<Self> {
        let root = normalize_hostname(&self.hostname).ok_or_else(|| {
            ExclusionsError::InvalidImport(format!("invalid group hostname '{}'", self.hostname))
        })?;
        let raw_root = canonical_pattern(&self.hostname);
        let raw_wildcard = wildcard_pattern(&raw_root);

        let mut exclusions: Vec<Exclusion> = Vec::with_capacity(self.exclusions.len());
        for entry in &self.exclusions {
            let hostname = canonical_pattern(&entry.hostname);
            let hostname = if hostname == raw_root {
                root.clone()
            } else if hostname == raw_wildcard {
                wildcard_pattern(&root)
            } else {
                hostname
            };

            if exclusions.iter().any(|e| e.hostname == hostname) {
                continue;
            }
            exclusions.push(Exclusion {
                id: entry.id.clone(),
                hostname,
                enabled: entry.enabled,
            });
        }

        Ok(Self {
            id: self.id.clone(),
            hostname: root,
            exclusions,
        })
    }

    /// Structural check used before importing a group.
    pub(crate) fn validate(&self) -> Result<()> {
        if !is_valid_hostname(&self.hostname) {
            return Err(ExclusionsError::InvalidImport(format!(
                "invalid group hostname '{}'",
                self.hostname
            )));
        }

        let wildcard = self.wildcard_hostname();
        for entry in &self.exclusions {
            let valid = entry.hostname == self.hostname
                || entry.hostname == wildcard
                || (is_valid_hostname(&entry.hostname)
                    && is_subdomain_of(&entry.hostname, &self.hostname));
            if !valid {
                return Err(ExclusionsError::InvalidImport(format!(
                    "entry '{}' does not belong to group '{}'",
                    entry.hostname, self.hostname
                )));
            }
        }

        Ok(())
    }

    /// Copy of this group with fresh ids throughout.
    pub(crate) fn with_fresh_ids(&self) -> Self {
        Self {
            id: generate_id(),
            hostname: self.hostname.clone(),
            exclusions: self
                .exclusions
                .iter()
                .map(|e| Exclusion::with_state(e.hostname.clone(), e.enabled))
                .collect(),
        }
    }
}
