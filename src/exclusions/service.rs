//! Services: catalog-defined bundles of exclusions groups.

use serde::{Deserialize, Serialize};

use crate::catalog::{ServiceCategory, ServiceDefinition};
use crate::error::{ExclusionsError, Result};
use crate::exclusions::exclusion::{aggregate_state, ExclusionState};
use crate::exclusions::group::ExclusionsGroup;
use crate::utils::hostname::belongs_to;

/// A well-known service with its exclusions groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub service_id: String,
    pub service_name: String,
    #[serde(default)]
    pub categories: Vec<ServiceCategory>,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub modified_time: String,
    pub exclusions_groups: Vec<ExclusionsGroup>,
}

impl Service {
    /// Instantiate a service from the catalog with every group enabled.
    pub fn from_definition(definition: &ServiceDefinition) -> Self {
        let mut exclusions_groups: Vec<ExclusionsGroup> = Vec::new();
        for domain in &definition.domains {
            if exclusions_groups.iter().any(|g| &g.hostname == domain) {
                continue;
            }
            exclusions_groups.push(ExclusionsGroup::from_root(domain.clone()));
        }

        Self {
            service_id: definition.service_id.clone(),
            service_name: definition.service_name.clone(),
            categories: definition.categories.clone(),
            icon_url: definition.icon_url.clone(),
            modified_time: definition.modified_time.clone(),
            exclusions_groups,
        }
    }

    /// Instantiate a service from the catalog with only the group covering `hostname` enabled.
    ///
    /// If no catalog group covers the hostname, a group for it is appended.
    pub fn from_definition_for_hostname(definition: &ServiceDefinition, hostname: &str) -> Self {
        let mut service = Self::from_definition(definition);
        service.set_enabled(false);

        match service.matching_group_index(hostname) {
            Some(index) => service.exclusions_groups[index].set_enabled(true),
            None => service
                .exclusions_groups
                .push(ExclusionsGroup::from_root(hostname.to_string())),
        }

        service
    }

    /// Aggregate state over all groups.
    pub fn state(&self) -> ExclusionState {
        aggregate_state(self.exclusions_groups.iter().map(ExclusionsGroup::state))
    }

    /// Toggle the whole service: active services switch fully off, disabled ones fully on.
    pub fn toggle(&mut self) {
        let enabled = !self.state().is_active();
        self.set_enabled(enabled);
    }

    /// Force a uniform value onto every entry of every group.
    pub fn set_enabled(&mut self, enabled: bool) {
        for group in &mut self.exclusions_groups {
            group.set_enabled(enabled);
        }
    }

    pub fn find_group(&self, group_id: &str) -> Option<&ExclusionsGroup> {
        self.exclusions_groups.iter().find(|g| g.id == group_id)
    }

    pub fn find_group_mut(&mut self, group_id: &str) -> Option<&mut ExclusionsGroup> {
        self.exclusions_groups.iter_mut().find(|g| g.id == group_id)
    }

    pub fn find_group_by_hostname(&self, hostname: &str) -> Option<&ExclusionsGroup> {
        self.exclusions_groups.iter().find(|g| g.hostname == hostname)
    }

    /// Remove a group by id. Returns `false` if no such group exists.
    pub fn remove_group(&mut self, group_id: &str) -> bool {
        let before = self.exclusions_groups.len();
        self.exclusions_groups.retain(|g| g.id != group_id);
        self.exclusions_groups.len() != before
    }

    /// Index of the most specific group whose root covers `hostname`.
    pub fn matching_group_index(&self, hostname: &str) -> Option<usize> {
        self.exclusions_groups
            .iter()
            .enumerate()
            .filter(|(_, g)| belongs_to(hostname, &g.hostname))
            .max_by_key(|(_, g)| g.hostname.len())
            .map(|(index, _)| index)
    }

    /// Check whether any enabled entry of any group matches `hostname`.
    pub fn matches(&self, hostname: &str) -> bool {
        self.exclusions_groups.iter().any(|g| g.matches(hostname))
    }

    /// Enable everything and bring back catalog groups the user removed.
    ///
    /// Groups are re-added in catalog order after the groups still present. Manually added
    /// subdomains are kept.
    pub fn restore_defaults(&mut self, definition: &ServiceDefinition) {
        for group in &mut self.exclusions_groups {
            group.reset_enabled();
        }

        for domain in &definition.domains {
            if self.find_group_by_hostname(domain).is_none() {
                self.exclusions_groups
                    .push(ExclusionsGroup::from_root(domain.clone()));
            }
        }
    }

    /// Replace groups with a fresh catalog copy.
    ///
    /// Manually added subdomain entries of groups that survive are carried over by hostname,
    /// keeping their last enabled flag. Catalog metadata is refreshed as well.
    pub fn reset(&mut self, definition: &ServiceDefinition) {
        let mut fresh = Service::from_definition(definition);

        for group in &mut fresh.exclusions_groups {
            let Some(previous) = self.find_group_by_hostname(&group.hostname) else {
                continue;
            };

            for entry in &previous.exclusions {
                if previous.is_default_hostname(&entry.hostname) {
                    continue;
                }
                group.exclusions.push(entry.clone());
            }
        }

        *self = fresh;
    }

    /// Overwrite states from `other` (same service id), appending groups missing here.
    pub(crate) fn merge_from(&mut self, other: &Service) {
        for incoming in &other.exclusions_groups {
            match self
                .exclusions_groups
                .iter_mut()
                .find(|g| g.hostname == incoming.hostname)
            {
                Some(group) => group.merge_from(incoming),
                None => self.exclusions_groups.push(incoming.with_fresh_ids()),
            }
        }
    }

    /// Copy of this service with fresh ids on every group and entry.
    pub(crate) fn with_fresh_ids(&self) -> Self {
        Self {
            exclusions_groups: self
                .exclusions_groups
                .iter()
                .map(ExclusionsGroup::with_fresh_ids)
                .collect(),
            ..self.clone()
        }
    }

    /// Copy of an imported service with every group canonicalized.
    pub(crate) fn canonicalized(&self) -> Result<Self> {
        Ok(Self {
            exclusions_groups: self
                .exclusions_groups
                .iter()
                .map(ExclusionsGroup::canonicalized)
                .collect::<Result<_>>()?,
            ..self.clone()
        })
    }

    /// Structural check used before importing a service.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.service_id.trim().is_empty() {
            return Err(ExclusionsError::InvalidImport(
                "service without an id".to_string(),
            ));
        }

        for (index, group) in self.exclusions_groups.iter().enumerate() {
            group.validate()?;
            if self.exclusions_groups[..index]
                .iter()
                .any(|g| g.hostname == group.hostname)
            {
                return Err(ExclusionsError::InvalidImport(format!(
                    "service '{}' lists group '{}' twice",
                    self.service_id, group.hostname
                )));
            }
        }

        Ok(())
    }
}
