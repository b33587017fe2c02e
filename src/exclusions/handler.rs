//! Single-mode exclusions engine.

use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::{ServiceClassifier, ServiceDefinition};
use crate::error::{ExclusionsError, Result};
use crate::exclusions::data::{ExclusionsData, ExclusionsMode};
use crate::exclusions::exclusion::Exclusion;
use crate::exclusions::group::ExclusionsGroup;
use crate::exclusions::service::Service;
use crate::exclusions::transfer::{export_hostnames, parse_hostname_lines};
use crate::utils::hostname::{
    belongs_to, canonical_ip, is_ip_address, is_wildcard_pattern, matches_pattern,
    normalize_hostname, wildcard_pattern,
};

/// Callback invoked with the handler's data after every applied mutation.
pub type SaveHook = Arc<dyn Fn(ExclusionsMode, &ExclusionsData) + Send + Sync>;

/// Owns the exclusion set of one mode.
///
/// Every public mutation that changes state calls the save hook exactly once, after the
/// in-memory update. Operations on unknown ids are no-ops and do not call the hook.
pub struct ExclusionsHandler {
    mode: ExclusionsMode,
    data: ExclusionsData,
    classifier: Arc<dyn ServiceClassifier>,
    on_save: SaveHook,
}

impl std::fmt::Debug for ExclusionsHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusionsHandler")
            .field("mode", &self.mode)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl ExclusionsHandler {
    /// Create a handler bound to `data` and a save hook.
    pub fn new(
        mode: ExclusionsMode,
        data: ExclusionsData,
        classifier: Arc<dyn ServiceClassifier>,
        on_save: SaveHook,
    ) -> Self {
        Self {
            mode,
            data,
            classifier,
            on_save,
        }
    }

    /// Create an empty handler whose save hook does nothing.
    pub fn detached(mode: ExclusionsMode, classifier: Arc<dyn ServiceClassifier>) -> Self {
        Self::new(
            mode,
            ExclusionsData::default(),
            classifier,
            Arc::new(|_: ExclusionsMode, _: &ExclusionsData| {}),
        )
    }

    pub fn mode(&self) -> ExclusionsMode {
        self.mode
    }

    /// Current snapshot of this mode's data.
    pub fn get_exclusions(&self) -> &ExclusionsData {
        &self.data
    }

    /// Replace the data wholesale without calling the save hook (used when hydrating).
    pub(crate) fn hydrate(&mut self, data: ExclusionsData) {
        self.data = data;
    }

    fn save(&self) {
        (self.on_save)(self.mode, &self.data);
    }

    /// Save if something changed, log otherwise.
    fn commit(&self, changed: bool, action: &str) -> bool {
        if changed {
            tracing::debug!("[{}] {}", self.mode, action);
            self.save();
        } else {
            tracing::debug!("[{}] {}: nothing to change", self.mode, action);
        }
        changed
    }

    fn all_groups(&self) -> impl Iterator<Item = &ExclusionsGroup> + '_ {
        self.data
            .excluded_services
            .iter()
            .flat_map(|s| s.exclusions_groups.iter())
            .chain(self.data.exclusions_groups.iter())
    }

    fn all_groups_mut(&mut self) -> impl Iterator<Item = &mut ExclusionsGroup> + '_ {
        self.data
            .excluded_services
            .iter_mut()
            .flat_map(|s| s.exclusions_groups.iter_mut())
            .chain(self.data.exclusions_groups.iter_mut())
    }

    fn find_service_mut(&mut self, service_id: &str) -> Option<&mut Service> {
        self.data
            .excluded_services
            .iter_mut()
            .find(|s| s.service_id == service_id)
    }

    fn find_group_mut(&mut self, group_id: &str) -> Option<&mut ExclusionsGroup> {
        self.data
            .exclusions_groups
            .iter_mut()
            .find(|g| g.id == group_id)
    }

    fn find_service_group_mut(
        &mut self,
        service_id: &str,
        group_id: &str,
    ) -> Option<&mut ExclusionsGroup> {
        self.find_service_mut(service_id)?.find_group_mut(group_id)
    }

    pub fn find_service(&self, service_id: &str) -> Option<&Service> {
        self.data
            .excluded_services
            .iter()
            .find(|s| s.service_id == service_id)
    }

    pub fn find_group(&self, group_id: &str) -> Option<&ExclusionsGroup> {
        self.data.exclusions_groups.iter().find(|g| g.id == group_id)
    }

    pub fn find_group_by_hostname(&self, hostname: &str) -> Option<&ExclusionsGroup> {
        self.data
            .exclusions_groups
            .iter()
            .find(|g| g.hostname == hostname)
    }

    pub fn find_ip_by_address(&self, address: &str) -> Option<&Exclusion> {
        self.data.excluded_ips.iter().find(|ip| ip.hostname == address)
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Check whether `url` is covered by an enabled pattern of this mode.
    pub fn is_excluded(&self, url: &str) -> bool {
        let Some(hostname) = normalize_hostname(url) else {
            return false;
        };

        if self
            .data
            .excluded_ips
            .iter()
            .any(|ip| ip.enabled && ip.hostname == hostname)
        {
            return true;
        }

        self.all_groups().any(|g| g.matches(&hostname))
    }

    /// Enabled patterns of this mode, flattened for the proxy.
    pub fn bypass_list(&self) -> Vec<String> {
        self.data.bypass_list()
    }

    // ========================================================================
    // Adding by URL
    // ========================================================================

    /// Exclude the hostname of `url`.
    ///
    /// Known services are added through the catalog with only the matching group enabled. Other
    /// hostnames extend the most specific existing group or create a new one.
    pub fn add_url_to_exclusions(&mut self, url: &str) -> Result<()> {
        let hostname =
            normalize_hostname(url).ok_or_else(|| ExclusionsError::InvalidHostname(url.to_string()))?;

        let changed = self.apply_hostname(&hostname);
        self.commit(changed, &format!("add url {}", hostname));
        Ok(())
    }

    fn apply_hostname(&mut self, hostname: &str) -> bool {
        if is_ip_address(hostname) {
            return self.apply_ip(hostname);
        }

        if let Some(service_id) = self.classifier.service_id_for(hostname) {
            match self.classifier.definition(&service_id) {
                Some(definition) => return self.apply_service_hostname(&definition, hostname),
                None => tracing::debug!(
                    "Service {} matched {} but is missing from the catalog",
                    service_id,
                    hostname
                ),
            }
        }

        self.apply_group_hostname(hostname)
    }

    fn apply_ip(&mut self, address: &str) -> bool {
        match self
            .data
            .excluded_ips
            .iter_mut()
            .find(|ip| ip.hostname == address)
        {
            Some(ip) if ip.enabled => false,
            Some(ip) => {
                ip.enabled = true;
                true
            }
            None => {
                self.data.excluded_ips.push(Exclusion::new(address));
                true
            }
        }
    }

    fn apply_service_hostname(&mut self, definition: &ServiceDefinition, hostname: &str) -> bool {
        let Some(service) = self.find_service_mut(&definition.service_id) else {
            self.data
                .excluded_services
                .push(Service::from_definition_for_hostname(definition, hostname));
            return true;
        };

        if let Some(index) = service.matching_group_index(hostname) {
            return apply_to_group(&mut service.exclusions_groups[index], hostname);
        }

        // The user removed the covering group, bring it back from the catalog
        let root = definition
            .domains
            .iter()
            .filter(|domain| belongs_to(hostname, domain))
            .max_by_key(|domain| domain.len())
            .cloned()
            .unwrap_or_else(|| hostname.to_string());
        service.exclusions_groups.push(ExclusionsGroup::from_root(root));
        true
    }

    fn apply_group_hostname(&mut self, hostname: &str) -> bool {
        // Service groups count too, a catalog may stop listing a domain the user still has
        let existing = self
            .all_groups_mut()
            .filter(|g| belongs_to(hostname, &g.hostname))
            .max_by_key(|g| g.hostname.len());

        match existing {
            Some(group) => apply_to_group(group, hostname),
            None => {
                self.data
                    .exclusions_groups
                    .push(ExclusionsGroup::from_root(hostname.to_string()));
                true
            }
        }
    }

    // ========================================================================
    // Services
    // ========================================================================

    /// Add a service by catalog id with every group enabled.
    ///
    /// If the service is already present, every entry is re-enabled and catalog groups the
    /// user removed are restored; manually added subdomains are kept.
    pub fn add_service(&mut self, service_id: &str) -> Result<()> {
        let definition = self
            .classifier
            .definition(service_id)
            .ok_or_else(|| ExclusionsError::UnknownService(service_id.to_string()))?;

        match self.find_service_mut(service_id) {
            Some(service) => service.restore_defaults(&definition),
            None => self
                .data
                .excluded_services
                .push(Service::from_definition(&definition)),
        }

        self.commit(true, &format!("add service {}", service_id));
        Ok(())
    }

    pub fn remove_service(&mut self, service_id: &str) -> bool {
        let before = self.data.excluded_services.len();
        self.data
            .excluded_services
            .retain(|s| s.service_id != service_id);
        let changed = self.data.excluded_services.len() != before;
        self.commit(changed, &format!("remove service {}", service_id))
    }

    pub fn toggle_service_state(&mut self, service_id: &str) -> bool {
        let changed = match self.find_service_mut(service_id) {
            Some(service) => {
                service.toggle();
                true
            }
            None => false,
        };
        self.commit(changed, &format!("toggle service {}", service_id))
    }

    /// Replace a service's groups with a fresh catalog copy, keeping manual subdomains.
    pub fn reset_service_data(&mut self, service_id: &str) -> bool {
        let Some(definition) = self.classifier.definition(service_id) else {
            tracing::warn!("Cannot reset service {}: not in catalog", service_id);
            return false;
        };

        let changed = match self.find_service_mut(service_id) {
            Some(service) => {
                service.reset(&definition);
                true
            }
            None => false,
        };
        self.commit(changed, &format!("reset service {}", service_id))
    }

    /// Remove a group from a service. Removing the last group removes the service.
    pub fn remove_exclusions_group_from_service(&mut self, service_id: &str, group_id: &str) -> bool {
        let changed = match self.find_service_mut(service_id) {
            Some(service) => service.remove_group(group_id),
            None => false,
        };
        if changed {
            self.prune_empty();
        }
        self.commit(
            changed,
            &format!("remove group {} from service {}", group_id, service_id),
        )
    }

    pub fn toggle_exclusions_group_state_in_service(
        &mut self,
        service_id: &str,
        group_id: &str,
    ) -> bool {
        let changed = match self.find_service_group_mut(service_id, group_id) {
            Some(group) => {
                group.toggle();
                true
            }
            None => false,
        };
        self.commit(
            changed,
            &format!("toggle group {} in service {}", group_id, service_id),
        )
    }

    pub fn add_subdomain_to_exclusions_group_in_service(
        &mut self,
        service_id: &str,
        group_id: &str,
        subdomain: &str,
    ) -> Result<bool> {
        let changed = match self.find_service_group_mut(service_id, group_id) {
            Some(group) => group.add_subdomain(subdomain)?,
            None => false,
        };
        Ok(self.commit(
            changed,
            &format!("add subdomain {} to group {} in service {}", subdomain, group_id, service_id),
        ))
    }

    /// Remove a subdomain entry from a service group, pruning emptied groups and services.
    pub fn remove_subdomain_from_exclusions_group_in_service(
        &mut self,
        service_id: &str,
        group_id: &str,
        subdomain_id: &str,
    ) -> bool {
        let changed = match self.find_service_group_mut(service_id, group_id) {
            Some(group) => group.remove_exclusion(subdomain_id),
            None => false,
        };
        if changed {
            self.prune_empty();
        }
        self.commit(
            changed,
            &format!("remove subdomain {} from group {}", subdomain_id, group_id),
        )
    }

    pub fn toggle_subdomain_state_in_exclusions_group_in_service(
        &mut self,
        service_id: &str,
        group_id: &str,
        subdomain_id: &str,
    ) -> bool {
        let changed = match self.find_service_group_mut(service_id, group_id) {
            Some(group) => group.toggle_exclusion(subdomain_id),
            None => false,
        };
        self.commit(
            changed,
            &format!("toggle subdomain {} in group {}", subdomain_id, group_id),
        )
    }

    // ========================================================================
    // Standalone groups
    // ========================================================================

    /// Add a standalone group. Re-adding an existing root re-enables all of its entries.
    pub fn add_exclusions_group(&mut self, hostname: &str) -> Result<()> {
        let root = normalize_hostname(hostname)
            .filter(|h| !is_ip_address(h))
            .ok_or_else(|| ExclusionsError::InvalidHostname(hostname.to_string()))?;

        let changed = match self
            .data
            .exclusions_groups
            .iter_mut()
            .find(|g| g.hostname == root)
        {
            Some(group) => {
                let before = group.clone();
                group.reset_enabled();
                *group != before
            }
            None => {
                self.data
                    .exclusions_groups
                    .push(ExclusionsGroup::from_root(root.clone()));
                true
            }
        };

        self.commit(changed, &format!("add group {}", root));
        Ok(())
    }

    pub fn remove_exclusions_group(&mut self, group_id: &str) -> bool {
        let before = self.data.exclusions_groups.len();
        self.data.exclusions_groups.retain(|g| g.id != group_id);
        let changed = self.data.exclusions_groups.len() != before;
        self.commit(changed, &format!("remove group {}", group_id))
    }

    pub fn toggle_exclusions_group_state(&mut self, group_id: &str) -> bool {
        let changed = match self.find_group_mut(group_id) {
            Some(group) => {
                group.toggle();
                true
            }
            None => false,
        };
        self.commit(changed, &format!("toggle group {}", group_id))
    }

    pub fn add_subdomain_to_exclusions_group(
        &mut self,
        group_id: &str,
        subdomain: &str,
    ) -> Result<bool> {
        let changed = match self.find_group_mut(group_id) {
            Some(group) => group.add_subdomain(subdomain)?,
            None => false,
        };
        Ok(self.commit(
            changed,
            &format!("add subdomain {} to group {}", subdomain, group_id),
        ))
    }

    /// Remove a subdomain entry. Removing the last entry removes the group.
    pub fn remove_subdomain_from_exclusions_group(&mut self, group_id: &str, subdomain_id: &str) -> bool {
        let changed = match self.find_group_mut(group_id) {
            Some(group) => group.remove_exclusion(subdomain_id),
            None => false,
        };
        if changed {
            self.prune_empty();
        }
        self.commit(
            changed,
            &format!("remove subdomain {} from group {}", subdomain_id, group_id),
        )
    }

    pub fn toggle_subdomain_state_in_exclusions_group(
        &mut self,
        group_id: &str,
        subdomain_id: &str,
    ) -> bool {
        let changed = match self.find_group_mut(group_id) {
            Some(group) => group.toggle_exclusion(subdomain_id),
            None => false,
        };
        self.commit(
            changed,
            &format!("toggle subdomain {} in group {}", subdomain_id, group_id),
        )
    }

    // ========================================================================
    // IPs
    // ========================================================================

    /// Add an IP entry. Re-adding an existing address re-enables it.
    pub fn add_ip(&mut self, address: &str) -> Result<()> {
        let address =
            canonical_ip(address).ok_or_else(|| ExclusionsError::InvalidIp(address.to_string()))?;

        let changed = self.apply_ip(&address);
        self.commit(changed, &format!("add ip {}", address));
        Ok(())
    }

    pub fn remove_ip(&mut self, ip_id: &str) -> bool {
        let before = self.data.excluded_ips.len();
        self.data.excluded_ips.retain(|ip| ip.id != ip_id);
        let changed = self.data.excluded_ips.len() != before;
        self.commit(changed, &format!("remove ip {}", ip_id))
    }

    pub fn toggle_ip_state(&mut self, ip_id: &str) -> bool {
        let changed = match self.data.excluded_ips.iter_mut().find(|ip| ip.id == ip_id) {
            Some(ip) => {
                ip.toggle();
                true
            }
            None => false,
        };
        self.commit(changed, &format!("toggle ip {}", ip_id))
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    /// Disable whatever makes `url` excluded, most specific entries first.
    ///
    /// Exact entries (IPs, group entries) are disabled first. Wildcard entries are only
    /// disabled if the hostname is still covered afterwards.
    pub fn disable_exclusion_by_url(&mut self, url: &str) -> bool {
        let Some(hostname) = normalize_hostname(url) else {
            tracing::debug!("Ignoring disable request for malformed url {}", url);
            return false;
        };

        let mut changed = false;
        for ip in &mut self.data.excluded_ips {
            if ip.enabled && ip.hostname == hostname {
                ip.enabled = false;
                changed = true;
            }
        }

        for group in self.all_groups_mut() {
            changed |= group.disable_hostname(&hostname);
        }

        if self.all_groups().any(|g| g.matches(&hostname)) {
            for group in self.all_groups_mut() {
                for entry in &mut group.exclusions {
                    if entry.enabled
                        && is_wildcard_pattern(&entry.hostname)
                        && matches_pattern(&hostname, &entry.hostname)
                    {
                        entry.enabled = false;
                        changed = true;
                    }
                }
            }
        }

        self.commit(changed, &format!("disable {}", hostname))
    }

    pub fn clear_exclusions_data(&mut self) {
        self.data = ExclusionsData::default();
        self.commit(true, "clear exclusions");
    }

    /// Merge a payload into this mode.
    ///
    /// Services match by id, groups by root hostname, entries by hostname and IPs by address.
    /// Matched entities take the payload's enabled flags; unmatched ones are appended with fresh
    /// ids. An invalid payload is rejected before anything is merged.
    pub fn import_exclusions_data(&mut self, payload: &ExclusionsData) -> Result<()> {
        let payload = payload.prepare_import()?;

        for incoming in &payload.excluded_services {
            match self.find_service_mut(&incoming.service_id) {
                Some(service) => service.merge_from(incoming),
                None => self.data.excluded_services.push(incoming.with_fresh_ids()),
            }
        }

        for incoming in &payload.exclusions_groups {
            match self
                .data
                .exclusions_groups
                .iter_mut()
                .find(|g| g.hostname == incoming.hostname)
            {
                Some(group) => group.merge_from(incoming),
                None => self.data.exclusions_groups.push(incoming.with_fresh_ids()),
            }
        }

        for incoming in &payload.excluded_ips {
            match self
                .data
                .excluded_ips
                .iter_mut()
                .find(|ip| ip.hostname == incoming.hostname)
            {
                Some(ip) => ip.enabled = incoming.enabled,
                None => self
                    .data
                    .excluded_ips
                    .push(Exclusion::with_state(incoming.hostname.clone(), incoming.enabled)),
            }
        }

        self.commit(true, "import exclusions");
        Ok(())
    }

    /// Add every hostname of a plain-text list in one batch. Returns how many lines were applied.
    pub fn import_hostnames(&mut self, text: &str) -> usize {
        let lines = parse_hostname_lines(text);

        let exact: HashSet<&str> = lines
            .iter()
            .filter(|line| !line.wildcard)
            .map(|line| line.hostname.as_str())
            .collect();

        let mut changed = false;
        for line in &lines {
            changed |= if line.wildcard {
                self.apply_wildcard_line(&line.hostname, exact.contains(line.hostname.as_str()))
            } else {
                self.apply_hostname(&line.hostname)
            };
        }

        self.commit(changed, &format!("import {} hostnames", lines.len()));
        lines.len()
    }

    /// Apply a `*.root` list line. The exact root only ends up enabled if it was excluded
    /// already or `keep_root` says the list names it too.
    fn apply_wildcard_line(&mut self, root: &str, keep_root: bool) -> bool {
        if self.all_groups().any(|g| g.hostname == root) {
            let mut changed = false;
            for group in self.all_groups_mut().filter(|g| g.hostname == root) {
                changed |= group.enable_wildcard();
            }
            return changed;
        }

        let root_was_excluded = keep_root || self.is_excluded(root);
        let mut changed = self.apply_hostname(root);

        let wildcard = wildcard_pattern(root);
        for group in self.all_groups_mut().filter(|g| g.hostname == root) {
            changed |= group.enable_hostname(&wildcard);
            if !root_was_excluded {
                changed |= group.disable_hostname(root);
            }
        }
        changed
    }

    /// Enabled patterns as a plain-text list.
    pub fn export_hostnames(&self) -> String {
        export_hostnames(&self.data)
    }

    /// Drop groups without entries and services without groups.
    fn prune_empty(&mut self) {
        for service in &mut self.data.excluded_services {
            service.exclusions_groups.retain(|g| !g.exclusions.is_empty());
        }
        self.data
            .excluded_services
            .retain(|s| !s.exclusions_groups.is_empty());
        self.data
            .exclusions_groups
            .retain(|g| !g.exclusions.is_empty());
    }
}

/// Apply an add-by-hostname to a group whose root covers `hostname`.
fn apply_to_group(group: &mut ExclusionsGroup, hostname: &str) -> bool {
    if hostname == group.hostname {
        let before = group.clone();
        group.reset_enabled();
        return *group != before;
    }

    if group.find_by_hostname(hostname).is_some() {
        return group.enable_hostname(hostname);
    }

    // Already covered by the enabled wildcard
    if group.matches(hostname) {
        return false;
    }

    match group.add_subdomain(hostname) {
        Ok(added) => added,
        Err(e) => {
            tracing::debug!("Could not add {} to group {}: {}", hostname, group.hostname, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EmptyCatalog, StaticCatalog};
    use crate::exclusions::exclusion::ExclusionState;
    use parking_lot::Mutex;

    fn catalog() -> Arc<StaticCatalog> {
        Arc::new(
            StaticCatalog::from_json(
                r#"[
                    {
                        "serviceId": "aliexpress",
                        "serviceName": "AliExpress",
                        "domains": [
                            "aliexpress.com", "aliexpress.ru", "alicdn.com",
                            "ae01.alicdn.ru", "aliexpress.us", "alibaba.com"
                        ]
                    },
                    {
                        "serviceId": "single",
                        "serviceName": "Single",
                        "domains": ["single.com"]
                    }
                ]"#,
            )
            .unwrap(),
        )
    }

    fn handler() -> ExclusionsHandler {
        ExclusionsHandler::detached(ExclusionsMode::Regular, catalog())
    }

    fn counting_handler() -> (ExclusionsHandler, Arc<Mutex<usize>>) {
        let saves = Arc::new(Mutex::new(0));
        let counter = saves.clone();
        let handler = ExclusionsHandler::new(
            ExclusionsMode::Regular,
            ExclusionsData::default(),
            catalog(),
            Arc::new(move |_: ExclusionsMode, _: &ExclusionsData| *counter.lock() += 1),
        );
        (handler, saves)
    }

    fn group_hostnames(handler: &ExclusionsHandler) -> Vec<&str> {
        handler
            .get_exclusions()
            .exclusions_groups
            .iter()
            .map(|g| g.hostname.as_str())
            .collect()
    }

    #[test]
    fn test_add_group_scenario() {
        let mut handler = handler();
        handler.add_url_to_exclusions("example.org").unwrap();

        let groups = &handler.get_exclusions().exclusions_groups;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].exclusions.len(), 2);
        assert_eq!(groups[0].state(), ExclusionState::Enabled);

        let group_id = groups[0].id.clone();
        assert!(handler.add_subdomain_to_exclusions_group(&group_id, "test").unwrap());

        let group = handler.find_group(&group_id).unwrap();
        assert_eq!(group.exclusions.len(), 3);
        assert!(group.find_by_hostname("test.example.org").is_some());
        // Explicit subdomain supersedes the wildcard
        assert!(!group.exclusions[1].enabled);
        assert_eq!(group.state(), ExclusionState::PartlyEnabled);

        let root_id = group.exclusions[0].id.clone();
        let sub_id = group.exclusions[2].id.clone();
        handler.toggle_subdomain_state_in_exclusions_group(&group_id, &root_id);
        assert_eq!(
            handler.find_group(&group_id).unwrap().state(),
            ExclusionState::PartlyEnabled
        );

        handler.toggle_subdomain_state_in_exclusions_group(&group_id, &sub_id);
        assert_eq!(
            handler.find_group(&group_id).unwrap().state(),
            ExclusionState::Disabled
        );

        // Re-adding resets every entry to enabled without duplicating anything
        handler.add_url_to_exclusions("https://www.example.org/").unwrap();
        let groups = &handler.get_exclusions().exclusions_groups;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].exclusions.len(), 3);
        assert_eq!(groups[0].state(), ExclusionState::Enabled);
    }

    #[test]
    fn test_add_url_idempotent() {
        let mut handler = handler();
        handler.add_url_to_exclusions("example.org").unwrap();
        handler.add_url_to_exclusions("https://www.example.org/path").unwrap();
        handler.add_url_to_exclusions("http://example.org").unwrap();

        let groups = &handler.get_exclusions().exclusions_groups;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].exclusions.len(), 2);
    }

    #[test]
    fn test_add_url_rejects_malformed() {
        let (mut handler, saves) = counting_handler();
        assert!(handler.add_url_to_exclusions("not a url").is_err());
        assert!(handler.add_url_to_exclusions("").is_err());
        assert!(handler.get_exclusions().is_empty());
        assert_eq!(*saves.lock(), 0);
    }

    #[test]
    fn test_insertion_order() {
        let mut handler = handler();
        handler.add_exclusions_group("test1.com").unwrap();
        handler.add_exclusions_group("a-test.com").unwrap();
        handler.add_exclusions_group("3test.com").unwrap();

        assert_eq!(group_hostnames(&handler), vec!["test1.com", "a-test.com", "3test.com"]);
    }

    #[test]
    fn test_add_url_subdomain_of_existing_group() {
        let mut handler = handler();
        handler.add_url_to_exclusions("example.org").unwrap();

        // Covered by the wildcard: nothing changes
        handler.add_url_to_exclusions("mail.example.org").unwrap();
        assert_eq!(handler.get_exclusions().exclusions_groups[0].exclusions.len(), 2);

        // Wildcard off: the subdomain becomes an explicit entry
        let group_id = handler.get_exclusions().exclusions_groups[0].id.clone();
        let wildcard_id = handler.get_exclusions().exclusions_groups[0].exclusions[1].id.clone();
        handler.toggle_subdomain_state_in_exclusions_group(&group_id, &wildcard_id);
        handler.add_url_to_exclusions("mail.example.org").unwrap();

        let groups = &handler.get_exclusions().exclusions_groups;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].exclusions.len(), 3);
        assert_eq!(groups[0].exclusions[2].hostname, "mail.example.org");
        assert!(handler.is_excluded("mail.example.org"));
        assert!(!handler.is_excluded("other.example.org"));
    }

    #[test]
    fn test_is_excluded() {
        let mut handler = handler();
        handler.add_url_to_exclusions("example.org").unwrap();
        handler.add_ip("192.168.0.1").unwrap();

        assert!(handler.is_excluded("example.org"));
        assert!(handler.is_excluded("https://www.example.org/page"));
        assert!(handler.is_excluded("deep.sub.example.org"));
        assert!(!handler.is_excluded("example.com"));
        assert!(!handler.is_excluded("notexample.org"));
        assert!(handler.is_excluded("192.168.0.1"));
        assert!(!handler.is_excluded("192.168.0.2"));
        assert!(!handler.is_excluded("not a url"));

        let group_id = handler.get_exclusions().exclusions_groups[0].id.clone();
        handler.toggle_exclusions_group_state(&group_id);
        assert!(!handler.is_excluded("example.org"));
        assert!(!handler.is_excluded("sub.example.org"));
    }

    #[test]
    fn test_wildcard_does_not_match_root() {
        let mut handler = handler();
        handler.add_url_to_exclusions("example.org").unwrap();
        let group = &handler.get_exclusions().exclusions_groups[0];
        let (group_id, root_id) = (group.id.clone(), group.exclusions[0].id.clone());

        handler.toggle_subdomain_state_in_exclusions_group(&group_id, &root_id);
        assert!(!handler.is_excluded("example.org"));
        assert!(handler.is_excluded("a.example.org"));
    }

    #[test]
    fn test_add_service_explicit() {
        let mut handler = handler();
        handler.add_service("aliexpress").unwrap();

        let services = &handler.get_exclusions().excluded_services;
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].exclusions_groups.len(), 6);
        assert_eq!(services[0].state(), ExclusionState::Enabled);
    }

    #[test]
    fn test_add_service_unknown() {
        let (mut handler, saves) = counting_handler();
        assert!(matches!(
            handler.add_service("missing"),
            Err(ExclusionsError::UnknownService(_))
        ));
        assert_eq!(*saves.lock(), 0);
    }

    #[test]
    fn test_add_service_implicit() {
        let mut handler = handler();
        handler.add_url_to_exclusions("https://aliexpress.com/item").unwrap();

        let data = handler.get_exclusions();
        assert!(data.exclusions_groups.is_empty());
        assert_eq!(data.excluded_services.len(), 1);

        let service = &data.excluded_services[0];
        assert_eq!(service.exclusions_groups.len(), 6);
        assert_eq!(service.exclusions_groups[0].state(), ExclusionState::Enabled);
        assert!(service.exclusions_groups[1..]
            .iter()
            .all(|g| g.state() == ExclusionState::Disabled));
        assert_eq!(service.state(), ExclusionState::PartlyEnabled);

        assert!(handler.is_excluded("aliexpress.com"));
        assert!(!handler.is_excluded("alibaba.com"));
    }

    #[test]
    fn test_add_single_group_service_implicit() {
        let mut handler = handler();
        handler.add_url_to_exclusions("single.com").unwrap();
        assert_eq!(
            handler.get_exclusions().excluded_services[0].state(),
            ExclusionState::Enabled
        );
    }

    #[test]
    fn test_add_url_enables_more_groups_of_existing_service() {
        let mut handler = handler();
        handler.add_url_to_exclusions("aliexpress.com").unwrap();
        handler.add_url_to_exclusions("alibaba.com").unwrap();

        let service = &handler.get_exclusions().excluded_services[0];
        assert_eq!(handler.get_exclusions().excluded_services.len(), 1);
        assert_eq!(service.exclusions_groups[5].state(), ExclusionState::Enabled);
        assert_eq!(service.state(), ExclusionState::PartlyEnabled);
    }

    #[test]
    fn test_re_add_service_restores_defaults() {
        let mut handler = handler();
        handler.add_url_to_exclusions("aliexpress.com").unwrap();
        let service = &handler.get_exclusions().excluded_services[0];
        let group_id = service.exclusions_groups[2].id.clone();
        handler.remove_exclusions_group_from_service("aliexpress", &group_id);
        assert_eq!(
            handler.get_exclusions().excluded_services[0].exclusions_groups.len(),
            5
        );

        handler.add_service("aliexpress").unwrap();
        let service = &handler.get_exclusions().excluded_services[0];
        assert_eq!(handler.get_exclusions().excluded_services.len(), 1);
        assert_eq!(service.exclusions_groups.len(), 6);
        assert_eq!(service.state(), ExclusionState::Enabled);
    }

    #[test]
    fn test_service_group_operations() {
        let mut handler = handler();
        handler.add_service("aliexpress").unwrap();
        let group_id = handler.get_exclusions().excluded_services[0].exclusions_groups[0]
            .id
            .clone();

        assert!(handler
            .add_subdomain_to_exclusions_group_in_service("aliexpress", &group_id, "m")
            .unwrap());
        let service = handler.find_service("aliexpress").unwrap();
        let group = service.find_group(&group_id).unwrap();
        assert_eq!(group.exclusions[2].hostname, "m.aliexpress.com");
        assert_eq!(service.state(), ExclusionState::PartlyEnabled);

        let sub_id = group.exclusions[2].id.clone();
        assert!(handler.toggle_subdomain_state_in_exclusions_group_in_service(
            "aliexpress",
            &group_id,
            &sub_id
        ));
        assert!(!handler
            .find_service("aliexpress")
            .unwrap()
            .find_group(&group_id)
            .unwrap()
            .exclusions[2]
            .enabled);

        assert!(handler.toggle_exclusions_group_state_in_service("aliexpress", &group_id));
        assert_eq!(
            handler
                .find_service("aliexpress")
                .unwrap()
                .find_group(&group_id)
                .unwrap()
                .state(),
            ExclusionState::Disabled
        );

        assert!(handler.remove_subdomain_from_exclusions_group_in_service(
            "aliexpress",
            &group_id,
            &sub_id
        ));
        assert_eq!(
            handler
                .find_service("aliexpress")
                .unwrap()
                .find_group(&group_id)
                .unwrap()
                .exclusions
                .len(),
            2
        );
    }

    #[test]
    fn test_removing_last_group_removes_service() {
        let mut handler = handler();
        handler.add_service("single").unwrap();
        let group_id = handler.get_exclusions().excluded_services[0].exclusions_groups[0]
            .id
            .clone();

        assert!(handler.remove_exclusions_group_from_service("single", &group_id));
        assert!(handler.get_exclusions().excluded_services.is_empty());
    }

    #[test]
    fn test_toggle_service_state() {
        let mut handler = handler();
        handler.add_url_to_exclusions("aliexpress.com").unwrap();

        assert!(handler.toggle_service_state("aliexpress"));
        assert_eq!(
            handler.find_service("aliexpress").unwrap().state(),
            ExclusionState::Disabled
        );

        assert!(handler.toggle_service_state("aliexpress"));
        assert_eq!(
            handler.find_service("aliexpress").unwrap().state(),
            ExclusionState::Enabled
        );
    }

    #[test]
    fn test_reset_service_data() {
        let mut handler = handler();
        handler.add_service("aliexpress").unwrap();
        let group_id = handler.get_exclusions().excluded_services[0].exclusions_groups[0]
            .id
            .clone();
        handler
            .add_subdomain_to_exclusions_group_in_service("aliexpress", &group_id, "m")
            .unwrap();
        let removed_id = handler.get_exclusions().excluded_services[0].exclusions_groups[3]
            .id
            .clone();
        handler.remove_exclusions_group_from_service("aliexpress", &removed_id);

        assert!(handler.reset_service_data("aliexpress"));
        let service = handler.find_service("aliexpress").unwrap();
        assert_eq!(service.exclusions_groups.len(), 6);
        let first = &service.exclusions_groups[0];
        assert_eq!(first.exclusions.len(), 3);
        assert!(first.exclusions[1].enabled);
        assert_eq!(first.exclusions[2].hostname, "m.aliexpress.com");

        assert!(!handler.reset_service_data("single"));
    }

    #[test]
    fn test_remove_operations_on_unknown_ids_are_noops() {
        let (mut handler, saves) = counting_handler();
        handler.add_url_to_exclusions("example.org").unwrap();
        assert_eq!(*saves.lock(), 1);

        assert!(!handler.remove_exclusions_group("missing"));
        assert!(!handler.remove_service("missing"));
        assert!(!handler.remove_ip("missing"));
        assert!(!handler.toggle_ip_state("missing"));
        assert!(!handler.toggle_exclusions_group_state("missing"));
        assert!(!handler.toggle_subdomain_state_in_exclusions_group("missing", "missing"));
        assert!(!handler.add_subdomain_to_exclusions_group("missing", "x").unwrap());
        assert_eq!(*saves.lock(), 1);
        assert_eq!(handler.get_exclusions().exclusions_groups.len(), 1);
    }

    #[test]
    fn test_save_called_once_per_mutation() {
        let (mut handler, saves) = counting_handler();
        handler.add_url_to_exclusions("example.org").unwrap();
        handler.add_ip("10.0.0.1").unwrap();
        let group_id = handler.get_exclusions().exclusions_groups[0].id.clone();
        handler.toggle_exclusions_group_state(&group_id);
        handler.clear_exclusions_data();
        assert_eq!(*saves.lock(), 4);
    }

    #[test]
    fn test_ips() {
        let mut handler = handler();
        handler.add_ip("10.0.0.1").unwrap();
        handler.add_ip(" 10.0.0.1 ").unwrap();
        assert!(handler.add_ip("10.0.0.300").is_err());
        assert_eq!(handler.get_exclusions().excluded_ips.len(), 1);

        // IP literals passed as URLs land in the IP list
        handler.add_url_to_exclusions("http://10.0.0.2/").unwrap();
        assert_eq!(handler.get_exclusions().excluded_ips.len(), 2);
        assert!(handler.get_exclusions().exclusions_groups.is_empty());

        let ip_id = handler.find_ip_by_address("10.0.0.1").unwrap().id.clone();
        assert!(handler.toggle_ip_state(&ip_id));
        assert!(!handler.is_excluded("10.0.0.1"));

        handler.add_ip("10.0.0.1").unwrap();
        assert!(handler.is_excluded("10.0.0.1"));

        assert!(handler.remove_ip(&ip_id));
        assert_eq!(handler.get_exclusions().excluded_ips.len(), 1);
    }

    #[test]
    fn test_remove_last_subdomain_removes_group() {
        let mut handler = handler();
        handler.add_exclusions_group("example.org").unwrap();
        let group = handler.get_exclusions().exclusions_groups[0].clone();

        assert!(handler.remove_subdomain_from_exclusions_group(&group.id, &group.exclusions[0].id));
        assert_eq!(handler.get_exclusions().exclusions_groups.len(), 1);
        assert!(handler.remove_subdomain_from_exclusions_group(&group.id, &group.exclusions[1].id));
        assert!(handler.get_exclusions().exclusions_groups.is_empty());
    }

    #[test]
    fn test_disable_exclusion_by_url() {
        let mut handler = handler();
        handler.add_url_to_exclusions("example.org").unwrap();
        handler.add_ip("10.0.0.1").unwrap();

        assert!(handler.disable_exclusion_by_url("example.org"));
        let group = &handler.get_exclusions().exclusions_groups[0];
        assert!(!group.exclusions[0].enabled);
        assert!(group.exclusions[1].enabled);
        assert_eq!(group.state(), ExclusionState::PartlyEnabled);

        // Only the wildcard covers this one
        assert!(handler.disable_exclusion_by_url("sub.example.org"));
        assert!(!handler.is_excluded("sub.example.org"));
        assert_eq!(
            handler.get_exclusions().exclusions_groups[0].state(),
            ExclusionState::Disabled
        );

        assert!(handler.disable_exclusion_by_url("10.0.0.1"));
        assert!(!handler.is_excluded("10.0.0.1"));

        assert!(!handler.disable_exclusion_by_url("unrelated.com"));
    }

    #[test]
    fn test_disable_exclusion_by_url_in_service() {
        let mut handler = handler();
        handler.add_service("aliexpress").unwrap();

        assert!(handler.disable_exclusion_by_url("alibaba.com"));
        let service = handler.find_service("aliexpress").unwrap();
        assert_eq!(service.state(), ExclusionState::PartlyEnabled);
        assert!(!handler.is_excluded("alibaba.com"));
    }

    #[test]
    fn test_clear() {
        let mut handler = handler();
        handler.add_url_to_exclusions("example.org").unwrap();
        handler.add_service("single").unwrap();
        handler.add_ip("10.0.0.1").unwrap();

        handler.clear_exclusions_data();
        assert!(handler.get_exclusions().is_empty());
    }

    #[test]
    fn test_import_round_trip() {
        let mut handler = handler();
        handler.add_url_to_exclusions("example.org").unwrap();
        handler.add_url_to_exclusions("aliexpress.com").unwrap();
        handler.add_ip("10.0.0.1").unwrap();
        let group_id = handler.get_exclusions().exclusions_groups[0].id.clone();
        handler.add_subdomain_to_exclusions_group(&group_id, "test").unwrap();

        let exported = handler.get_exclusions().clone();
        handler.import_exclusions_data(&exported).unwrap();
        assert_eq!(handler.get_exclusions(), &exported);
    }

    #[test]
    fn test_reimport_restores_payload_state() {
        let mut source = handler();
        source.add_url_to_exclusions("example.org").unwrap();
        source.add_service("aliexpress").unwrap();
        source.add_ip("10.0.0.1").unwrap();
        let payload = source.get_exclusions().clone();

        let mut handler = ExclusionsHandler::detached(ExclusionsMode::Selective, catalog());
        handler.import_exclusions_data(&payload).unwrap();

        let group_id = handler.get_exclusions().exclusions_groups[0].id.clone();
        let ip_id = handler.get_exclusions().excluded_ips[0].id.clone();
        handler.toggle_exclusions_group_state(&group_id);
        handler.toggle_service_state("aliexpress");
        handler.toggle_ip_state(&ip_id);

        handler.import_exclusions_data(&payload).unwrap();

        let data = handler.get_exclusions();
        assert_eq!(data.exclusions_groups.len(), 1);
        assert_eq!(data.excluded_services.len(), 1);
        assert_eq!(data.excluded_ips.len(), 1);
        assert_eq!(data.exclusions_groups[0].state(), ExclusionState::Enabled);
        assert_eq!(data.excluded_services[0].state(), ExclusionState::Enabled);
        assert!(data.excluded_ips[0].enabled);
    }

    #[test]
    fn test_import_invalid_payload_is_atomic() {
        let (mut handler, saves) = counting_handler();
        let mut payload = ExclusionsData::default();
        payload
            .exclusions_groups
            .push(ExclusionsGroup::create("good.com").unwrap());
        payload.excluded_ips.push(Exclusion::new("garbage"));

        assert!(handler.import_exclusions_data(&payload).is_err());
        assert!(handler.get_exclusions().is_empty());
        assert_eq!(*saves.lock(), 0);
    }

    #[test]
    fn test_hostname_list_import_export() {
        let (mut handler, saves) = counting_handler();
        let applied = handler.import_hostnames("example.org\n*.example.net\nbad host\n10.0.0.1\n");
        assert_eq!(applied, 3);
        assert_eq!(*saves.lock(), 1);

        assert!(handler.is_excluded("example.org"));
        assert!(handler.is_excluded("a.example.net"));
        assert!(handler.is_excluded("10.0.0.1"));

        let exported = handler.export_hostnames();
        assert!(exported.contains("example.org\n"));
        assert!(exported.contains("*.example.net\n"));
    }

    #[test]
    fn test_import_matches_like_added_entries() {
        let mut handler = ExclusionsHandler::detached(ExclusionsMode::Regular, Arc::new(EmptyCatalog));
        let payload: ExclusionsData = serde_json::from_str(
            r#"{
                "exclusionsGroups": [
                    {
                        "id": "g1",
                        "hostname": "www.example.org",
                        "exclusions": [
                            {"id": "e1", "hostname": "www.example.org", "enabled": true},
                            {"id": "e2", "hostname": "*.www.example.org", "enabled": true}
                        ]
                    },
                    {
                        "id": "g2",
                        "hostname": "Example.NET",
                        "exclusions": [{"id": "e3", "hostname": "Example.NET", "enabled": true}]
                    }
                ],
                "excludedIps": [{"id": "i1", "hostname": "0:0::1", "enabled": true}]
            }"#,
        )
        .unwrap();

        handler.import_exclusions_data(&payload).unwrap();

        assert!(handler.is_excluded("www.example.org"));
        assert!(handler.is_excluded("https://example.net/"));
        assert!(handler.is_excluded("::1"));

        handler.add_ip("::1").unwrap();
        handler.add_url_to_exclusions("example.org").unwrap();
        let data = handler.get_exclusions();
        assert_eq!(data.excluded_ips.len(), 1);
        assert_eq!(data.excluded_ips[0].hostname, "::1");
        assert_eq!(group_hostnames(&handler), vec!["example.org", "example.net"]);
    }

    #[test]
    fn test_wildcard_line_does_not_enable_root() {
        let mut handler = handler();
        handler.import_hostnames("*.example.net\n*.example.com\nexample.com\n");

        assert!(handler.is_excluded("a.example.net"));
        assert!(!handler.is_excluded("example.net"));
        assert!(handler.is_excluded("example.com"));
        assert_eq!(
            handler.export_hostnames(),
            "*.example.net\nexample.com\n*.example.com\n"
        );

        // A root that was already excluded stays excluded
        let mut handler = self::handler();
        handler.add_url_to_exclusions("example.org").unwrap();
        let group_id = handler.get_exclusions().exclusions_groups[0].id.clone();
        let wildcard_id = handler.find_group(&group_id).unwrap().exclusions[1].id.clone();
        handler.toggle_subdomain_state_in_exclusions_group(&group_id, &wildcard_id);

        handler.import_hostnames("*.example.org\n");
        assert!(handler.is_excluded("example.org"));
        assert!(handler.is_excluded("a.example.org"));
        assert_eq!(handler.get_exclusions().exclusions_groups.len(), 1);
    }

    #[test]
    fn test_add_url_reuses_service_group_missing_from_catalog() {
        let mut handler = ExclusionsHandler::detached(ExclusionsMode::Regular, Arc::new(EmptyCatalog));
        let mut payload = ExclusionsData::default();
        let mut service = Service::from_definition(&ServiceDefinition {
            service_id: "legacy".to_string(),
            service_name: "Legacy".to_string(),
            categories: vec![],
            icon_url: String::new(),
            modified_time: String::new(),
            domains: vec!["legacy.com".to_string()],
        });
        service.set_enabled(false);
        payload.excluded_services.push(service);
        handler.import_exclusions_data(&payload).unwrap();

        handler.add_url_to_exclusions("legacy.com").unwrap();
        handler.add_url_to_exclusions("cdn.legacy.com").unwrap();

        let data = handler.get_exclusions();
        assert!(data.exclusions_groups.is_empty());
        assert_eq!(data.excluded_services[0].state(), ExclusionState::Enabled);
        assert!(handler.is_excluded("cdn.legacy.com"));
    }

    mod leaf_properties {
        use std::sync::Arc;

        use proptest::prelude::*;

        use crate::catalog::EmptyCatalog;
        use crate::exclusions::{ExclusionState, ExclusionsData, ExclusionsGroup, ExclusionsHandler, ExclusionsMode};

        const ROOTS: [&str; 2] = ["example.org", "example.net"];
        const LABELS: [&str; 3] = ["a", "b", "c.d"];
        const HOSTS: [&str; 10] = [
            "example.org",
            "a.example.org",
            "b.example.org",
            "c.d.example.org",
            "x.c.d.example.org",
            "example.net",
            "a.example.net",
            "deep.a.example.net",
            "badexample.org",
            "other.com",
        ];

        #[derive(Debug, Clone)]
        enum Op {
            AddUrl { root: usize, label: Option<usize> },
            AddSubdomain { group: usize, label: usize },
            ToggleGroup { group: usize },
            ToggleEntry { group: usize, entry: usize },
            RemoveEntry { group: usize, entry: usize },
            RemoveGroup { group: usize },
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..ROOTS.len(), proptest::option::of(0..LABELS.len()))
                    .prop_map(|(root, label)| Op::AddUrl { root, label }),
                (any::<usize>(), 0..LABELS.len())
                    .prop_map(|(group, label)| Op::AddSubdomain { group, label }),
                any::<usize>().prop_map(|group| Op::ToggleGroup { group }),
                (any::<usize>(), any::<usize>())
                    .prop_map(|(group, entry)| Op::ToggleEntry { group, entry }),
                (any::<usize>(), any::<usize>())
                    .prop_map(|(group, entry)| Op::RemoveEntry { group, entry }),
                any::<usize>().prop_map(|group| Op::RemoveGroup { group }),
            ]
        }

        fn group_id(handler: &ExclusionsHandler, index: usize) -> Option<String> {
            let groups = &handler.get_exclusions().exclusions_groups;
            if groups.is_empty() {
                return None;
            }
            Some(groups[index % groups.len()].id.clone())
        }

        fn entry_ids(handler: &ExclusionsHandler, group: usize, entry: usize) -> Option<(String, String)> {
            let group_id = group_id(handler, group)?;
            let group = handler.find_group(&group_id)?;
            if group.exclusions.is_empty() {
                return None;
            }
            let entry_id = group.exclusions[entry % group.exclusions.len()].id.clone();
            Some((group_id, entry_id))
        }

        fn apply(handler: &mut ExclusionsHandler, op: &Op) {
            match *op {
                Op::AddUrl { root, label } => {
                    let url = match label {
                        Some(label) => format!("https://{}.{}/", LABELS[label], ROOTS[root]),
                        None => ROOTS[root].to_string(),
                    };
                    handler.add_url_to_exclusions(&url).unwrap();
                }
                Op::AddSubdomain { group, label } => {
                    if let Some(id) = group_id(handler, group) {
                        handler.add_subdomain_to_exclusions_group(&id, LABELS[label]).unwrap();
                    }
                }
                Op::ToggleGroup { group } => {
                    if let Some(id) = group_id(handler, group) {
                        handler.toggle_exclusions_group_state(&id);
                    }
                }
                Op::ToggleEntry { group, entry } => {
                    if let Some((group_id, entry_id)) = entry_ids(handler, group, entry) {
                        handler.toggle_subdomain_state_in_exclusions_group(&group_id, &entry_id);
                    }
                }
                Op::RemoveEntry { group, entry } => {
                    if let Some((group_id, entry_id)) = entry_ids(handler, group, entry) {
                        handler.remove_subdomain_from_exclusions_group(&group_id, &entry_id);
                    }
                }
                Op::RemoveGroup { group } => {
                    if let Some(id) = group_id(handler, group) {
                        handler.remove_exclusions_group(&id);
                    }
                }
            }
        }

        /// Tri-state computed by counting leaves.
        fn counted_state(group: &ExclusionsGroup) -> ExclusionState {
            let enabled = group.exclusions.iter().filter(|e| e.enabled).count();
            if enabled == 0 {
                ExclusionState::Disabled
            } else if enabled == group.exclusions.len() {
                ExclusionState::Enabled
            } else {
                ExclusionState::PartlyEnabled
            }
        }

        /// Plain suffix check over every enabled leaf.
        fn listed(data: &ExclusionsData, host: &str) -> bool {
            data.exclusions_groups
                .iter()
                .flat_map(|g| g.exclusions.iter())
                .filter(|e| e.enabled)
                .any(|e| match e.hostname.strip_prefix("*.") {
                    Some(base) => host.ends_with(&format!(".{}", base)),
                    None => e.hostname == host,
                })
        }

        proptest! {
            #[test]
            fn group_state_and_matching_follow_leaves(ops in proptest::collection::vec(op(), 1..40)) {
                let mut handler =
                    ExclusionsHandler::detached(ExclusionsMode::Regular, Arc::new(EmptyCatalog));

                for op in &ops {
                    apply(&mut handler, op);

                    for group in &handler.get_exclusions().exclusions_groups {
                        prop_assert_eq!(group.state(), counted_state(group));
                    }
                    for host in HOSTS {
                        prop_assert_eq!(
                            handler.is_excluded(host),
                            listed(handler.get_exclusions(), host),
                            "host {} after {:?}",
                            host,
                            op
                        );
                    }
                }
            }
        }
    }
}
