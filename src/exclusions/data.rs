//! Per-mode exclusion data and mode selection.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ExclusionsError, Result};
use crate::exclusions::exclusion::Exclusion;
use crate::exclusions::group::ExclusionsGroup;
use crate::exclusions::service::Service;
use crate::utils::hostname::{canonical_ip, is_ip_address};

/// Which exclusion set is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExclusionsMode {
    /// Listed hostnames bypass the VPN, everything else is tunneled.
    #[default]
    Regular,
    /// Only listed hostnames are tunneled.
    Selective,
}

impl ExclusionsMode {
    pub fn name(self) -> &'static str {
        match self {
            ExclusionsMode::Regular => "regular",
            ExclusionsMode::Selective => "selective",
        }
    }

    /// The mode selected by the manager's `inverted` flag.
    pub fn from_inverted(inverted: bool) -> Self {
        if inverted {
            ExclusionsMode::Selective
        } else {
            ExclusionsMode::Regular
        }
    }

    pub fn is_inverted(self) -> bool {
        matches!(self, ExclusionsMode::Selective)
    }
}

impl fmt::Display for ExclusionsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExclusionsMode {
    type Err = ExclusionsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "regular" => Ok(ExclusionsMode::Regular),
            "selective" => Ok(ExclusionsMode::Selective),
            _ => Err(ExclusionsError::InvalidMode(s.to_string())),
        }
    }
}

/// The full exclusion set of one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionsData {
    #[serde(default)]
    pub excluded_services: Vec<Service>,
    #[serde(default)]
    pub exclusions_groups: Vec<ExclusionsGroup>,
    #[serde(default)]
    pub excluded_ips: Vec<Exclusion>,
}

impl ExclusionsData {
    pub fn is_empty(&self) -> bool {
        self.excluded_services.is_empty()
            && self.exclusions_groups.is_empty()
            && self.excluded_ips.is_empty()
    }

    /// Flatten every enabled pattern into the list pushed to the proxy.
    ///
    /// Order: service groups, standalone groups, then IPs. Duplicates are dropped.
    pub fn bypass_list(&self) -> Vec<String> {
        let service_patterns = self
            .excluded_services
            .iter()
            .flat_map(|s| s.exclusions_groups.iter())
            .flat_map(|g| g.enabled_patterns());
        let group_patterns = self
            .exclusions_groups
            .iter()
            .flat_map(|g| g.enabled_patterns());
        let ip_patterns = self
            .excluded_ips
            .iter()
            .filter(|ip| ip.enabled)
            .map(|ip| ip.hostname.as_str());

        let mut seen = HashSet::new();
        service_patterns
            .chain(group_patterns)
            .chain(ip_patterns)
            .filter(|pattern| seen.insert(*pattern))
            .map(str::to_string)
            .collect()
    }

    /// Canonical, validated copy of an import payload.
    ///
    /// Hostnames get the same normalization as user input and IPs their canonical text form, so
    /// imported entries match the same queries and dedup against the same keys as added ones.
    pub fn prepare_import(&self) -> Result<Self> {
        let excluded_ips = self
            .excluded_ips
            .iter()
            .map(|ip| {
                let hostname = canonical_ip(&ip.hostname).ok_or_else(|| {
                    ExclusionsError::InvalidImport(format!("invalid IP entry '{}'", ip.hostname))
                })?;
                Ok(Exclusion {
                    hostname,
                    ..ip.clone()
                })
            })
            .collect::<Result<_>>()?;

        let canonical = Self {
            excluded_services: self
                .excluded_services
                .iter()
                .map(Service::canonicalized)
                .collect::<Result<_>>()?,
            exclusions_groups: self
                .exclusions_groups
                .iter()
                .map(ExclusionsGroup::canonicalized)
                .collect::<Result<_>>()?,
            excluded_ips,
        };

        canonical.validate()?;
        Ok(canonical)
    }

    /// Structural check of a payload before it is merged anywhere.
    pub fn validate(&self) -> Result<()> {
        for (index, service) in self.excluded_services.iter().enumerate() {
            service.validate()?;
            if self.excluded_services[..index]
                .iter()
                .any(|s| s.service_id == service.service_id)
            {
                return Err(ExclusionsError::InvalidImport(format!(
                    "duplicate service '{}'",
                    service.service_id
                )));
            }
        }

        for (index, group) in self.exclusions_groups.iter().enumerate() {
            group.validate()?;
            if self.exclusions_groups[..index]
                .iter()
                .any(|g| g.hostname == group.hostname)
            {
                return Err(ExclusionsError::InvalidImport(format!(
                    "duplicate group '{}'",
                    group.hostname
                )));
            }
        }

        for ip in &self.excluded_ips {
            if !is_ip_address(&ip.hostname) {
                return Err(ExclusionsError::InvalidImport(format!(
                    "invalid IP entry '{}'",
                    ip.hostname
                )));
            }
        }

        Ok(())
    }
}
