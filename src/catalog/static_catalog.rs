//! In-memory catalog loaded from a JSON snapshot.

use std::path::Path;

use crate::catalog::{ServiceClassifier, ServiceDefinition};
use crate::error::{ConfigError, ExclusionsError};
use crate::utils::hostname::{belongs_to, normalize_hostname};

/// Catalog backed by a fixed list of service definitions.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    services: Vec<ServiceDefinition>,
}

impl StaticCatalog {
    /// Create a catalog from definitions. Domains are normalized; unparseable ones are dropped.
    pub fn new(services: Vec<ServiceDefinition>) -> Self {
        let services = services
            .into_iter()
            .map(|mut service| {
                service.domains = service
                    .domains
                    .iter()
                    .filter_map(|domain| {
                        let normalized = normalize_hostname(domain);
                        if normalized.is_none() {
                            tracing::warn!(
                                "Dropping invalid domain '{}' from service {}",
                                domain,
                                service.service_id
                            );
                        }
                        normalized
                    })
                    .collect();
                service
            })
            .collect();

        Self { services }
    }

    /// Parse a catalog from a JSON array of service definitions.
    pub fn from_json(json: &str) -> Result<Self, ExclusionsError> {
        let services: Vec<ServiceDefinition> = serde_json::from_str(json).map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse service catalog: {}", e))
        })?;
        Ok(Self::new(services))
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ExclusionsError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::ParseError(format!("Failed to read service catalog: {}", e))
        })?;

        Self::from_json(&content)
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }
}

impl ServiceClassifier for StaticCatalog {
    fn service_id_for(&self, hostname: &str) -> Option<String> {
        // The most specific domain wins when services overlap
        self.services
            .iter()
            .flat_map(|service| {
                service
                    .domains
                    .iter()
                    .filter(|domain| belongs_to(hostname, domain))
                    .map(move |domain| (domain.len(), service))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, service)| service.service_id.clone())
    }

    fn definition(&self, service_id: &str) -> Option<ServiceDefinition> {
        self.services
            .iter()
            .find(|service| service.service_id == service_id)
            .cloned()
    }
}
