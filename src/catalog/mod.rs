//! Service catalog: classifies hostnames into well-known services and supplies their defaults.

mod static_catalog;

use serde::{Deserialize, Serialize};

pub use static_catalog::StaticCatalog;

/// A service category as shown in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCategory {
    pub id: String,
    pub name: String,
}

/// Catalog definition of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    pub service_id: String,
    pub service_name: String,
    #[serde(default)]
    pub categories: Vec<ServiceCategory>,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub modified_time: String,
    /// Root domains of the service's groups, in catalog order.
    pub domains: Vec<String>,
}

/// Capability used by the engine to recognize services.
pub trait ServiceClassifier: Send + Sync {
    /// Resolve a normalized hostname to a known service id.
    fn service_id_for(&self, hostname: &str) -> Option<String>;

    /// Look up the catalog definition of a service.
    fn definition(&self, service_id: &str) -> Option<ServiceDefinition>;
}

/// Classifier that knows no services.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl ServiceClassifier for EmptyCatalog {
    fn service_id_for(&self, _hostname: &str) -> Option<String> {
        None
    }

    fn definition(&self, _service_id: &str) -> Option<ServiceDefinition> {
        None
    }
}
