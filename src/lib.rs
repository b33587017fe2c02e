//! VPN Exclusions - split-tunnel exclusion management for a VPN client.
//!
//! This library keeps two independent exclusion sets and turns the active one into a bypass list:
//! - Regular mode: listed hosts bypass the VPN
//! - Selective mode: only listed hosts use the VPN
//!
//! Exclusions are organized as services (from a catalog), standalone domain groups and IPs, each
//! with a tri-state enabled flag.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod exclusions;
pub mod manager;
pub mod proxy;
pub mod utils;

pub use catalog::{EmptyCatalog, ServiceClassifier, ServiceDefinition, StaticCatalog};
pub use config::EngineConfig;
pub use error::{ConfigError, ExclusionsError, Result};
pub use exclusions::{
    ExclusionState, ExclusionsData, ExclusionsDocument, ExclusionsGroup, ExclusionsHandler,
    ExclusionsMode, Service,
};
pub use manager::ExclusionsManager;
pub use proxy::{BypassListConsumer, DomainFilter, RouteDecision, SharedDomainFilter};

/// Re-export commonly used items.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::{ExclusionsError, Result};
    pub use crate::exclusions::{ExclusionsData, ExclusionsMode};
    pub use crate::manager::ExclusionsManager;
    pub use crate::proxy::{BypassListConsumer, SharedDomainFilter};
}
