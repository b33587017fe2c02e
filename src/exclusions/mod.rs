//! The exclusions engine: entities, per-mode handler and transfer formats.

pub mod data;
pub mod exclusion;
pub mod group;
pub mod handler;
pub mod service;
pub mod transfer;

pub use data::{ExclusionsData, ExclusionsMode};
pub use exclusion::{aggregate_state, Exclusion, ExclusionState};
pub use group::ExclusionsGroup;
pub use handler::{ExclusionsHandler, SaveHook};
pub use service::Service;
pub use transfer::{ExclusionsDocument, EXPORT_VERSION};
