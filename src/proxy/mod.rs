//! Downstream proxy side: consumers of the bypass list.

pub mod filter;

pub use filter::{BypassListConsumer, DomainFilter, RouteDecision, SharedDomainFilter};
