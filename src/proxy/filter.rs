//! Domain filtering driven by the bypass list.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::ExclusionsError;
use crate::utils::hostname::matches_pattern;

/// Receives the flattened bypass list whenever the active exclusions change.
pub trait BypassListConsumer: Send + Sync {
    /// Replace the current bypass list. `inverted` selects allow-list semantics.
    fn set_bypass_list(&self, patterns: &[String], inverted: bool) -> Result<(), ExclusionsError>;
}

/// Routing decision for a hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Send the connection through the VPN.
    Tunnel,
    /// Connect directly, bypassing the VPN.
    Bypass,
}

/// Domain filter built from a bypass list.
///
/// In regular mode the list is a block list: listed hostnames bypass the tunnel. In inverted
/// (selective) mode it is an allow list: only listed hostnames are tunneled.
#[derive(Debug, Clone, Default)]
pub struct DomainFilter {
    patterns: Vec<String>,
    inverted: bool,
}

impl DomainFilter {
    pub fn new(patterns: Vec<String>, inverted: bool) -> Self {
        Self { patterns, inverted }
    }

    /// Create a filter that tunnels everything.
    pub fn tunnel_all() -> Self {
        Self::default()
    }

    /// Decide how a hostname is routed.
    pub fn check(&self, hostname: &str) -> RouteDecision {
        let listed = self
            .patterns
            .iter()
            .any(|pattern| matches_pattern(hostname, pattern));

        match (self.inverted, listed) {
            (false, true) | (true, false) => RouteDecision::Bypass,
            (false, false) | (true, true) => RouteDecision::Tunnel,
        }
    }

    /// Check if a hostname goes through the VPN.
    pub fn is_tunneled(&self, hostname: &str) -> bool {
        self.check(hostname) == RouteDecision::Tunnel
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }
}

/// A [`DomainFilter`] that is swapped in place on every bypass-list push.
#[derive(Debug, Default)]
pub struct SharedDomainFilter {
    filter: RwLock<DomainFilter>,
    updates: AtomicUsize,
}

impl SharedDomainFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current filter.
    pub fn snapshot(&self) -> DomainFilter {
        self.filter.read().clone()
    }

    pub fn check(&self, hostname: &str) -> RouteDecision {
        self.filter.read().check(hostname)
    }

    /// Number of bypass lists received so far.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl BypassListConsumer for SharedDomainFilter {
    fn set_bypass_list(&self, patterns: &[String], inverted: bool) -> Result<(), ExclusionsError> {
        *self.filter.write() = DomainFilter::new(patterns.to_vec(), inverted);
        self.updates.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            "Bypass list updated: {} patterns (inverted: {})",
            patterns.len(),
            inverted
        );
        Ok(())
    }
}
