//! Utility modules.

pub mod debug;
pub mod hostname;

pub use debug::{init_debug_logging, VPNX_DEBUG_ENV};
pub use hostname::{
    belongs_to, canonical_ip, canonical_pattern, compose_subdomain, is_ip_address,
    is_subdomain_of, is_valid_hostname, is_wildcard_pattern, matches_pattern, normalize_hostname,
    strip_www, wildcard_pattern,
};
