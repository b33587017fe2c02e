//! Hostname normalization and pattern matching.
//!
//! Patterns come in two flavors:
//! - exact: `example.com` matches only `example.com`
//! - wildcard: `*.example.com` matches any proper subdomain of `example.com`, never the root

use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Prefix marking a pattern as "all subdomains of".
pub const WILDCARD_PREFIX: &str = "*.";

const WWW_PREFIX: &str = "www.";

const MAX_HOSTNAME_LEN: usize = 253;

static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9_](?:[a-z0-9_-]{0,61}[a-z0-9_])?\.)*[a-z0-9_](?:[a-z0-9_-]{0,61}[a-z0-9_])?$")
        .expect("hostname regex is valid")
});

/// Normalize a URL or bare hostname to the hostname used for matching.
///
/// Strips the scheme, port, path and a single leading `www.`. IP literals are returned as is
/// (without brackets for IPv6). Returns `None` when no valid hostname can be extracted.
pub fn normalize_hostname(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return Some(ip.to_string());
    }

    let host = extract_host(trimmed)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip.to_string());
    }

    let host = strip_www(host.trim_end_matches('.'));
    if is_valid_hostname(host) {
        Some(host.to_string())
    } else {
        None
    }
}

/// Pull the host component out of something that may or may not carry a scheme.
fn extract_host(input: &str) -> Option<String> {
    let candidate = if input.contains("://") {
        input.to_string()
    } else {
        format!("http://{}", input)
    };

    let url = Url::parse(&candidate).ok()?;
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}

/// Strip one leading `www.` label.
pub fn strip_www(hostname: &str) -> &str {
    match hostname.strip_prefix(WWW_PREFIX) {
        Some(rest) if !rest.is_empty() => rest,
        _ => hostname,
    }
}

/// Check whether a string is a syntactically valid (lowercase) hostname.
pub fn is_valid_hostname(hostname: &str) -> bool {
    !hostname.is_empty() && hostname.len() <= MAX_HOSTNAME_LEN && HOSTNAME_RE.is_match(hostname)
}

/// Check whether a string is an IPv4 or IPv6 literal.
pub fn is_ip_address(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok()
}

/// Canonical text form of an IP literal (`0:0::1` becomes `::1`), brackets allowed.
pub fn canonical_ip(value: &str) -> Option<String> {
    let value = value.trim();
    let value = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    value.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

/// Lowercase a stored pattern and drop a trailing dot. `www.` is left alone.
pub fn canonical_pattern(pattern: &str) -> String {
    pattern.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Build the wildcard pattern covering every subdomain of `root`.
pub fn wildcard_pattern(root: &str) -> String {
    format!("{}{}", WILDCARD_PREFIX, root)
}

/// Check whether a pattern is a wildcard pattern.
pub fn is_wildcard_pattern(pattern: &str) -> bool {
    pattern.starts_with(WILDCARD_PREFIX)
}

/// Check whether `hostname` is a proper subdomain of `root`.
pub fn is_subdomain_of(hostname: &str, root: &str) -> bool {
    hostname.len() > root.len() + 1
        && hostname.ends_with(root)
        && hostname.as_bytes()[hostname.len() - root.len() - 1] == b'.'
}

/// Check whether `hostname` is `root` itself or one of its subdomains.
pub fn belongs_to(hostname: &str, root: &str) -> bool {
    hostname == root || is_subdomain_of(hostname, root)
}

/// Check if a hostname matches an exclusion pattern.
pub fn matches_pattern(hostname: &str, pattern: &str) -> bool {
    let hostname_lower = hostname.to_lowercase();
    let pattern_lower = pattern.to_lowercase();

    if let Some(base_domain) = pattern_lower.strip_prefix(WILDCARD_PREFIX) {
        // *.example.com matches api.example.com but NOT example.com
        is_subdomain_of(&hostname_lower, base_domain)
    } else {
        hostname_lower == pattern_lower
    }
}

/// Compose the full hostname for a subdomain label of `root`.
///
/// Accepts either a bare label (`mail`, `sub.test3`) or a full hostname already ending in `root`.
/// Returns `None` if the result is not a valid proper subdomain.
pub fn compose_subdomain(label: &str, root: &str) -> Option<String> {
    let label = label.trim().trim_matches('.').to_lowercase();
    if label.is_empty() || label == root {
        return None;
    }

    let full = if is_subdomain_of(&label, root) {
        label
    } else {
        format!("{}.{}", label, root)
    };

    if is_valid_hostname(&full) && is_subdomain_of(&full, root) {
        Some(full)
    } else {
        None
    }
}
