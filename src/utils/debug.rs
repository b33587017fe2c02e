//! Debug logging utilities.

use tracing_subscriber::EnvFilter;

/// Environment variable for debug mode.
pub const VPNX_DEBUG_ENV: &str = "VPNX_DEBUG";

/// Initialize debug logging based on the VPNX_DEBUG environment variable or explicit flag.
pub fn init_debug_logging(force_debug: bool) {
    let debug_enabled = force_debug || std::env::var(VPNX_DEBUG_ENV).is_ok();

    let filter = if debug_enabled {
        EnvFilter::new("vpn_exclusions=debug,warn")
    } else {
        EnvFilter::new("vpn_exclusions=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(debug_enabled)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
