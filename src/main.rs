//! CLI entry point for the VPN exclusions engine (vpnx).

use std::process::ExitCode;
use std::sync::Arc;

use vpn_exclusions::catalog::{EmptyCatalog, ServiceClassifier, StaticCatalog};
use vpn_exclusions::cli::Cli;
use vpn_exclusions::config::{load_config, load_default_config};
use vpn_exclusions::manager::{ExclusionsManager, JsonFileStorage};
use vpn_exclusions::proxy::SharedDomainFilter;
use vpn_exclusions::utils::init_debug_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_debug_logging(cli.debug);

    // Load configuration
    let config = match cli.get_settings_path() {
        Some(path) if path.exists() => match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config from {:?}: {}", path, e);
                return ExitCode::from(1);
            }
        },
        _ => match load_default_config() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading default config: {}", e);
                return ExitCode::from(1);
            }
        },
    };

    let classifier: Arc<dyn ServiceClassifier> = match config.catalog_path {
        Some(ref path) => match StaticCatalog::load(path) {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                eprintln!("Error loading service catalog from {:?}: {}", path, e);
                return ExitCode::from(1);
            }
        },
        None => Arc::new(EmptyCatalog),
    };

    let storage_path = match cli.storage.clone().or_else(|| config.resolved_storage_path()) {
        Some(path) => path,
        None => {
            eprintln!("No storage path configured and no home directory found.");
            return ExitCode::from(1);
        }
    };
    tracing::debug!("Using exclusions state at {}", storage_path.display());

    // Initialize exclusions manager
    let manager = ExclusionsManager::new(
        classifier,
        Arc::new(JsonFileStorage::new(storage_path)),
        Arc::new(SharedDomainFilter::new()),
        config.save_debounce(),
    );
    if let Err(e) = manager.init().await {
        eprintln!("Failed to load exclusions: {}", e);
        return ExitCode::from(1);
    }

    let result = cli.command.execute(&manager).await;

    // Persist whatever the command changed before exiting
    manager.flush().await;

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}
