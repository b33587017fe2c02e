//! CLI parsing and execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::exclusions::{ExclusionsDocument, ExclusionsMode};
use crate::manager::ExclusionsManager;
use crate::utils::hostname::{is_ip_address, normalize_hostname};

/// VPN exclusions - manage which hosts bypass (or exclusively use) the tunnel
#[derive(Parser, Debug)]
#[command(name = "vpnx")]
#[command(about = "VPN exclusions - manage split-tunnel bypass lists")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Path to settings file (default: ~/.vpnx-settings.json)
    #[arg(short = 's', long = "settings")]
    pub settings: Option<PathBuf>,

    /// Path to the exclusions state file (overrides the settings file)
    #[arg(long = "storage")]
    pub storage: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Exclude a URL, hostname or IP address in the current mode
    Add { url: String },

    /// Exclude a catalog service with all of its domains
    AddService { service_id: String },

    /// Remove the group, IP or service matching a hostname or service id
    Remove { target: String },

    /// Disable whatever currently excludes a URL
    Disable { url: String },

    /// Check whether a URL is excluded in the current mode
    Check { url: String },

    /// Print the current mode's exclusions as JSON
    List,

    /// Print the flattened bypass list of the current mode
    Bypass,

    /// Show or switch the exclusions mode (regular or selective)
    Mode { mode: Option<String> },

    /// Export both modes as a JSON document
    Export {
        /// Write to a file instead of stdout
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Import a JSON document produced by `export`
    Import { path: PathBuf },

    /// Add every hostname of a plain-text list (one per line)
    ImportList { path: PathBuf },

    /// Remove every exclusion of the current mode
    Clear,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the settings file path.
    pub fn get_settings_path(&self) -> Option<PathBuf> {
        self.settings.clone().or_else(crate::config::default_settings_path)
    }
}

impl Command {
    /// Run the command against an initialized manager and return what should be printed.
    pub async fn execute(&self, manager: &ExclusionsManager) -> Result<String> {
        match self {
            Command::Add { url } => {
                manager.current().add_url_to_exclusions(url)?;
                Ok(format!("Excluded {}", url))
            }
            Command::AddService { service_id } => {
                manager.current().add_service(service_id)?;
                Ok(format!("Excluded service {}", service_id))
            }
            Command::Remove { target } => {
                if remove_target(manager, target) {
                    Ok(format!("Removed {}", target))
                } else {
                    Ok(format!("Nothing to remove for {}", target))
                }
            }
            Command::Disable { url } => {
                if manager.current().disable_exclusion_by_url(url) {
                    Ok(format!("Disabled exclusions for {}", url))
                } else {
                    Ok(format!("{} was not excluded", url))
                }
            }
            Command::Check { url } => {
                let verdict = if manager.is_excluded(url) {
                    "excluded"
                } else {
                    "not excluded"
                };
                Ok(format!("{}: {} ({} mode)", url, verdict, manager.current_mode()))
            }
            Command::List => Ok(serde_json::to_string_pretty(&manager.get_exclusions())?),
            Command::Bypass => Ok(manager.bypass_list().join("\n")),
            Command::Mode { mode: None } => Ok(manager.current_mode().to_string()),
            Command::Mode { mode: Some(mode) } => {
                let mode: ExclusionsMode = mode.parse()?;
                manager.set_current_mode(mode);
                Ok(format!("Mode set to {}", mode))
            }
            Command::Export { output } => {
                let json = manager.export_exclusions().to_json()?;
                match output {
                    Some(path) => {
                        tokio::fs::write(path, json).await?;
                        Ok(format!("Exported to {}", path.display()))
                    }
                    None => Ok(json),
                }
            }
            Command::Import { path } => {
                let json = tokio::fs::read_to_string(path).await?;
                let document = ExclusionsDocument::from_json(&json)?;
                manager.import_exclusions(&document)?;
                Ok(format!("Imported {}", path.display()))
            }
            Command::ImportList { path } => {
                let text = tokio::fs::read_to_string(path).await?;
                let count = manager.current().import_hostnames(&text);
                Ok(format!("Imported {} hostnames", count))
            }
            Command::Clear => {
                manager.current().clear_exclusions_data();
                Ok(format!("Cleared {} exclusions", manager.current_mode()))
            }
        }
    }
}

/// Remove by service id first, then by group root hostname or IP address.
fn remove_target(manager: &ExclusionsManager, target: &str) -> bool {
    let mut handler = manager.current();

    if handler.find_service(target).is_some() {
        return handler.remove_service(target);
    }

    let Some(hostname) = normalize_hostname(target) else {
        return false;
    };

    if is_ip_address(&hostname) {
        let id = handler.find_ip_by_address(&hostname).map(|ip| ip.id.clone());
        return id.map_or(false, |id| handler.remove_ip(&id));
    }

    let id = handler.find_group_by_hostname(&hostname).map(|g| g.id.clone());
    id.map_or(false, |id| handler.remove_exclusions_group(&id))
}
