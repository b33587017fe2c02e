//! Error types for the exclusions engine.

use thiserror::Error;

/// Main error type for the exclusions engine.
#[derive(Error, Debug)]
pub enum ExclusionsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid hostname '{0}'")]
    InvalidHostname(String),

    #[error("Invalid subdomain '{subdomain}': {reason}")]
    InvalidSubdomain { subdomain: String, reason: String },

    #[error("Invalid IP address '{0}'")]
    InvalidIp(String),

    #[error("Unknown service '{0}'")]
    UnknownService(String),

    #[error("Unknown exclusions mode '{0}'")]
    InvalidMode(String),

    #[error("Invalid import payload: {0}")]
    InvalidImport(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Bypass list sync failed: {0}")]
    BypassSync(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ExclusionsError>;
