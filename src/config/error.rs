//! Configuration error types

use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Failed to read or parse configuration sources
    #[error("Configuration load error: {0}")]
    LoadError(#[from] config::ConfigError),

    /// Environment variable error
    #[error("Environment error: {0}")]
    EnvVarError(String),

    /// A setting failed semantic validation
    #[error("Invalid configuration for {key}: {reason}")]
    Invalid { key: String, reason: String },
}
