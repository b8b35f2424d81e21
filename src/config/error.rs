//! Configuration error types.

use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse environment variable.
    #[error("failed to parse {key}='{value}': {error}")]
    Parse {
        key: String,
        value: String,
        error: String,
    },
    /// Value parsed but is out of range or inconsistent.
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}
