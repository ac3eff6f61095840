//! # Configuration Errors

use thiserror::Error;

/// Result type for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
///
/// Misconfiguration is reported to the caller, never answered with a
/// process abort.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Namespace must not be empty")]
    EmptyNamespace,

    #[error("Namespace contains path components: {0}")]
    InvalidNamespace(String),
}
