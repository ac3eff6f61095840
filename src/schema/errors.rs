//! # Schema Errors

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema versioning errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The on-disk schema version is newer than the configured one.
    /// Downgrades are never silently tolerated and never trigger file
    /// recreation.
    #[error("Schema downgrade: on-disk version {on_disk} is newer than requested version {requested}")]
    Downgrade { on_disk: u64, requested: u64 },

    /// The caller-supplied migration hook reported failure. Treated
    /// like any other open failure: the file is recreated once.
    #[error("Migration from version {from} to {to} failed: {detail}")]
    MigrationFailed { from: u64, to: u64, detail: String },
}
