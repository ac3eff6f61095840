//! # Database Errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::schema::SchemaError;
use crate::storage::StorageError;

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database lifecycle and write errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A write transaction failed; only the submitting caller sees
    /// this, queued writes behind it are unaffected.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// This process already has the storage file open. At most one
    /// writer exists per file; open a second namespace instead.
    #[error("Storage file already open in this process: {path}")]
    AlreadyOpen { path: String },

    /// Open failed even after deleting and recreating the storage
    /// file. Non-retryable.
    #[error("Storage file unusable after recreation: {path}: {detail}")]
    Unrecoverable { path: String, detail: String },
}

impl DatabaseError {
    /// Whether an open failure with this error should be answered by
    /// deleting the file and retrying once with a clean one.
    ///
    /// Corruption, I/O trouble, and migration failures qualify; a
    /// schema downgrade or invalid configuration never does.
    pub fn triggers_recreation(&self) -> bool {
        match self {
            DatabaseError::Storage(_) => true,
            DatabaseError::Schema(SchemaError::MigrationFailed { .. }) => true,
            DatabaseError::Schema(SchemaError::Downgrade { .. }) => false,
            DatabaseError::Config(_) => false,
            DatabaseError::WriteFailed(_) => false,
            DatabaseError::AlreadyOpen { .. } => false,
            DatabaseError::Unrecoverable { .. } => false,
        }
    }
}
