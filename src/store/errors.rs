//! # Store Errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::database::DatabaseError;
use crate::serializer::SerializerError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Public error surface of the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Serializer(#[from] SerializerError),

    /// A record failed to serialize or deserialize
    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
