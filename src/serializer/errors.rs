//! # Write Serializer Errors

use thiserror::Error;

use crate::database::DatabaseError;

/// Result type for serialized writes
pub type SerializerResult<T> = Result<T, SerializerError>;

/// Errors surfaced by `enqueue_write`
#[derive(Debug, Error)]
pub enum SerializerError {
    /// The write ran and failed. Only this caller sees the error;
    /// queued writes behind it still run.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The worker is gone (store shut down, or the worker task died
    /// mid-write). The completion future still resolves: this error
    /// is the one-resumption guarantee's failure branch.
    #[error("Write worker terminated before completing the write")]
    WorkerTerminated,
}
