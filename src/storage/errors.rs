//! Storage engine error types
//!
//! Error codes:
//! - ODB_STORAGE_IO_ERROR
//! - ODB_STORAGE_WRITE_FAILED
//! - ODB_STORAGE_READ_FAILED
//! - ODB_DATA_CORRUPTION
//! - ODB_TRUNCATED_TAIL
//!
//! Corruption and truncation are distinct: a truncated tail is the
//! expected shape of a crash during an append and is tolerated by the
//! loader (the tail is discarded), while corruption anywhere triggers
//! the delete-and-recreate recovery cycle.

use std::fmt;
use std::io;

/// Result type for storage engine operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Disk I/O failure
    IoError,
    /// Record write or fsync failed
    WriteFailed,
    /// Record read failed
    ReadFailed,
    /// Checksum or framing failure
    DataCorruption,
    /// File ends mid-record (crash during append)
    TruncatedTail,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::IoError => "ODB_STORAGE_IO_ERROR",
            StorageErrorCode::WriteFailed => "ODB_STORAGE_WRITE_FAILED",
            StorageErrorCode::ReadFailed => "ODB_STORAGE_READ_FAILED",
            StorageErrorCode::DataCorruption => "ODB_DATA_CORRUPTION",
            StorageErrorCode::TruncatedTail => "ODB_TRUNCATED_TAIL",
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage engine error with code, message, and optional I/O source.
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl StorageError {
    /// Create a storage I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::IoError,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a write-failed error
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::WriteFailed,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a read-failed error
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::ReadFailed,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::DataCorruption,
            message: message.into(),
            source: None,
        }
    }

    /// Create a corruption error at a known byte offset
    pub fn corruption_at_offset(offset: u64, message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::DataCorruption,
            message: format!("at offset {}: {}", offset, message.into()),
            source: None,
        }
    }

    /// Create a truncated-tail error at a known byte offset
    pub fn truncated_tail(offset: u64, message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::TruncatedTail,
            message: format!("at offset {}: {}", offset, message.into()),
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns whether this error represents corruption (as opposed to
    /// a tolerated torn tail or a plain I/O failure).
    pub fn is_corruption(&self) -> bool {
        self.code == StorageErrorCode::DataCorruption
    }

    /// Returns whether this error is a torn tail from an interrupted
    /// append.
    pub fn is_truncated_tail(&self) -> bool {
        self.code == StorageErrorCode::TruncatedTail
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)?;
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}
