//! Storage file header
//!
//! Fixed-size header at offset 0:
//!
//! ```text
//! +------------------+
//! | Magic "ODB1"     | (4 bytes)
//! +------------------+
//! | Format Version   | (u32 LE)
//! +------------------+
//! | Schema Version   | (u64 LE)
//! +------------------+
//! | Checksum         | (u32 LE, over the preceding 16 bytes)
//! +------------------+
//! ```
//!
//! The schema version recorded here is what the open path compares
//! against the configured version to detect migrations and downgrades.

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{StorageError, StorageResult};

/// File magic, first four bytes of every storage file.
pub const MAGIC: [u8; 4] = *b"ODB1";

/// On-disk format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Total encoded header length in bytes.
pub const HEADER_LEN: usize = 4 + 4 + 8 + 4;

/// Decoded storage file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageHeader {
    /// On-disk format version.
    pub format_version: u32,
    /// Schema version the file's records conform to.
    pub schema_version: u64,
}

impl StorageHeader {
    /// Header for a freshly created file at `schema_version`.
    pub fn new(schema_version: u64) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            schema_version,
        }
    }

    /// Encode the header to its fixed-size byte representation.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.schema_version.to_le_bytes());
        let checksum = compute_checksum(&buf[0..16]);
        buf[16..20].copy_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Decode and verify a header from `data`.
    ///
    /// # Errors
    ///
    /// Returns `ODB_DATA_CORRUPTION` for a short buffer, wrong magic,
    /// unknown format version, or checksum mismatch.
    pub fn decode(data: &[u8]) -> StorageResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(StorageError::corruption(format!(
                "Header too short: {} bytes, expected {}",
                data.len(),
                HEADER_LEN
            )));
        }

        let stored_checksum =
            u32::from_le_bytes([data[16], data[17], data[18], data[19]]);
        if !verify_checksum(&data[0..16], stored_checksum) {
            return Err(StorageError::corruption("Header checksum mismatch"));
        }

        if data[0..4] != MAGIC {
            return Err(StorageError::corruption("Bad magic: not a storage file"));
        }

        let format_version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if format_version != FORMAT_VERSION {
            return Err(StorageError::corruption(format!(
                "Unknown format version: {}",
                format_version
            )));
        }

        let schema_version = u64::from_le_bytes([
            data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
        ]);

        Ok(Self {
            format_version,
            schema_version,
        })
    }
}
