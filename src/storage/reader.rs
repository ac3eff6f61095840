//! Storage file reader
//!
//! Sequential reader used on open to rebuild the in-memory tables.
//! Every record's checksum is verified. Failures fall into two
//! classes:
//!
//! - `ODB_TRUNCATED_TAIL`: the file ends mid-record. The expected
//!   shape of a crash during an append; the loader discards the tail.
//! - `ODB_DATA_CORRUPTION`: checksum or framing violation. Triggers
//!   the database's delete-and-recreate recovery.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::header::{StorageHeader, HEADER_LEN};
use super::record::{StorageRecord, MIN_RECORD_SIZE};

/// Sequential, checksum-verifying storage reader.
pub struct StorageReader {
    storage_path: PathBuf,
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl StorageReader {
    /// Opens the storage file for reading.
    pub fn open(storage_path: &Path) -> StorageResult<Self> {
        let file = File::open(storage_path).map_err(|e| {
            StorageError::read_failed(
                format!("Failed to open storage file: {}", storage_path.display()),
                e,
            )
        })?;

        let file_size = file
            .metadata()
            .map_err(|e| StorageError::read_failed("Failed to read file metadata", e))?
            .len();

        Ok(Self {
            storage_path: storage_path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    /// Returns the storage file path.
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    /// Returns the total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Returns the current read offset.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Reads and verifies the file header. Must be the first read.
    pub fn read_header(&mut self) -> StorageResult<StorageHeader> {
        debug_assert_eq!(self.current_offset, 0);

        if self.file_size < HEADER_LEN as u64 {
            return Err(StorageError::corruption(format!(
                "File too short for header: {} bytes",
                self.file_size
            )));
        }

        let mut buf = [0u8; HEADER_LEN];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| StorageError::read_failed("Failed to read header", e))?;
        self.current_offset = HEADER_LEN as u64;

        StorageHeader::decode(&buf)
    }

    /// Reads the next record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` on a verified record
    /// - `Ok(None)` at a clean end of file
    /// - `Err(ODB_TRUNCATED_TAIL)` when the file ends mid-record
    /// - `Err(ODB_DATA_CORRUPTION)` on checksum or framing failure
    pub fn read_next(&mut self) -> StorageResult<Option<StorageRecord>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let record_start = self.current_offset;
        let remaining = self.file_size - record_start;

        if remaining < 4 {
            return Err(StorageError::truncated_tail(
                record_start,
                format!("{} trailing bytes, not enough for a length prefix", remaining),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            StorageError::read_failed(
                format!("Failed to read record length at offset {}", record_start),
                e,
            )
        })?;
        let record_length = u32::from_le_bytes(len_buf) as u64;

        if record_length < MIN_RECORD_SIZE as u64 {
            return Err(StorageError::corruption_at_offset(
                record_start,
                format!("Invalid record length: {}", record_length),
            ));
        }

        // A length running past EOF is what an interrupted append
        // looks like; classify as torn tail, not corruption.
        if record_length > remaining {
            return Err(StorageError::truncated_tail(
                record_start,
                format!(
                    "Record claims {} bytes but only {} remain",
                    record_length, remaining
                ),
            ));
        }

        let mut record_buf = vec![0u8; record_length as usize];
        record_buf[0..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut record_buf[4..]).map_err(|e| {
            StorageError::read_failed(
                format!("Failed to read record at offset {}", record_start),
                e,
            )
        })?;

        let (record, consumed) = StorageRecord::deserialize(&record_buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                StorageError::truncated_tail(record_start, e.to_string())
            } else {
                StorageError::corruption_at_offset(record_start, e.to_string())
            }
        })?;

        self.current_offset += consumed as u64;
        Ok(Some(record))
    }
}
