//! Storage file writer
//!
//! Append-only writer, one fsync per committed transaction. All
//! records of a transaction plus its commit marker go out in a single
//! `write_all` followed by `sync_all`, so a crash leaves either no
//! trace of the transaction or a torn tail the loader discards —
//! never an applied half-transaction.
//!
//! The writer also performs full-file rewrites (compaction, schema
//! version bumps) via a temp file and an atomic rename.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::header::StorageHeader;
use super::record::StorageRecord;

/// Append-only writer for one storage file.
pub struct StorageWriter {
    storage_path: PathBuf,
    file: File,
    current_offset: u64,
}

impl StorageWriter {
    /// Creates a fresh storage file containing only `header`,
    /// truncating anything already at `path`.
    pub fn create(path: &Path, header: &StorageHeader) -> StorageResult<Self> {
        let mut file = File::create(path).map_err(|e| {
            StorageError::write_failed(
                format!("Failed to create storage file: {}", path.display()),
                e,
            )
        })?;

        file.write_all(&header.encode())
            .map_err(|e| StorageError::write_failed("Failed to write header", e))?;
        file.sync_all()
            .map_err(|e| StorageError::write_failed("fsync failed after writing header", e))?;
        drop(file);

        Self::open_existing(path)
    }

    /// Opens an existing storage file for appending.
    pub fn open_existing(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to open storage file: {}", path.display()),
                    e,
                )
            })?;

        let current_offset = file
            .metadata()
            .map_err(|e| StorageError::write_failed("Failed to read file metadata", e))?
            .len();

        Ok(Self {
            storage_path: path.to_path_buf(),
            file,
            current_offset,
        })
    }

    /// Truncates the storage file to `len` bytes, then opens it for
    /// appending. Used after the loader discarded a torn or
    /// uncommitted tail: the stale bytes must leave the file before
    /// anything is appended behind them, or a later open would parse
    /// them again.
    pub fn open_truncated(path: &Path, len: u64) -> StorageResult<Self> {
        let file = OpenOptions::new().write(true).open(path).map_err(|e| {
            StorageError::write_failed(
                format!("Failed to open storage file: {}", path.display()),
                e,
            )
        })?;
        file.set_len(len)
            .map_err(|e| StorageError::write_failed("Failed to truncate stale tail", e))?;
        file.sync_all()
            .map_err(|e| StorageError::write_failed("fsync failed after truncation", e))?;
        drop(file);

        Self::open_existing(path)
    }

    /// Rewrites the storage file from scratch with `header` and one
    /// committed transaction containing `records`, then reopens for
    /// appending. Used by compaction and schema migration.
    ///
    /// The rewrite targets a sibling temp file and replaces the
    /// original with an atomic rename, so a crash mid-rewrite leaves
    /// the old file intact.
    pub fn rewrite(
        path: &Path,
        header: &StorageHeader,
        records: Vec<StorageRecord>,
    ) -> StorageResult<Self> {
        let tmp_path = path.with_extension("odb.rewrite");

        {
            let mut tmp = File::create(&tmp_path).map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to create rewrite file: {}", tmp_path.display()),
                    e,
                )
            })?;

            let mut buf: Vec<u8> = Vec::new();
            buf.extend_from_slice(&header.encode());
            if !records.is_empty() {
                for record in &records {
                    buf.extend_from_slice(&record.serialize());
                }
                buf.extend_from_slice(&StorageRecord::commit().serialize());
            }

            tmp.write_all(&buf)
                .map_err(|e| StorageError::write_failed("Failed to write rewrite file", e))?;
            tmp.sync_all()
                .map_err(|e| StorageError::write_failed("fsync failed on rewrite file", e))?;
        }

        fs::rename(&tmp_path, path).map_err(|e| {
            StorageError::write_failed(
                format!("Failed to replace storage file: {}", path.display()),
                e,
            )
        })?;

        Self::open_existing(path)
    }

    /// Returns the storage file path.
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    /// Returns the current file size in bytes.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Appends a transaction: all of `ops` followed by a commit
    /// marker, flushed with one fsync.
    ///
    /// An empty `ops` slice is a no-op commit and writes nothing.
    ///
    /// # Errors
    ///
    /// Returns `ODB_STORAGE_WRITE_FAILED` when the write or fsync
    /// fails; in that case nothing is considered committed.
    pub fn append_transaction(&mut self, ops: &[StorageRecord]) -> StorageResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut buf: Vec<u8> = Vec::new();
        for op in ops {
            buf.extend_from_slice(&op.serialize());
        }
        buf.extend_from_slice(&StorageRecord::commit().serialize());

        self.file
            .write_all(&buf)
            .map_err(|e| StorageError::write_failed("Failed to append transaction", e))?;
        self.file
            .sync_all()
            .map_err(|e| StorageError::write_failed("fsync failed after transaction", e))?;

        self.current_offset += buf.len() as u64;
        Ok(())
    }
}
