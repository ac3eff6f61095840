//! Storage engine for objectdb
//!
//! A checksummed append-only record file holds the canonical
//! persistent state of every object. Writes are transactional: a
//! batch of put/delete records followed by a commit marker, one fsync
//! per transaction. The loader applies batches only at commit
//! boundaries, so a crash never exposes a half-applied transaction.
//!
//! # Design Principles
//!
//! - Append-only (no in-place updates); latest committed record wins
//! - CRC32 verified on every read
//! - Torn tails discarded (crash tolerance); checksum mismatch is
//!   corruption and triggers delete-and-recreate recovery
//! - Schema version tagged in the file header
//! - Compaction and migration rewrite via temp file + atomic rename

mod checksum;
mod errors;
mod header;
mod reader;
mod record;
mod writer;

pub use checksum::compute_checksum;
pub use errors::{StorageError, StorageErrorCode, StorageResult};
pub use header::{StorageHeader, FORMAT_VERSION, HEADER_LEN, MAGIC};
pub use reader::StorageReader;
pub use record::{RecordKind, StorageRecord, MIN_RECORD_SIZE};
pub use writer::StorageWriter;
