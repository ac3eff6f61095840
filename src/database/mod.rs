//! Database subsystem for objectdb
//!
//! Owns the open storage file and its lifecycle: lazy open with
//! delete-and-recreate corruption recovery, schema migration,
//! compaction on open, snapshot-isolated reads, and staged write
//! transactions committed with a single fsync.
//!
//! # Invariants Enforced
//!
//! - Reads observe a full pre- or post-transaction state, never a
//!   partial one
//! - At most one write transaction per storage file at a time
//! - On-disk schema version is monotonically non-decreasing
//! - Corruption recovery runs at most one delete-and-retry cycle

#[allow(clippy::module_inception)]
mod database;
mod errors;
mod snapshot;
mod transaction;

pub use database::Database;
pub use errors::{DatabaseError, DatabaseResult};
pub use snapshot::Snapshot;
pub use transaction::WriteTransaction;
