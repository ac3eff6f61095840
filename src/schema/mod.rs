//! Schema versioning for objectdb
//!
//! Every storage file is tagged with the schema version its records
//! conform to. Opening with a newer configured version runs the
//! caller-supplied migration hook and rewrites the file; opening with
//! an older one is a downgrade and fails.
//!
//! # Design Principles
//!
//! - On-disk schema version is monotonically non-decreasing
//! - Downgrade is a fatal configuration error, never silent
//! - Default migration is a no-op (version bump only)

mod errors;
mod registry;

pub use errors::{SchemaError, SchemaResult};
pub use registry::{MigrationContext, MigrationHook, SchemaRegistry, Tables};
