//! objectdb - A minimal embedded single-writer object store
//!
//! Typed CRUD over a checksummed append-only storage file, with a
//! single-writer FIFO queue for mutations, snapshot-isolated reads,
//! schema-version migration, and delete-and-recreate corruption
//! recovery.

pub mod config;
pub mod database;
pub mod locator;
pub mod observability;
pub mod schema;
pub mod serializer;
pub mod storage;
pub mod store;
