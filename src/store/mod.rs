//! Public store API for objectdb
//!
//! `Store` owns one namespace's database and write queue;
//! `ObjectStore<T>` is the typed repository over one record type.
//!
//! # Semantics
//!
//! - Saves are upserts with full-record replace (last write wins)
//! - Reads never fail for "not found": absent is `None` / empty
//! - Deletes and updates of missing records are silent no-ops
//! - Every mutating operation returns after its own commit (or its
//!   own failure), serialized FIFO against all other mutations

mod collection;
mod errors;
mod model;
mod query;
#[allow(clippy::module_inception)]
mod store;

pub use collection::ObjectStore;
pub use errors::{StoreError, StoreResult};
pub use model::Persistable;
pub use query::{FilterOp, Predicate, Query};
pub use store::{Store, StoreBuilder};
