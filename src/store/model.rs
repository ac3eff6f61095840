//! Persistable record types
//!
//! Any serde-serializable type with a stable string identifier can be
//! stored. The bound is a capability set, not a base class: records
//! are plain owned values on the way in and on the way out, and only
//! identifiers ever cross an execution-context boundary.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record type storable in an [`ObjectStore`](super::ObjectStore).
///
/// `TYPE_NAME` names the record's collection inside the storage file
/// and must be stable across releases (it is part of the persisted
/// data). `id` must be unique within the type.
pub trait Persistable: Serialize + DeserializeOwned + Send + 'static {
    /// Collection name inside the storage file.
    const TYPE_NAME: &'static str;

    /// Stable unique identifier of this record.
    fn id(&self) -> &str;
}
