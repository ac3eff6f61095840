//! Write transactions
//!
//! A transaction stages put/delete operations against the committed
//! tables without touching them. On commit the staged operations are
//! appended to the storage file (with a commit marker and one fsync)
//! and only then applied in memory. Dropping the transaction, or a
//! closure error, discards the staged operations — rollback is free.
//!
//! Reads inside the transaction observe staged state layered over the
//! committed base, so a closure sees its own earlier writes.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::schema::Tables;
use crate::storage::StorageRecord;

/// Staged view over the committed tables.
pub struct WriteTransaction<'a> {
    base: &'a Tables,
    /// `Some(value)` = staged upsert, `None` = staged delete.
    staged: BTreeMap<String, BTreeMap<String, Option<Value>>>,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(base: &'a Tables) -> Self {
        Self {
            base,
            staged: BTreeMap::new(),
        }
    }

    /// Looks up a record as the transaction currently sees it.
    pub fn get(&self, type_name: &str, id: &str) -> Option<Value> {
        if let Some(staged) = self.staged.get(type_name).and_then(|t| t.get(id)) {
            return staged.clone();
        }
        self.base.get(type_name).and_then(|t| t.get(id)).cloned()
    }

    /// Stages an upsert. Full-record replace: whatever was stored
    /// under this id before is gone after commit.
    pub fn put(&mut self, type_name: &str, id: &str, value: Value) {
        self.staged
            .entry(type_name.to_string())
            .or_default()
            .insert(id.to_string(), Some(value));
    }

    /// Stages a delete. A missing record is a silent no-op.
    pub fn remove(&mut self, type_name: &str, id: &str) {
        if self.get(type_name, id).is_none() {
            return;
        }
        self.staged
            .entry(type_name.to_string())
            .or_default()
            .insert(id.to_string(), None);
    }

    /// All records of one type as the transaction sees them, in id
    /// order.
    pub fn records(&self, type_name: &str) -> Vec<(String, Value)> {
        let staged = self.staged.get(type_name);
        let mut merged: BTreeMap<String, Value> = BTreeMap::new();

        if let Some(base) = self.base.get(type_name) {
            for (id, value) in base {
                merged.insert(id.clone(), value.clone());
            }
        }
        if let Some(staged) = staged {
            for (id, op) in staged {
                match op {
                    Some(value) => {
                        merged.insert(id.clone(), value.clone());
                    }
                    None => {
                        merged.remove(id);
                    }
                }
            }
        }

        merged.into_iter().collect()
    }

    /// Stages a delete for every visible record of every type.
    pub fn clear_all(&mut self) {
        let type_names: Vec<String> = self
            .base
            .keys()
            .chain(self.staged.keys())
            .cloned()
            .collect();
        for type_name in type_names {
            for (id, _) in self.records(&type_name) {
                self.remove(&type_name, &id);
            }
        }
    }

    /// Whether the transaction staged anything.
    pub fn is_empty(&self) -> bool {
        self.staged.values().all(|t| t.is_empty())
    }

    /// Consumes the transaction into its staged map for the commit
    /// path.
    pub(crate) fn into_staged(
        self,
    ) -> BTreeMap<String, BTreeMap<String, Option<Value>>> {
        self.staged
    }
}

/// Converts a staged map into its storage-record representation.
pub(crate) fn staged_to_records(
    staged: &BTreeMap<String, BTreeMap<String, Option<Value>>>,
) -> Result<Vec<StorageRecord>, serde_json::Error> {
    let mut records = Vec::new();
    for (type_name, table) in staged {
        for (id, op) in table {
            match op {
                Some(value) => {
                    records.push(StorageRecord::put(
                        type_name.clone(),
                        id.clone(),
                        serde_json::to_vec(value)?,
                    ));
                }
                None => records.push(StorageRecord::delete(type_name.clone(), id.clone())),
            }
        }
    }
    Ok(records)
}

/// Applies a staged map to the committed tables. Called only after the
/// storage append succeeded.
pub(crate) fn apply_staged(
    tables: &mut Tables,
    staged: BTreeMap<String, BTreeMap<String, Option<Value>>>,
) {
    for (type_name, table) in staged {
        let target = tables.entry(type_name).or_default();
        for (id, op) in table {
            match op {
                Some(value) => {
                    target.insert(id, value);
                }
                None => {
                    target.remove(&id);
                }
            }
        }
    }
    tables.retain(|_, table| !table.is_empty());
}
