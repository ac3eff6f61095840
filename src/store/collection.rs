//! Typed object collections
//!
//! `ObjectStore<T>` is the typed repository over one record type.
//! Reads hit the current snapshot directly; every mutation is a
//! closure enqueued on the store's write serializer and awaited until
//! that specific write commits or fails.

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::database::{Database, DatabaseError};
use crate::serializer::WriteSerializer;

use super::errors::StoreResult;
use super::model::Persistable;
use super::query::Query;

/// Typed repository for one record type.
pub struct ObjectStore<T: Persistable> {
    db: Arc<Database>,
    serializer: Arc<WriteSerializer>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Persistable> Clone for ObjectStore<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            serializer: self.serializer.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Persistable> ObjectStore<T> {
    pub(crate) fn new(db: Arc<Database>, serializer: Arc<WriteSerializer>) -> Self {
        Self {
            db,
            serializer,
            _marker: PhantomData,
        }
    }

    /// Loads one record by id from the current snapshot.
    ///
    /// Absence is `Ok(None)`, never an error.
    pub fn load_by_id(&self, id: &str) -> StoreResult<Option<T>> {
        match self.db.snapshot().get(T::TYPE_NAME, id) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Loads every record matching `query` (all records when `None`).
    ///
    /// No match is an empty vec, never an error.
    pub fn load_matching(&self, query: Option<&Query>) -> StoreResult<Vec<T>> {
        let snapshot = self.db.snapshot();
        let mut records = Vec::new();
        for (_, value) in snapshot.records(T::TYPE_NAME) {
            if query.map_or(true, |q| q.matches(value)) {
                records.push(serde_json::from_value(value.clone())?);
            }
        }
        Ok(records)
    }

    /// Upserts one record: insert if absent, full replace if present.
    pub async fn save(&self, object: &T) -> StoreResult<()> {
        let id = object.id().to_string();
        let value = serde_json::to_value(object)?;

        self.serializer
            .enqueue_write(move |tx| {
                tx.put(T::TYPE_NAME, &id, value);
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Upserts a batch of records in one transaction.
    pub async fn save_batch(&self, objects: &[T]) -> StoreResult<()> {
        let mut entries = Vec::with_capacity(objects.len());
        for object in objects {
            entries.push((object.id().to_string(), serde_json::to_value(object)?));
        }

        self.serializer
            .enqueue_write(move |tx| {
                for (id, value) in entries {
                    tx.put(T::TYPE_NAME, &id, value);
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Upserts `objects` and deletes every record matching `query`
    /// whose id is not among them, in one transaction.
    ///
    /// The keep set is read from the snapshot before the write is
    /// enqueued. With `query` absent the delete scope is every record
    /// of this type — reconciling against an empty query replaces the
    /// whole collection.
    pub async fn save_reconciling(
        &self,
        objects: &[T],
        delete_rest_matching: Option<&Query>,
    ) -> StoreResult<()> {
        let snapshot = self.db.snapshot();
        let mut stale: BTreeSet<String> = snapshot
            .records(T::TYPE_NAME)
            .filter(|(_, value)| delete_rest_matching.map_or(true, |q| q.matches(value)))
            .map(|(id, _)| id.clone())
            .collect();

        let mut entries = Vec::with_capacity(objects.len());
        for object in objects {
            stale.remove(object.id());
            entries.push((object.id().to_string(), serde_json::to_value(object)?));
        }

        self.serializer
            .enqueue_write(move |tx| {
                for (id, value) in entries {
                    tx.put(T::TYPE_NAME, &id, value);
                }
                for id in stale {
                    tx.remove(T::TYPE_NAME, &id);
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Re-fetches the record by id inside the write transaction and
    /// applies `mutator` to it.
    ///
    /// Only the identifier crosses the execution-context boundary. A
    /// record deleted by an earlier queued write resolves to nothing
    /// and the update is a silent no-op.
    pub async fn update<F>(&self, id: &str, mutator: F) -> StoreResult<()>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        let id = id.to_string();

        self.serializer
            .enqueue_write(move |tx| {
                let value = match tx.get(T::TYPE_NAME, &id) {
                    Some(value) => value,
                    None => return Ok(()),
                };

                let mut object: T = serde_json::from_value(value).map_err(|e| {
                    DatabaseError::WriteFailed(format!(
                        "stored payload for {}/{} failed to deserialize: {}",
                        T::TYPE_NAME,
                        id,
                        e
                    ))
                })?;
                mutator(&mut object);

                let value = serde_json::to_value(&object).map_err(|e| {
                    DatabaseError::WriteFailed(format!(
                        "mutated record {}/{} failed to serialize: {}",
                        T::TYPE_NAME,
                        id,
                        e
                    ))
                })?;
                tx.put(T::TYPE_NAME, &id, value);
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Deletes one record by id. A missing record is a silent no-op.
    pub async fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();

        self.serializer
            .enqueue_write(move |tx| {
                tx.remove(T::TYPE_NAME, &id);
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Deletes every record matching `query` (all records of this
    /// type when `None`).
    pub async fn delete_all_matching(&self, query: Option<&Query>) -> StoreResult<()> {
        let query = query.cloned();

        self.serializer
            .enqueue_write(move |tx| {
                let targets: Vec<String> = tx
                    .records(T::TYPE_NAME)
                    .into_iter()
                    .filter(|(_, value)| query.as_ref().map_or(true, |q| q.matches(value)))
                    .map(|(id, _)| id)
                    .collect();
                for id in targets {
                    tx.remove(T::TYPE_NAME, &id);
                }
                Ok(())
            })
            .await?;
        Ok(())
    }
}
