//! Store facade
//!
//! Wires the locator, database, and write serializer together for one
//! namespace and hands out typed collections. Opening a second store
//! for a different namespace is independent — nothing is shared
//! process-wide.

use std::path::Path;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::database::Database;
use crate::locator::{ContainerResolver, FileLocator, NoContainerResolver};
use crate::schema::{MigrationContext, SchemaRegistry};
use crate::serializer::WriteSerializer;

use super::collection::ObjectStore;
use super::errors::StoreResult;
use super::model::Persistable;

/// Open store for one namespace.
///
/// Cheap to clone; all clones share the same database handle and
/// write queue.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    serializer: Arc<WriteSerializer>,
}

impl Store {
    /// Opens the store with default options (no migration hook, no
    /// shared-container resolution).
    ///
    /// Must be called within a tokio runtime; the write worker is
    /// spawned on it.
    pub fn open(config: StorageConfig) -> StoreResult<Self> {
        Self::builder(config).open()
    }

    /// Starts a builder for customized opening.
    pub fn builder(config: StorageConfig) -> StoreBuilder {
        StoreBuilder {
            config,
            registry: SchemaRegistry::new(),
            resolver: Box::new(NoContainerResolver),
        }
    }

    /// Typed collection for one record type.
    pub fn collection<T: Persistable>(&self) -> ObjectStore<T> {
        ObjectStore::new(self.db.clone(), self.serializer.clone())
    }

    /// Deletes every record of every type in one transaction.
    pub async fn delete_all(&self) -> StoreResult<()> {
        self.serializer
            .enqueue_write(|tx| {
                tx.clear_all();
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Path of the underlying storage file.
    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Schema version the store was opened with.
    pub fn schema_version(&self) -> u64 {
        self.db.schema_version()
    }
}

/// Builder for [`Store::open`] with a migration hook and/or a
/// shared-container resolver.
pub struct StoreBuilder {
    config: StorageConfig,
    registry: SchemaRegistry,
    resolver: Box<dyn ContainerResolver>,
}

impl StoreBuilder {
    /// Sets the migration hook run when the on-disk schema version is
    /// older than the configured one.
    pub fn with_migration<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut MigrationContext<'_>, u64, u64) -> Result<(), String> + Send + Sync + 'static,
    {
        self.registry = SchemaRegistry::with_hook(hook);
        self
    }

    /// Sets the resolver used for the configured shared-container
    /// identifier.
    pub fn with_container_resolver(mut self, resolver: Box<dyn ContainerResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Opens the store. Must be called within a tokio runtime.
    pub fn open(self) -> StoreResult<Store> {
        self.config.validate()?;
        let locator = FileLocator::new(&self.config, self.resolver);
        let db = Arc::new(Database::open(&self.config, &locator, &self.registry)?);
        let serializer = Arc::new(WriteSerializer::spawn(Arc::downgrade(&db)));

        Ok(Store { db, serializer })
    }
}
