//! Schema registry and migration dispatch
//!
//! The registry compares the schema version tagged in the storage file
//! header against the configured version:
//!
//! - equal: no-op
//! - on-disk older: the caller-supplied migration hook (default no-op)
//!   runs with mutable access to every loaded table, after which the
//!   file is rewritten under the new version
//! - on-disk newer: a downgrade, reported as a fatal configuration
//!   error and never attempted

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::errors::{SchemaError, SchemaResult};
use crate::observability::Logger;

/// Loaded record payloads, keyed by type name then object id.
pub type Tables = BTreeMap<String, BTreeMap<String, Value>>;

/// Mutable view of all loaded records handed to a migration hook.
///
/// The hook transforms records in place; whatever it leaves behind is
/// persisted under the new schema version.
pub struct MigrationContext<'a> {
    tables: &'a mut Tables,
}

impl<'a> MigrationContext<'a> {
    pub(crate) fn new(tables: &'a mut Tables) -> Self {
        Self { tables }
    }

    /// Type names present in the store.
    pub fn type_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Mutable access to all records of one type. Creates the table
    /// when absent so hooks can seed new types.
    pub fn records_mut(&mut self, type_name: &str) -> &mut BTreeMap<String, Value> {
        self.tables.entry(type_name.to_string()).or_default()
    }

    /// Drops every record of one type.
    pub fn remove_type(&mut self, type_name: &str) {
        self.tables.remove(type_name);
    }
}

/// Migration hook signature. `Err` aborts the open attempt.
pub type MigrationHook =
    Arc<dyn Fn(&mut MigrationContext<'_>, u64, u64) -> Result<(), String> + Send + Sync>;

/// Tracks the configured schema version policy and dispatches
/// migration hooks.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    hook: Option<MigrationHook>,
}

impl SchemaRegistry {
    /// Registry with the default no-op migration hook.
    pub fn new() -> Self {
        Self { hook: None }
    }

    /// Registry with a caller-supplied migration hook.
    pub fn with_hook<F>(hook: F) -> Self
    where
        F: Fn(&mut MigrationContext<'_>, u64, u64) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            hook: Some(Arc::new(hook)),
        }
    }

    /// Runs the migration policy for `old_version` on disk against the
    /// configured `new_version`.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::Downgrade`] when `old_version > new_version`
    /// - [`SchemaError::MigrationFailed`] when the hook reports failure
    pub fn migrate(
        &self,
        old_version: u64,
        new_version: u64,
        tables: &mut Tables,
    ) -> SchemaResult<()> {
        if old_version == new_version {
            return Ok(());
        }

        if old_version > new_version {
            return Err(SchemaError::Downgrade {
                on_disk: old_version,
                requested: new_version,
            });
        }

        Logger::info(
            "schema_migration",
            &[
                ("from", &old_version.to_string()),
                ("to", &new_version.to_string()),
            ],
        );

        if let Some(hook) = &self.hook {
            let mut ctx = MigrationContext::new(tables);
            hook(&mut ctx, old_version, new_version).map_err(|detail| {
                SchemaError::MigrationFailed {
                    from: old_version,
                    to: new_version,
                    detail,
                }
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tables_with(type_name: &str, id: &str, value: Value) -> Tables {
        let mut tables = Tables::new();
        tables
            .entry(type_name.to_string())
            .or_default()
            .insert(id.to_string(), value);
        tables
    }

    #[test]
    fn test_equal_versions_noop() {
        let registry = SchemaRegistry::with_hook(|_, _, _| {
            panic!("hook must not run for equal versions");
        });
        let mut tables = Tables::new();
        registry.migrate(3, 3, &mut tables).unwrap();
    }

    #[test]
    fn test_downgrade_is_fatal_config_error() {
        let registry = SchemaRegistry::new();
        let mut tables = Tables::new();

        let err = registry.migrate(2, 1, &mut tables).unwrap_err();
        assert_eq!(
            err,
            SchemaError::Downgrade {
                on_disk: 2,
                requested: 1
            }
        );
    }

    #[test]
    fn test_upgrade_without_hook_is_noop() {
        let registry = SchemaRegistry::new();
        let mut tables = tables_with("contact", "a", json!({"id": "a"}));

        registry.migrate(1, 2, &mut tables).unwrap();
        assert_eq!(tables["contact"]["a"], json!({"id": "a"}));
    }

    #[test]
    fn test_hook_transforms_records() {
        let registry = SchemaRegistry::with_hook(|ctx, old, new| {
            assert_eq!((old, new), (1, 2));
            for value in ctx.records_mut("contact").values_mut() {
                value["renamed"] = json!(true);
            }
            Ok(())
        });
        let mut tables = tables_with("contact", "a", json!({"id": "a"}));

        registry.migrate(1, 2, &mut tables).unwrap();
        assert_eq!(tables["contact"]["a"]["renamed"], json!(true));
    }

    #[test]
    fn test_hook_failure_propagates() {
        let registry = SchemaRegistry::with_hook(|_, _, _| Err("unmapped field".to_string()));
        let mut tables = Tables::new();

        let err = registry.migrate(1, 2, &mut tables).unwrap_err();
        assert!(matches!(err, SchemaError::MigrationFailed { from: 1, to: 2, .. }));
    }

    #[test]
    fn test_context_remove_type() {
        let registry = SchemaRegistry::with_hook(|ctx, _, _| {
            ctx.remove_type("obsolete");
            Ok(())
        });
        let mut tables = tables_with("obsolete", "x", json!({}));

        registry.migrate(1, 2, &mut tables).unwrap();
        assert!(tables.get("obsolete").is_none());
    }
}
