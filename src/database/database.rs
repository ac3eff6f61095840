//! Database handle: open, recover, compact, commit
//!
//! The database owns one storage file. Opening resolves the path,
//! loads committed records into memory, runs migration, and maybe
//! compacts. An open failure of the corruption class is answered by
//! deleting the file and retrying once with a clean one — an explicit,
//! documented data-loss-on-corruption policy. A second failure is
//! [`DatabaseError::Unrecoverable`].
//!
//! Reads clone an `Arc` to the current snapshot and never take the
//! writer lock. Writes stage against the committed tables, append to
//! the file with one fsync, apply in memory, and publish a fresh
//! snapshot — that publication is the refresh signal that makes the
//! commit visible to subsequent reads.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use crate::config::StorageConfig;
use crate::locator::FileLocator;
use crate::observability::Logger;
use crate::schema::{SchemaRegistry, Tables};
use crate::storage::{
    RecordKind, StorageError, StorageHeader, StorageReader, StorageRecord, StorageWriter,
    HEADER_LEN,
};

use super::errors::{DatabaseError, DatabaseResult};
use super::snapshot::Snapshot;
use super::transaction::{apply_staged, staged_to_records, WriteTransaction};

/// Storage paths currently open in this process. A path stays
/// registered for as long as its [`Database`] is alive, which keeps
/// the file under exactly one writer.
fn open_paths() -> &'static Mutex<BTreeSet<PathBuf>> {
    static OPEN_PATHS: OnceLock<Mutex<BTreeSet<PathBuf>>> = OnceLock::new();
    OPEN_PATHS.get_or_init(|| Mutex::new(BTreeSet::new()))
}

/// Registration of one open storage path; deregisters on drop.
struct OpenGuard {
    key: PathBuf,
}

impl OpenGuard {
    fn acquire(path: &Path) -> Option<Self> {
        let key = Self::key_for(path);
        let mut open = match open_paths().lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if open.insert(key.clone()) {
            Some(Self { key })
        } else {
            None
        }
    }

    /// Canonicalizes the parent so two spellings of one directory
    /// collide on the same key. The file itself may not exist yet.
    fn key_for(path: &Path) -> PathBuf {
        match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => match parent.canonicalize() {
                Ok(parent) => parent.join(name),
                Err(_) => path.to_path_buf(),
            },
            _ => path.to_path_buf(),
        }
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        let mut open = match open_paths().lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        open.remove(&self.key);
    }
}

/// Writer-side state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Idle,
    TransactionOpen,
    Committing,
    Failed,
}

struct WriterState {
    writer: StorageWriter,
    tables: Tables,
    state: WriteState,
}

/// Open handle to one namespace's storage file.
pub struct Database {
    path: PathBuf,
    schema_version: u64,
    snapshot: RwLock<Arc<Snapshot>>,
    writer: Mutex<WriterState>,
    _open_guard: OpenGuard,
}

/// Result of replaying one storage file.
struct LoadedFile {
    header: StorageHeader,
    tables: Tables,
    /// Bytes occupied by the header plus live (latest committed)
    /// records. The compaction trigger compares this to `total_bytes`.
    used_bytes: u64,
    total_bytes: u64,
    /// File offset just past the last commit marker. Anything behind
    /// it is a discarded tail and must be truncated away before new
    /// appends.
    committed_bytes: u64,
}

impl Database {
    /// Opens (or creates) the storage file for `config`.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::Config`] for invalid configuration
    /// - [`DatabaseError::Schema`] for a schema downgrade
    /// - [`DatabaseError::AlreadyOpen`] when this process already has
    ///   the file open
    /// - [`DatabaseError::Unrecoverable`] when the file stays unusable
    ///   after one delete-and-recreate cycle
    pub fn open(
        config: &StorageConfig,
        locator: &FileLocator,
        registry: &SchemaRegistry,
    ) -> DatabaseResult<Self> {
        config.validate()?;
        let path = locator.resolve(&config.file_name());

        if let Some(parent) = path.parent() {
            // Best-effort: a real problem resurfaces as an open failure
            let _ = fs::create_dir_all(parent);
        }

        let open_guard = OpenGuard::acquire(&path).ok_or_else(|| DatabaseError::AlreadyOpen {
            path: path.display().to_string(),
        })?;

        let (writer, tables) = match Self::try_open(&path, config, registry) {
            Ok(opened) => opened,
            Err(e) if e.triggers_recreation() => {
                Logger::warn(
                    "storage_file_recreated",
                    &[
                        ("path", &path.display().to_string()),
                        ("reason", &e.to_string()),
                    ],
                );
                let _ = fs::remove_file(&path);
                Self::try_open(&path, config, registry).map_err(|retry| {
                    DatabaseError::Unrecoverable {
                        path: path.display().to_string(),
                        detail: retry.to_string(),
                    }
                })?
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            path,
            schema_version: config.schema_version,
            snapshot: RwLock::new(Arc::new(Snapshot::new(tables.clone()))),
            writer: Mutex::new(WriterState {
                writer,
                tables,
                state: WriteState::Idle,
            }),
            _open_guard: open_guard,
        })
    }

    /// One open attempt: load, migrate, maybe rewrite.
    fn try_open(
        path: &Path,
        config: &StorageConfig,
        registry: &SchemaRegistry,
    ) -> DatabaseResult<(StorageWriter, Tables)> {
        if !path.exists() {
            let writer = StorageWriter::create(path, &StorageHeader::new(config.schema_version))?;
            return Ok((writer, Tables::new()));
        }

        let loaded = Self::load(path)?;
        let mut tables = loaded.tables;

        registry.migrate(loaded.header.schema_version, config.schema_version, &mut tables)?;
        let migrated = loaded.header.schema_version != config.schema_version;

        let compact = !migrated
            && config
                .compaction
                .should_compact(loaded.total_bytes, loaded.used_bytes);
        if compact {
            Logger::info(
                "compaction",
                &[
                    ("path", &path.display().to_string()),
                    ("total_bytes", &loaded.total_bytes.to_string()),
                    ("used_bytes", &loaded.used_bytes.to_string()),
                ],
            );
        }

        let writer = if migrated || compact {
            StorageWriter::rewrite(
                path,
                &StorageHeader::new(config.schema_version),
                Self::live_records(&tables)?,
            )?
        } else if loaded.committed_bytes < loaded.total_bytes {
            // A discarded tail must leave the file before anything is
            // appended behind it, or a later open would replay it
            StorageWriter::open_truncated(path, loaded.committed_bytes)?
        } else {
            StorageWriter::open_existing(path)?
        };

        Ok((writer, tables))
    }

    /// Replays the record file into tables, applying op batches only
    /// at commit boundaries.
    fn load(path: &Path) -> DatabaseResult<LoadedFile> {
        let mut reader = StorageReader::open(path)?;
        let header = reader.read_header()?;
        let total_bytes = reader.file_size();

        let mut tables = Tables::new();
        let mut live_sizes: BTreeMap<(String, String), u64> = BTreeMap::new();
        let mut pending: Vec<(StorageRecord, u64)> = Vec::new();
        let mut committed_bytes = HEADER_LEN as u64;

        loop {
            let record_start = reader.current_offset();
            match reader.read_next() {
                Ok(Some(record)) => {
                    let size = reader.current_offset() - record_start;
                    if record.kind == RecordKind::Commit {
                        for (op, op_size) in pending.drain(..) {
                            Self::apply_loaded(&mut tables, &mut live_sizes, op, op_size)?;
                        }
                        committed_bytes = reader.current_offset();
                    } else {
                        pending.push((record, size));
                    }
                }
                Ok(None) => break,
                Err(e) if e.is_truncated_tail() => {
                    Logger::warn(
                        "torn_tail_discarded",
                        &[
                            ("path", &path.display().to_string()),
                            ("detail", &e.to_string()),
                        ],
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !pending.is_empty() {
            Logger::warn(
                "uncommitted_tail_discarded",
                &[
                    ("path", &path.display().to_string()),
                    ("records", &pending.len().to_string()),
                ],
            );
        }

        let used_bytes = HEADER_LEN as u64 + live_sizes.values().sum::<u64>();
        Ok(LoadedFile {
            header,
            tables,
            used_bytes,
            total_bytes,
            committed_bytes,
        })
    }

    fn apply_loaded(
        tables: &mut Tables,
        live_sizes: &mut BTreeMap<(String, String), u64>,
        op: StorageRecord,
        op_size: u64,
    ) -> DatabaseResult<()> {
        let key = (op.type_name.clone(), op.object_id.clone());
        match op.kind {
            RecordKind::Put => {
                let value = serde_json::from_slice(&op.payload).map_err(|e| {
                    StorageError::corruption(format!(
                        "Record payload for {}/{} is not valid JSON: {}",
                        op.type_name, op.object_id, e
                    ))
                })?;
                tables
                    .entry(op.type_name)
                    .or_default()
                    .insert(op.object_id, value);
                live_sizes.insert(key, op_size);
            }
            RecordKind::Delete => {
                if let Some(table) = tables.get_mut(&op.type_name) {
                    table.remove(&op.object_id);
                    if table.is_empty() {
                        tables.remove(&op.type_name);
                    }
                }
                live_sizes.remove(&key);
            }
            RecordKind::Commit => {}
        }
        Ok(())
    }

    fn live_records(tables: &Tables) -> DatabaseResult<Vec<StorageRecord>> {
        let mut records = Vec::new();
        for (type_name, table) in tables {
            for (id, value) in table {
                let payload = serde_json::to_vec(value).map_err(|e| {
                    DatabaseError::WriteFailed(format!("payload serialization failed: {}", e))
                })?;
                records.push(StorageRecord::put(type_name.clone(), id.clone(), payload));
            }
        }
        Ok(records)
    }

    /// Runs `job` inside a write transaction and commits it.
    ///
    /// The job's staged operations hit the file (with a commit marker
    /// and one fsync) before they become visible to reads. A job error
    /// rolls the transaction back and leaves committed state and the
    /// storage file untouched.
    pub fn write<F>(&self, job: F) -> DatabaseResult<()>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> DatabaseResult<()>,
    {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| DatabaseError::WriteFailed("writer lock poisoned".to_string()))?;
        let WriterState {
            writer,
            tables,
            state,
        } = &mut *guard;

        // A transaction is never open here: each job gets the whole
        // transaction and composes into it instead of nesting.
        if matches!(*state, WriteState::TransactionOpen | WriteState::Committing) {
            return Err(DatabaseError::WriteFailed(
                "transaction already open on this handle".to_string(),
            ));
        }
        *state = WriteState::TransactionOpen;

        let staged = {
            let mut tx = WriteTransaction::new(tables);
            match job(&mut tx) {
                Ok(()) => tx.into_staged(),
                Err(e) => {
                    *state = WriteState::Idle;
                    return Err(e);
                }
            }
        };

        *state = WriteState::Committing;

        let records = match staged_to_records(&staged) {
            Ok(records) => records,
            Err(e) => {
                *state = WriteState::Idle;
                return Err(DatabaseError::WriteFailed(format!(
                    "payload serialization failed: {}",
                    e
                )));
            }
        };

        if let Err(e) = writer.append_transaction(&records) {
            *state = WriteState::Failed;
            return Err(e.into());
        }

        apply_staged(tables, staged);
        self.publish(Arc::new(Snapshot::new(tables.clone())));
        *state = WriteState::Idle;
        Ok(())
    }

    fn publish(&self, snapshot: Arc<Snapshot>) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// Current committed snapshot. Cheap (`Arc` clone) and never
    /// blocked by an in-flight write.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured schema version.
    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompactionPolicy;
    use serde_json::json;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir, version: u64) -> StorageConfig {
        StorageConfig::new(dir.path(), "testdb", version)
    }

    fn open(config: &StorageConfig) -> Database {
        let locator = FileLocator::private_only(config);
        Database::open(config, &locator, &SchemaRegistry::new()).unwrap()
    }

    #[test]
    fn test_fresh_open_creates_file() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1);
        let db = open(&config);

        assert!(db.path().exists());
        assert_eq!(db.snapshot().count("contact"), 0);
    }

    #[test]
    fn test_write_then_snapshot_then_reopen() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1);

        {
            let db = open(&config);
            db.write(|tx| {
                tx.put("contact", "a", json!({"id": "a", "name": "Ada"}));
                Ok(())
            })
            .unwrap();

            assert_eq!(
                db.snapshot().get("contact", "a"),
                Some(&json!({"id": "a", "name": "Ada"}))
            );
        }

        // Committed state survives reopen
        let db = open(&config);
        assert_eq!(
            db.snapshot().get("contact", "a"),
            Some(&json!({"id": "a", "name": "Ada"}))
        );
    }

    #[test]
    fn test_job_error_rolls_back() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1);
        let db = open(&config);

        let result = db.write(|tx| {
            tx.put("contact", "a", json!({"id": "a"}));
            Err(DatabaseError::WriteFailed("caller abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(db.snapshot().get("contact", "a"), None);

        // The handle keeps working
        db.write(|tx| {
            tx.put("contact", "b", json!({"id": "b"}));
            Ok(())
        })
        .unwrap();
        assert!(db.snapshot().get("contact", "b").is_some());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1);
        let db = open(&config);

        db.write(|tx| {
            tx.put("contact", "a", json!({"v": 1}));
            Ok(())
        })
        .unwrap();
        let before = db.snapshot();

        db.write(|tx| {
            tx.put("contact", "a", json!({"v": 2}));
            Ok(())
        })
        .unwrap();

        assert_eq!(before.get("contact", "a"), Some(&json!({"v": 1})));
        assert_eq!(db.snapshot().get("contact", "a"), Some(&json!({"v": 2})));
    }

    #[test]
    fn test_corrupted_file_is_recreated() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1);

        {
            let db = open(&config);
            db.write(|tx| {
                tx.put("contact", "a", json!({"id": "a"}));
                Ok(())
            })
            .unwrap();
        }

        let path = dir.path().join("testdb.odb");
        let mut contents = fs::read(&path).unwrap();
        let mid = contents.len() / 2;
        contents[mid] ^= 0xFF;
        fs::write(&path, contents).unwrap();

        // Opens clean, previous data lost by policy
        let db = open(&config);
        assert_eq!(db.snapshot().get("contact", "a"), None);

        // And stays usable
        db.write(|tx| {
            tx.put("contact", "b", json!({"id": "b"}));
            Ok(())
        })
        .unwrap();
        assert!(db.snapshot().get("contact", "b").is_some());
    }

    #[test]
    fn test_torn_tail_keeps_committed_prefix() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1);

        {
            let db = open(&config);
            db.write(|tx| {
                tx.put("contact", "a", json!({"id": "a"}));
                Ok(())
            })
            .unwrap();
            db.write(|tx| {
                tx.put("contact", "b", json!({"id": "b"}));
                Ok(())
            })
            .unwrap();
        }

        // Cut into the middle of the second transaction
        let path = dir.path().join("testdb.odb");
        let contents = fs::read(&path).unwrap();
        fs::write(&path, &contents[..contents.len() - 7]).unwrap();

        let db = open(&config);
        assert!(db.snapshot().get("contact", "a").is_some());
        assert_eq!(db.snapshot().get("contact", "b"), None);
    }

    #[test]
    fn test_commits_after_torn_tail_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1);

        {
            let db = open(&config);
            db.write(|tx| {
                tx.put("contact", "a", json!({"id": "a"}));
                Ok(())
            })
            .unwrap();
            db.write(|tx| {
                tx.put("contact", "b", json!({"id": "b"}));
                Ok(())
            })
            .unwrap();
        }

        let path = dir.path().join("testdb.odb");
        let contents = fs::read(&path).unwrap();
        fs::write(&path, &contents[..contents.len() - 7]).unwrap();

        // Reopen discards the torn tail, then commits a new write
        {
            let db = open(&config);
            db.write(|tx| {
                tx.put("contact", "c", json!({"id": "c"}));
                Ok(())
            })
            .unwrap();
        }

        // The torn bytes were truncated away, so the next open must not
        // mistake them for corruption and throw the new commit away
        let db = open(&config);
        assert!(db.snapshot().get("contact", "a").is_some());
        assert!(db.snapshot().get("contact", "c").is_some());
        assert_eq!(db.snapshot().get("contact", "b"), None);
    }

    #[test]
    fn test_discarded_uncommitted_op_stays_discarded() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1);

        {
            let db = open(&config);
            db.write(|tx| {
                tx.put("contact", "a", json!({"id": "a"}));
                Ok(())
            })
            .unwrap();
        }

        // Commit-less put, the shape a crash mid-append leaves behind
        let path = dir.path().join("testdb.odb");
        let mut contents = fs::read(&path).unwrap();
        contents.extend_from_slice(
            &StorageRecord::put("contact", "ghost", b"{\"id\":\"ghost\"}".to_vec()).serialize(),
        );
        fs::write(&path, contents).unwrap();

        {
            let db = open(&config);
            assert_eq!(db.snapshot().get("contact", "ghost"), None);
            db.write(|tx| {
                tx.put("contact", "b", json!({"id": "b"}));
                Ok(())
            })
            .unwrap();
        }

        // The new transaction's commit marker must not retroactively
        // commit the discarded op
        let db = open(&config);
        assert_eq!(db.snapshot().get("contact", "ghost"), None);
        assert!(db.snapshot().get("contact", "a").is_some());
        assert!(db.snapshot().get("contact", "b").is_some());
    }

    #[test]
    fn test_second_open_of_same_path_refused() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1);
        let db = open(&config);

        let locator = FileLocator::private_only(&config);
        let err = match Database::open(&config, &locator, &SchemaRegistry::new()) {
            Ok(_) => panic!("second open of one path must be refused"),
            Err(e) => e,
        };
        assert!(matches!(err, DatabaseError::AlreadyOpen { .. }));
        assert!(!err.triggers_recreation());

        // Closing the handle releases the path
        drop(db);
        let db = open(&config);
        assert!(db.path().exists());
    }

    #[test]
    fn test_uncommitted_batch_is_discarded() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1);

        {
            let db = open(&config);
            db.write(|tx| {
                tx.put("contact", "a", json!({"id": "a"}));
                Ok(())
            })
            .unwrap();
        }

        // Append a put with no commit marker behind it
        let path = dir.path().join("testdb.odb");
        let mut contents = fs::read(&path).unwrap();
        contents.extend_from_slice(
            &StorageRecord::put("contact", "ghost", b"{}".to_vec()).serialize(),
        );
        fs::write(&path, contents).unwrap();

        let db = open(&config);
        assert!(db.snapshot().get("contact", "a").is_some());
        assert_eq!(db.snapshot().get("contact", "ghost"), None);
    }

    #[test]
    fn test_downgrade_refused_and_file_preserved() {
        let dir = TempDir::new().unwrap();

        {
            let config = config_in(&dir, 2);
            let db = open(&config);
            db.write(|tx| {
                tx.put("contact", "a", json!({"id": "a"}));
                Ok(())
            })
            .unwrap();
        }

        let config = config_in(&dir, 1);
        let locator = FileLocator::private_only(&config);
        let err = match Database::open(&config, &locator, &SchemaRegistry::new()) {
            Ok(_) => panic!("downgrade must be refused"),
            Err(e) => e,
        };
        assert!(matches!(
            err,
            DatabaseError::Schema(crate::schema::SchemaError::Downgrade { on_disk: 2, requested: 1 })
        ));

        // Downgrade must not delete: reopening at version 2 still works
        let config = config_in(&dir, 2);
        let db = open(&config);
        assert!(db.snapshot().get("contact", "a").is_some());
    }

    #[test]
    fn test_migration_bumps_header_and_runs_hook() {
        let dir = TempDir::new().unwrap();

        {
            let config = config_in(&dir, 1);
            let db = open(&config);
            db.write(|tx| {
                tx.put("contact", "a", json!({"id": "a"}));
                Ok(())
            })
            .unwrap();
        }

        let config = config_in(&dir, 2);
        let locator = FileLocator::private_only(&config);
        let registry = SchemaRegistry::with_hook(|ctx, _, _| {
            for value in ctx.records_mut("contact").values_mut() {
                value["migrated"] = json!(true);
            }
            Ok(())
        });
        let db = Database::open(&config, &locator, &registry).unwrap();
        assert_eq!(db.snapshot().get("contact", "a").unwrap()["migrated"], json!(true));
        drop(db);

        // Header carries the new version now: reopening at 2 with a
        // panicking hook must not run it
        let registry = SchemaRegistry::with_hook(|_, _, _| panic!("must not migrate again"));
        let db = Database::open(&config, &locator, &registry).unwrap();
        assert_eq!(db.schema_version(), 2);
    }

    #[test]
    fn test_failed_migration_recreates_file() {
        let dir = TempDir::new().unwrap();

        {
            let config = config_in(&dir, 1);
            let db = open(&config);
            db.write(|tx| {
                tx.put("contact", "a", json!({"id": "a"}));
                Ok(())
            })
            .unwrap();
        }

        let config = config_in(&dir, 2);
        let locator = FileLocator::private_only(&config);
        let registry = SchemaRegistry::with_hook(|_, _, _| Err("cannot map".to_string()));

        // First attempt fails, file is recreated fresh at version 2,
        // and the retry finds nothing to migrate
        let db = Database::open(&config, &locator, &registry).unwrap();
        assert_eq!(db.snapshot().count("contact"), 0);
        assert_eq!(db.schema_version(), 2);
    }

    #[test]
    fn test_compaction_shrinks_file() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir, 1).with_compaction(CompactionPolicy {
            threshold_bytes: 512,
            used_fraction: 0.5,
        });
        config.namespace = "compact".to_string();

        {
            let db = open(&config);
            // Many overwrites of one id leave mostly dead bytes
            for i in 0..50 {
                db.write(move |tx| {
                    tx.put("contact", "a", json!({"id": "a", "rev": i}));
                    Ok(())
                })
                .unwrap();
            }
        }

        let path = dir.path().join("compact.odb");
        let before = fs::metadata(&path).unwrap().len();
        assert!(before > 512);

        let db = open(&config);
        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before);
        assert_eq!(db.snapshot().get("contact", "a").unwrap()["rev"], json!(49));
    }
}
