//! Write serialization for objectdb
//!
//! One worker task per store owns the mutation path. `enqueue_write`
//! submissions are queued FIFO and executed strictly sequentially, so
//! at most one write transaction is ever active against a storage
//! file, and commits land in submission order.
//!
//! Completion contract: the future returned by `enqueue_write`
//! resolves exactly once, with that write's own outcome. A failed
//! write is reported to its submitter only; the worker continues with
//! the queue. Writes that have started always run to completion;
//! writes still queued are skipped when their submitter has already
//! dropped the completion future.

mod errors;

pub use errors::{SerializerError, SerializerResult};

use std::sync::Weak;

use tokio::sync::{mpsc, oneshot};

use crate::database::{Database, DatabaseResult, WriteTransaction};

/// Boxed write job executed by the worker inside a transaction.
pub type WriteJob = Box<dyn FnOnce(&mut WriteTransaction<'_>) -> DatabaseResult<()> + Send>;

struct WriteRequest {
    job: WriteJob,
    done: oneshot::Sender<SerializerResult<()>>,
}

/// FIFO single-worker write queue for one database.
pub struct WriteSerializer {
    queue: mpsc::UnboundedSender<WriteRequest>,
}

impl WriteSerializer {
    /// Spawns the worker task. Must be called within a tokio runtime.
    ///
    /// The worker exits when the serializer (and every clone of its
    /// queue handle) is dropped. It holds the database weakly so that
    /// dropping every store handle closes the database and releases
    /// its storage path; writes submitted after that resolve with
    /// [`SerializerError::WorkerTerminated`].
    pub fn spawn(db: Weak<Database>) -> Self {
        let (queue, mut rx) = mpsc::unbounded_channel::<WriteRequest>();

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                // Queued-but-abandoned writes are skipped; once a job
                // starts it runs to completion
                if request.done.is_closed() {
                    continue;
                }
                let result = match db.upgrade() {
                    Some(db) => db.write(request.job).map_err(SerializerError::from),
                    None => Err(SerializerError::WorkerTerminated),
                };
                let _ = request.done.send(result);
            }
        });

        Self { queue }
    }

    /// Enqueues a write and waits for that write's commit or failure.
    ///
    /// Submissions from one caller are committed in submission order;
    /// submissions from concurrent callers are serialized in queue
    /// arrival order.
    pub async fn enqueue_write<F>(&self, job: F) -> SerializerResult<()>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> DatabaseResult<()> + Send + 'static,
    {
        let (done, outcome) = oneshot::channel();
        self.queue
            .send(WriteRequest {
                job: Box::new(job),
                done,
            })
            .map_err(|_| SerializerError::WorkerTerminated)?;

        outcome.await.map_err(|_| SerializerError::WorkerTerminated)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::database::DatabaseError;
    use crate::locator::FileLocator;
    use crate::schema::SchemaRegistry;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn open_db(dir: &TempDir) -> Arc<Database> {
        let config = StorageConfig::new(dir.path(), "serializer", 1);
        let locator = FileLocator::private_only(&config);
        Arc::new(Database::open(&config, &locator, &SchemaRegistry::new()).unwrap())
    }

    #[tokio::test]
    async fn test_write_commits_and_is_visible() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let serializer = WriteSerializer::spawn(Arc::downgrade(&db));

        serializer
            .enqueue_write(|tx| {
                tx.put("contact", "a", json!({"id": "a"}));
                Ok(())
            })
            .await
            .unwrap();

        assert!(db.snapshot().get("contact", "a").is_some());
    }

    #[tokio::test]
    async fn test_sequential_submissions_commit_in_order() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let serializer = WriteSerializer::spawn(Arc::downgrade(&db));

        let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20u32 {
            let order = order.clone();
            serializer
                .enqueue_write(move |tx| {
                    order.lock().unwrap().push(i);
                    tx.put("counter", "c", json!({"latest": i}));
                    Ok(())
                })
                .await
                .unwrap();
        }

        assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<u32>>());
        assert_eq!(db.snapshot().get("counter", "c").unwrap()["latest"], json!(19));
    }

    #[tokio::test]
    async fn test_failed_write_resolves_and_queue_continues() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let serializer = WriteSerializer::spawn(Arc::downgrade(&db));

        // One-resumption guarantee: the failing write's future
        // resolves with its own error
        let err = serializer
            .enqueue_write(|tx| {
                tx.put("contact", "x", json!({"id": "x"}));
                Err(DatabaseError::WriteFailed("validation refused".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SerializerError::Database(_)));
        assert_eq!(db.snapshot().get("contact", "x"), None);

        // The write behind it still runs
        serializer
            .enqueue_write(|tx| {
                tx.put("contact", "y", json!({"id": "y"}));
                Ok(())
            })
            .await
            .unwrap();
        assert!(db.snapshot().get("contact", "y").is_some());
    }

    #[tokio::test]
    async fn test_write_after_database_close_reports_termination() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let serializer = WriteSerializer::spawn(Arc::downgrade(&db));

        drop(db);

        let err = serializer
            .enqueue_write(|_tx| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, SerializerError::WorkerTerminated));
    }

    #[tokio::test]
    async fn test_worker_exits_after_drop() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let serializer = WriteSerializer::spawn(Arc::downgrade(&db));

        serializer
            .enqueue_write(|tx| {
                tx.put("contact", "a", json!({"id": "a"}));
                Ok(())
            })
            .await
            .unwrap();

        drop(serializer);
        // Worker drains and exits; database stays readable
        tokio::task::yield_now().await;
        assert!(db.snapshot().get("contact", "a").is_some());
    }
}
