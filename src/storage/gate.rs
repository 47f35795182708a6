//! Serial access gate for the SQLite connection
//!
//! The storage engine is not safe for concurrent use from multiple
//! execution contexts, so a single worker thread owns the sole connection
//! and executes submitted jobs strictly in arrival order. Every document
//! store and keyword index call in the crate goes through here.

use crate::error::{MaildexError, Result};
use crate::storage::DocumentStore;
use rusqlite::Connection;
use std::path::Path;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Single-threaded execution lane over the database connection
///
/// Callers from any number of concurrent tasks may submit work; jobs run
/// one at a time in FIFO order with no interleaving. Dropping the gate
/// closes the queue; the worker drains pending jobs and exits.
pub struct SerialGate {
    job_tx: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialGate {
    /// Open the database and start the worker thread
    ///
    /// The connection is created on the worker thread and never leaves it.
    pub fn open(db_path: &Path) -> Result<Self> {
        let (job_tx, mut job_rx) = mpsc::unbounded_channel::<Job>();
        let (init_tx, init_rx) = std::sync::mpsc::channel::<Result<()>>();
        let db_path = db_path.to_path_buf();

        let worker = std::thread::Builder::new()
            .name("maildex-gate".to_string())
            .spawn(move || {
                let mut conn = match DocumentStore::open(&db_path) {
                    Ok(conn) => {
                        let _ = init_tx.send(Ok(()));
                        conn
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                while let Some(job) = job_rx.blocking_recv() {
                    job(&mut conn);
                }

                tracing::debug!("Serial gate worker finished");
            })
            .map_err(|e| MaildexError::Gate(format!("Failed to spawn gate worker: {}", e)))?;

        init_rx
            .recv()
            .map_err(|_| MaildexError::Gate("Gate worker died during startup".to_string()))??;

        Ok(Self {
            job_tx: Some(job_tx),
            worker: Some(worker),
        })
    }

    /// Run a job against the connection and await its result
    ///
    /// Jobs submitted from concurrent tasks execute in submission order;
    /// a job observes every effect of jobs submitted before it.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let job: Job = Box::new(move |conn| {
            let _ = reply_tx.send(f(conn));
        });

        self.job_tx
            .as_ref()
            .ok_or_else(|| MaildexError::Gate("Gate queue is closed".to_string()))?
            .send(job)
            .map_err(|_| MaildexError::Gate("Gate queue is closed".to_string()))?;

        reply_rx
            .await
            .map_err(|_| MaildexError::Gate("Gate worker dropped the job".to_string()))?
    }
}

impl Drop for SerialGate {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain pending jobs and exit
        drop(self.job_tx.take());

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::IndexedDocument;
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_test_gate() -> (Arc<SerialGate>, TempDir) {
        let temp = TempDir::new().unwrap();
        let gate = SerialGate::open(&temp.path().join("test.sqlite")).unwrap();
        (Arc::new(gate), temp)
    }

    #[tokio::test]
    async fn test_run_returns_job_result() {
        let (gate, _temp) = open_test_gate();

        let count = gate
            .run(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .unwrap();

        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_write_then_read_observes_write() {
        let (gate, _temp) = open_test_gate();

        let doc = IndexedDocument::new(
            Some("msg-1".to_string()),
            "body",
            "alice@example.com",
            "Subject",
            Utc::now(),
        );
        let id = doc.id;

        gate.run(move |conn| DocumentStore::upsert(conn, &doc))
            .await
            .unwrap();

        let fetched = gate
            .run(move |conn| DocumentStore::get(conn, id))
            .await
            .unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submitters_do_not_corrupt() {
        let (gate, _temp) = open_test_gate();

        let mut handles = Vec::new();
        for i in 0..32 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                let doc = IndexedDocument::new(
                    Some(format!("msg-{}", i)),
                    format!("body {}", i),
                    "alice@example.com",
                    format!("Subject {}", i),
                    Utc::now(),
                );
                gate.run(move |conn| DocumentStore::upsert(conn, &doc)).await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stats = gate
            .run(|conn| DocumentStore::stats(conn))
            .await
            .unwrap();
        assert_eq!(stats.document_count, 32);
    }

    #[test]
    fn test_open_fails_on_unwritable_path() {
        let result = SerialGate::open(Path::new("/proc/does-not-exist/db.sqlite"));
        assert!(result.is_err());
    }
}
