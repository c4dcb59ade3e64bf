//! Background job execution.
//!
//! A fixed set of tokio tasks pull [`Job`]s from one shared `mpsc` queue and
//! run them against a [`Pipeline`]. Completion is delivered either through a
//! [`JobHandle`] (a `oneshot` receiver) or through a callback. Ingest and
//! query jobs can run at the same time; the store's own locking keeps
//! searches consistent with in-flight inserts.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::ingest::IngestSource;
use crate::pipeline::Pipeline;

const QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Ingest { source: IngestSource, clear: bool },
    Query { text: String },
}

type Callback = Box<dyn FnOnce(String) + Send + 'static>;

enum Reply {
    Handle(oneshot::Sender<String>),
    Callback(Callback),
}

struct Envelope {
    job: Job,
    reply: Reply,
}

/// Resolves to the job's completion message.
pub struct JobHandle {
    rx: oneshot::Receiver<String>,
}

impl JobHandle {
    pub async fn wait(self) -> Result<String> {
        self.rx
            .await
            .map_err(|_| anyhow!("worker stopped before the job completed"))
    }
}

pub struct WorkerPool {
    tx: mpsc::Sender<Envelope>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks (at least one) on the current runtime.
    pub fn start(pipeline: Arc<Pipeline>, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Envelope>(QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..workers.max(1))
            .map(|id| {
                let rx = Arc::clone(&rx);
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(envelope) = next else {
                            break;
                        };
                        tracing::debug!(worker = id, job = ?envelope.job, "running job");
                        let message = run_job(&pipeline, &envelope.job).await;
                        match envelope.reply {
                            Reply::Handle(tx) => {
                                let _ = tx.send(message);
                            }
                            Reply::Callback(callback) => callback(message),
                        }
                    }
                    tracing::debug!(worker = id, "worker stopped");
                })
            })
            .collect();

        Self { tx, workers }
    }

    /// Queue `job` and return a handle to await its completion message.
    pub async fn submit(&self, job: Job) -> Result<JobHandle> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(job, Reply::Handle(tx)).await?;
        Ok(JobHandle { rx })
    }

    /// Queue `job`; `on_done` receives its completion message on a worker task.
    pub async fn submit_with<F>(&self, job: Job, on_done: F) -> Result<()>
    where
        F: FnOnce(String) + Send + 'static,
    {
        self.enqueue(job, Reply::Callback(Box::new(on_done))).await
    }

    async fn enqueue(&self, job: Job, reply: Reply) -> Result<()> {
        self.tx
            .send(Envelope { job, reply })
            .await
            .map_err(|_| anyhow!("worker pool is shut down"))
    }

    /// Stop accepting jobs and wait for queued and in-flight jobs to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "worker task failed");
            }
        }
    }
}

async fn run_job(pipeline: &Pipeline, job: &Job) -> String {
    match job {
        Job::Ingest { source, clear } => pipeline.ingest_message(source, *clear).await,
        Job::Query { text } => pipeline.query_message(text).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::sqlite_pipeline;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_jobs_complete_through_handles() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("fox.txt");
        std::fs::write(&doc, "The quick brown fox jumps over the lazy dog.").unwrap();
        let pool = WorkerPool::start(Arc::new(sqlite_pipeline(&tmp).await), 2);

        let ingest = pool
            .submit(Job::Ingest {
                source: IngestSource::File(doc.clone()),
                clear: true,
            })
            .await
            .unwrap();
        assert_eq!(
            ingest.wait().await.unwrap(),
            format!("Processed 3 chunks from {}", doc.display())
        );

        let query = pool
            .submit(Job::Query {
                text: "Where is the fox?".to_string(),
            })
            .await
            .unwrap();
        assert!(query.wait().await.unwrap().starts_with("Response: "));

        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_callbacks_and_concurrent_queries() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("fox.txt");
        std::fs::write(&doc, "The quick brown fox jumps over the lazy dog.").unwrap();
        let pool = WorkerPool::start(Arc::new(sqlite_pipeline(&tmp).await), 3);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let done = tx.clone();
        pool.submit_with(
            Job::Ingest {
                source: IngestSource::File(doc),
                clear: false,
            },
            move |msg| {
                let _ = done.send(msg);
            },
        )
        .await
        .unwrap();
        for _ in 0..4 {
            let done = tx.clone();
            pool.submit_with(
                Job::Query {
                    text: "fox".to_string(),
                },
                move |msg| {
                    let _ = done.send(msg);
                },
            )
            .await
            .unwrap();
        }
        drop(tx);
        pool.shutdown().await;

        let mut messages = Vec::new();
        while let Some(msg) = rx.recv().await {
            messages.push(msg);
        }
        assert_eq!(messages.len(), 5);
        assert!(messages.iter().any(|m| m.starts_with("Processed 3 chunks")));
        assert!(messages
            .iter()
            .all(|m| m.starts_with("Processed")
                || m.starts_with("Response: ")
                || m == "No matching results found!"));
    }

    #[tokio::test]
    async fn test_ingest_failure_is_reported_not_raised() {
        let tmp = TempDir::new().unwrap();
        let pool = WorkerPool::start(Arc::new(sqlite_pipeline(&tmp).await), 1);
        let handle = pool
            .submit(Job::Ingest {
                source: IngestSource::Directory(tmp.path().join("missing")),
                clear: false,
            })
            .await
            .unwrap();
        assert!(handle.wait().await.unwrap().starts_with("Error: "));
        pool.shutdown().await;
    }
}
