//! # Inbound Worker Pool
//!
//! Target operations run on a pool of worker tasks draining one shared
//! queue. The default pool has a single worker, which serializes execution:
//! no two target operations run concurrently and completions leave in
//! submission order. A wider pool relaxes completion ordering.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio::time::Instant;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// How long a graceful shutdown waits for the queue to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Executor failures.
#[derive(Debug, Clone)]
pub enum Error {
    /// The executor is shut down; the job was not accepted.
    ShutDown,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShutDown => write!(f, "executor is shut down"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A fixed-width pool of worker tasks over one shared queue.
pub struct Executor {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    queued: Arc<AtomicUsize>,
    width: usize,
}

impl Executor {
    /// Spawns `width` workers. Width 1 gives serialized execution.
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let queued = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(width);
        for _ in 0..width {
            let rx = rx.clone();
            let queued = queued.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => {
                            queued.fetch_sub(1, Ordering::AcqRel);
                            // Each job runs in its own task so a panicking
                            // target cannot take the worker down with it.
                            if let Err(e) = tokio::spawn(job).await {
                                if e.is_panic() {
                                    tracing::warn!("worker job panicked");
                                }
                            }
                        }
                        None => break,
                    }
                }
            }));
        }

        Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            queued,
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Queues a job for the workers.
    pub async fn submit<F>(&self, job: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.sender.lock().await;
        let Some(sender) = sender.as_ref() else {
            return Err(Error::ShutDown);
        };
        self.queued.fetch_add(1, Ordering::AcqRel);
        if sender.send(Box::pin(job)).is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::ShutDown);
        }
        Ok(())
    }

    /// Graceful shutdown: close the queue, wait up to five seconds for the
    /// workers to drain it, then force-cancel. Idempotent.
    pub async fn shutdown(&self) {
        let Some(sender) = self.sender.lock().await.take() else {
            return;
        };
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().await);
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        let mut forced = false;
        for mut worker in workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if forced || tokio::time::timeout(remaining, &mut worker).await.is_err() {
                forced = true;
                worker.abort();
            }
        }
        if forced {
            tracing::info!(
                pending = self.queued.load(Ordering::Acquire),
                "executor did not terminate in time; remaining tasks cancelled"
            );
        }
    }
}
