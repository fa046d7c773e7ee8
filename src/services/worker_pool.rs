//! Bounded-concurrency executor for reconciliation batches.
//!
//! Submission follows a core/max/queue policy:
//! 1. fewer than `core_size` workers: start a worker with the task;
//! 2. otherwise enqueue on the bounded FIFO queue;
//! 3. queue full and fewer than `max_size` workers: start an extra worker;
//! 4. queue full and at `max_size`: the submitter runs the task itself.
//!
//! Step 4 is the backpressure: work is never dropped and the queue never
//! grows past its capacity, the producer just slows down to worker speed.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::AppConfig;

pub type Task = BoxFuture<'static, ()>;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub name: String,
    pub core_size: usize,
    pub max_size: usize,
    pub queue_capacity: usize,
    pub idle_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl WorkerPoolConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            name: "product-check".to_string(),
            core_size: config.pool_core_size,
            max_size: config.pool_max_size,
            queue_capacity: config.pool_queue_capacity,
            idle_timeout: Duration::from_secs(config.pool_idle_timeout_secs),
            shutdown_grace: Duration::from_secs(config.pool_shutdown_grace_secs),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool {0} is shut down")]
    ShutDown(String),

    #[error("Invalid worker pool configuration: {0}")]
    Config(String),
}

/// What happened during [`WorkerPool::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub drained: bool,
    pub abandoned: usize,
}

struct Inner {
    config: WorkerPoolConfig,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Task>>,
    live_workers: AtomicUsize,
    active_tasks: AtomicUsize,
    queued: AtomicUsize,
    next_worker_id: AtomicUsize,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<Inner>,
}

/// Decrements the active-task counter however the task ends.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let active = counter.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("worker_pool_active_tasks").set(active as f64);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let active = self.0.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!("worker_pool_active_tasks").set(active as f64);
    }
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        if config.core_size == 0 || config.core_size > config.max_size {
            return Err(PoolError::Config(format!(
                "core_size must be in 1..=max_size (core={}, max={})",
                config.core_size, config.max_size
            )));
        }
        if config.queue_capacity == 0 {
            return Err(PoolError::Config("queue_capacity must be greater than 0".to_string()));
        }

        let (sender, receiver) = mpsc::channel(config.queue_capacity);

        tracing::info!(
            pool = %config.name,
            core_size = config.core_size,
            max_size = config.max_size,
            queue_capacity = config.queue_capacity,
            "Initializing worker pool"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                sender: Mutex::new(Some(sender)),
                receiver: tokio::sync::Mutex::new(receiver),
                live_workers: AtomicUsize::new(0),
                active_tasks: AtomicUsize::new(0),
                queued: AtomicUsize::new(0),
                next_worker_id: AtomicUsize::new(0),
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
            }),
        })
    }

    /// Hand a task to the pool. Returns once the task is owned by a worker,
    /// sitting in the queue, or (under backpressure) already finished on the
    /// caller.
    pub async fn submit(&self, task: Task) -> Result<(), PoolError> {
        let sender = self.sender()?;

        if self.try_reserve_worker(self.inner.config.core_size) {
            self.spawn_worker(Some(task));
            return Ok(());
        }

        self.inner.queued.fetch_add(1, Ordering::SeqCst);
        match sender.try_send(task) {
            Ok(()) => {
                // Keep at least one worker around to drain the queue.
                if self.inner.live_workers.load(Ordering::SeqCst) == 0 && self.try_reserve_worker(1) {
                    self.spawn_worker(None);
                }
                Ok(())
            }
            Err(TrySendError::Full(task)) => {
                self.inner.queued.fetch_sub(1, Ordering::SeqCst);
                if self.try_reserve_worker(self.inner.config.max_size) {
                    self.spawn_worker(Some(task));
                } else {
                    tracing::debug!(pool = %self.inner.config.name, "Queue full, running task on submitter");
                    run_task(&self.inner, task).await;
                }
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                self.inner.queued.fetch_sub(1, Ordering::SeqCst);
                Err(PoolError::ShutDown(self.inner.config.name.clone()))
            }
        }
    }

    /// Stop accepting work, wait up to the grace period for queued and
    /// in-flight tasks, then cancel whatever is left.
    pub async fn shutdown(&self) -> ShutdownReport {
        let name = self.inner.config.name.clone();
        let sender = self
            .inner
            .sender
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or(None);
        drop(sender);
        self.inner.tracker.close();

        tracing::info!(pool = %name, "Shutting down worker pool");

        let grace = self.inner.config.shutdown_grace;
        if tokio::time::timeout(grace, self.inner.tracker.wait()).await.is_ok() {
            tracing::info!(pool = %name, "Worker pool drained");
            return ShutdownReport {
                drained: true,
                abandoned: 0,
            };
        }

        let abandoned = self.inner.active_tasks.load(Ordering::SeqCst)
            + self.inner.queued.load(Ordering::SeqCst);
        self.inner.cancel.cancel();
        self.inner.tracker.wait().await;

        tracing::warn!(
            pool = %name,
            abandoned,
            grace_secs = grace.as_secs(),
            "Worker pool did not drain within grace period, forced shutdown"
        );
        ShutdownReport {
            drained: false,
            abandoned,
        }
    }

    pub fn live_workers(&self) -> usize {
        self.inner.live_workers.load(Ordering::SeqCst)
    }

    pub fn active_tasks(&self) -> usize {
        self.inner.active_tasks.load(Ordering::SeqCst)
    }

    pub fn queued_tasks(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }

    fn sender(&self) -> Result<mpsc::Sender<Task>, PoolError> {
        self.inner
            .sender
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or_else(|| PoolError::ShutDown(self.inner.config.name.clone()))
    }

    fn try_reserve_worker(&self, limit: usize) -> bool {
        self.inner
            .live_workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < limit).then_some(n + 1))
            .is_ok()
    }

    fn spawn_worker(&self, first_task: Option<Task>) {
        let inner = Arc::clone(&self.inner);
        let id = inner.next_worker_id.fetch_add(1, Ordering::SeqCst);
        self.inner.tracker.spawn(worker_loop(inner, id, first_task));
    }
}

async fn run_task(inner: &Inner, task: Task) {
    let _active = ActiveGuard::enter(&inner.active_tasks);
    if AssertUnwindSafe(task).catch_unwind().await.is_err() {
        tracing::error!(pool = %inner.config.name, "Worker task panicked");
    }
}

async fn worker_loop(inner: Arc<Inner>, id: usize, mut next: Option<Task>) {
    let name = format!("{}-{}", inner.config.name, id);
    tracing::debug!(worker = %name, "Worker started");

    loop {
        if let Some(task) = next.take() {
            tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => break,
                _ = run_task(&inner, task) => {}
            }
        }

        let received = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break,
            received = tokio::time::timeout(inner.config.idle_timeout, async {
                inner.receiver.lock().await.recv().await
            }) => received,
        };

        match received {
            Ok(Some(task)) => {
                inner.queued.fetch_sub(1, Ordering::SeqCst);
                next = Some(task);
            }
            // Queue closed and drained.
            Ok(None) => break,
            Err(_idle) => {
                let core = inner.config.core_size;
                let retired = inner
                    .live_workers
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n > core).then(|| n - 1))
                    .is_ok();
                if retired {
                    tracing::debug!(worker = %name, "Idle worker above core size retired");
                    return;
                }
            }
        }
    }

    inner.live_workers.fetch_sub(1, Ordering::SeqCst);
    tracing::debug!(worker = %name, "Worker stopped");
}
