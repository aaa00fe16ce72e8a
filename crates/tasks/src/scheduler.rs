//! Job scheduling seam and the implementations shipped with the crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use contentflow_core::{ContentKind, TaskId, TaskType};

/// A request to run a persisted task.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub content_kind: ContentKind,
    /// Wait this long before running. `None` runs as soon as possible.
    pub delay: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is shut down")]
    ShutDown,

    #[error("no job handler bound to the scheduler")]
    Unbound,

    #[error("job rejected: {0}")]
    Rejected(String),
}

/// Fire-and-forget job submission.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, job: JobDescriptor) -> Result<(), SchedulerError>;
}

/// Runs a job once its time has come.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: JobDescriptor);
}

/// Runs jobs as tokio tasks, honouring each job's delay.
///
/// The handler is bound after construction because it usually owns the
/// scheduler; only a weak reference is kept.
pub struct TokioScheduler {
    handler: OnceLock<Weak<dyn JobHandler>>,
    shutdown: AtomicBool,
    active: Arc<AtomicUsize>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            handler: OnceLock::new(),
            shutdown: AtomicBool::new(false),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind the job handler. Returns false if one was already bound.
    pub fn bind(&self, handler: Weak<dyn JobHandler>) -> bool {
        self.handler.set(handler).is_ok()
    }

    /// Stop accepting jobs. Jobs already spawned still run.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        info!("scheduler shut down");
    }

    /// Jobs spawned and not yet finished.
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn schedule(&self, job: JobDescriptor) -> Result<(), SchedulerError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShutDown);
        }
        let handler = self.handler.get().cloned().ok_or(SchedulerError::Unbound)?;
        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::SeqCst);

        debug!(task_id = job.task_id, delay = ?job.delay, "job scheduled");
        tokio::spawn(async move {
            if let Some(delay) = job.delay {
                tokio::time::sleep(delay).await;
            }
            match handler.upgrade() {
                Some(handler) => handler.run(job).await,
                None => warn!(task_id = job.task_id, "job handler dropped before job ran"),
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(())
    }
}

/// Collects jobs instead of running them, for callers that dispatch later.
#[derive(Default)]
pub struct QueuedScheduler {
    jobs: Mutex<Vec<JobDescriptor>>,
}

impl QueuedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued job, oldest first.
    pub async fn drain(&self) -> Vec<JobDescriptor> {
        std::mem::take(&mut *self.jobs.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }
}

#[async_trait]
impl Scheduler for QueuedScheduler {
    async fn schedule(&self, job: JobDescriptor) -> Result<(), SchedulerError> {
        self.jobs.lock().await.push(job);
        Ok(())
    }
}
