use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use contentflow_backend::BackendClient;
use contentflow_core::config::TaskConfig;
use contentflow_core::{BackendStatusList, TaskDetails, TaskId, TaskStatus, TaskType};
use contentflow_events::EventPublisher;
use contentflow_store::{BackendRegistry, ContentStore, TaskStore};

use crate::error::OrchestratorError;
use crate::handlers::{HandlerTable, TaskHandler};
use crate::merge::ResultMerger;
use crate::scheduler::{JobDescriptor, JobHandler, Scheduler};

/// Creates tasks, hands them to back-ends and ingests what comes back.
pub struct TaskOrchestrator {
    pub(super) registry: Arc<dyn BackendRegistry>,
    pub(super) tasks: Arc<dyn TaskStore>,
    pub(super) merger: ResultMerger,
    pub(super) scheduler: Arc<dyn Scheduler>,
    pub(super) events: Arc<dyn EventPublisher>,
    pub(super) client: Arc<dyn BackendClient>,
    pub(super) handlers: HandlerTable,
    pub(super) config: TaskConfig,
}

impl TaskOrchestrator {
    pub fn new(
        registry: Arc<dyn BackendRegistry>,
        tasks: Arc<dyn TaskStore>,
        content: Arc<dyn ContentStore>,
        scheduler: Arc<dyn Scheduler>,
        events: Arc<dyn EventPublisher>,
        client: Arc<dyn BackendClient>,
        config: TaskConfig,
    ) -> Self {
        Self {
            registry,
            tasks,
            merger: ResultMerger::new(content),
            scheduler,
            events,
            client,
            handlers: HandlerTable::standard(),
            config,
        }
    }

    /// Replace the task-type handler table.
    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub(super) fn handler(&self, task_type: TaskType) -> Result<Arc<dyn TaskHandler>, OrchestratorError> {
        self.handlers
            .get(task_type)
            .cloned()
            .ok_or(OrchestratorError::UnsupportedTaskType(task_type))
    }

    /// Snapshot of a task's status rows.
    pub async fn backend_statuses(&self, task_id: TaskId) -> Result<BackendStatusList, OrchestratorError> {
        Ok(self.tasks.backend_statuses(task_id).await?)
    }

    /// Status of the whole task, recomputed from one consistent read of its rows.
    pub async fn combined_status(&self, task_id: TaskId) -> Result<TaskStatus, OrchestratorError> {
        Ok(self.backend_statuses(task_id).await?.combined_status())
    }
}

/// Anything that turns a task descriptor into a scheduled task.
#[async_trait]
pub trait TaskSubmitter: Send + Sync {
    async fn submit(&self, details: TaskDetails) -> Result<TaskId, OrchestratorError>;
}

#[async_trait]
impl TaskSubmitter for TaskOrchestrator {
    async fn submit(&self, details: TaskDetails) -> Result<TaskId, OrchestratorError> {
        self.create_and_schedule(details).await
    }
}

#[async_trait]
impl JobHandler for TaskOrchestrator {
    async fn run(&self, job: JobDescriptor) {
        if let Err(e) = self.dispatch(job.task_id).await {
            warn!(task_id = job.task_id, error = %e, "task dispatch failed");
        }
    }
}
