use thiserror::Error;

use contentflow_core::{BackendId, Capability, CoreError, Guid, TaskId, TaskType};
use contentflow_store::StoreError;

use crate::scheduler::SchedulerError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no handler registered for task type {0}")]
    UnsupportedTaskType(TaskType),

    #[error("invalid task: {0}")]
    InvalidTask(#[from] CoreError),

    #[error("no back-end offers {required:?} for {task_type} tasks")]
    NoCapableBackends {
        task_type: TaskType,
        required: Vec<Capability>,
    },

    #[error("task {task_id} was created but could not be scheduled: {source}")]
    Schedule {
        task_id: TaskId,
        source: SchedulerError,
    },

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a back-end result could not be (fully) ingested.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Rejected before any state change.
    #[error("malformed result: {0}")]
    Malformed(String),

    /// Rejected before any state change.
    #[error("backend {backend_id} is not assigned to task {task_id}")]
    NotAssigned { backend_id: BackendId, task_id: TaskId },

    /// Rejected before any state change.
    #[error("no handler registered for task type {0}")]
    UnsupportedTaskType(TaskType),

    /// The back-end's status was forced to `ERROR` and persisted.
    #[error("result failed validation: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("permission denied for item {0}")]
    PermissionDenied(Guid),

    #[error("content item without guid")]
    MissingGuid,

    #[error("invalid content: {0}")]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}
