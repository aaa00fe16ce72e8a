use thiserror::Error;

use contentflow_core::{BackendId, Guid, TaskId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("no status row for backend {backend_id} on task {task_id}")]
    StatusNotFound { backend_id: BackendId, task_id: TaskId },

    #[error("content item {0} not found")]
    ItemNotFound(Guid),

    #[error("media object {0} not found")]
    MediaObjectNotFound(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("registry parse error: {0}")]
    RegistryParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
