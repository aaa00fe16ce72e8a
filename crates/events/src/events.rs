//! Event payloads carried inside [`Message`](crate::Message) envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use contentflow_core::{BackendId, ContentKind, TaskId, TaskStatus, TaskType, UserId};

/// Emitted once per result ingestion, after the back-end's status row is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFinished {
    /// Back-end that reported.
    pub backend_id: BackendId,
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub content_kind: ContentKind,
    /// Status persisted for the back-end, `ERROR` when ingestion forced it.
    pub status: TaskStatus,
}

/// Emitted when a user's external-service content was synchronized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncComplete {
    pub user_id: UserId,
    pub matched: usize,
    pub inserted: usize,
    pub removed: usize,
    /// Tasks created for the changes, in creation order.
    #[serde(default)]
    pub task_ids: Vec<TaskId>,
    pub finished_at: DateTime<Utc>,
}
