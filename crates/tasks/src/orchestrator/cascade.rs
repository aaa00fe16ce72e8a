use tracing::{debug, warn};

use contentflow_core::{BackendId, BackendStatusList, ContentItem, TaskDetails, TaskId, TaskType};
use contentflow_store::{BackendRegistry, TaskStore};

use super::core::TaskOrchestrator;
use crate::error::OrchestratorError;

impl TaskOrchestrator {
    /// Forward content merged from one back-end to the other back-ends of the
    /// same task that accept backend feedback.
    ///
    /// Returns `None` when there is nothing to forward or nobody to forward it to.
    pub async fn schedule_backend_feedback(
        &self,
        originator: BackendId,
        task_id: TaskId,
        items: Vec<ContentItem>,
    ) -> Result<Option<TaskId>, OrchestratorError> {
        if items.is_empty() {
            return Ok(None);
        }
        let Some(original) = self.tasks.task(task_id).await? else {
            warn!(task_id, "original task vanished, no backend feedback");
            return Ok(None);
        };
        if original.backends().is_empty() {
            warn!(task_id, "original task has no back-ends, no backend feedback");
            return Ok(None);
        }

        let kind = original.content_kind();
        let required = self
            .handler(TaskType::BackendFeedback)?
            .required_capabilities(kind);
        let targets: Vec<_> = self
            .registry
            .backends(&required)
            .await?
            .into_iter()
            .filter(|b| b.backend_id != originator && original.backends().contains(b.backend_id))
            .collect();
        if targets.is_empty() {
            debug!(task_id, originator, "no back-ends take feedback for this task");
            return Ok(None);
        }

        let details = TaskDetails::builder(TaskType::BackendFeedback, kind)
            .maybe_user(original.user_id())
            .related_task(task_id)
            .backends(BackendStatusList::not_started(targets))
            .items(items)
            .build();
        let feedback = self.create_and_schedule(details).await?;
        debug!(task_id, feedback, originator, "backend feedback scheduled");
        Ok(Some(feedback))
    }
}
