use futures::future::join_all;
use tracing::{debug, info, warn};

use contentflow_backend::BackendClient;
use contentflow_core::{BackendId, BackendStatus, Capability, TaskId, TaskStatus};
use contentflow_store::TaskStore;

use super::core::TaskOrchestrator;
use crate::error::OrchestratorError;

/// Outcome of handing one task to its back-ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Accepted by the back-end and moved to `IN_PROGRESS`.
    pub submitted: Vec<BackendId>,
    /// Transport failures; rows stay `NOT_STARTED`.
    pub failed: Vec<BackendId>,
    /// Anonymous task, back-end does not take those.
    pub skipped: Vec<BackendId>,
}

impl TaskOrchestrator {
    /// Send a persisted task to every back-end that has not started it yet.
    pub async fn dispatch(&self, task_id: TaskId) -> Result<DispatchReport, OrchestratorError> {
        let task = self
            .tasks
            .task(task_id)
            .await?
            .ok_or(OrchestratorError::TaskNotFound(task_id))?;
        let handler = self.handler(task.task_type())?;
        let required = handler.required_capabilities(task.content_kind());

        let pending = task
            .backends()
            .with_status(TaskStatus::NotStarted)
            .with_capabilities(&required);
        let mut report = DispatchReport::default();
        if pending.is_empty() {
            debug!(task_id, "no back-ends waiting for this task");
            return Ok(report);
        }

        let anonymous = task.user_id().is_none();
        let mut targets: Vec<BackendStatus> = Vec::with_capacity(pending.len());
        for row in pending {
            if anonymous && !row.backend.has_capability(Capability::AnonymousTask) {
                debug!(task_id, backend_id = row.backend_id(), "back-end does not take anonymous tasks");
                report.skipped.push(row.backend_id());
            } else {
                targets.push(row);
            }
        }

        let submissions = targets.iter().map(|row| {
            let task = &task;
            async move { (row, self.client.submit_task(&row.backend, task).await) }
        });

        for (row, result) in join_all(submissions).await {
            let backend_id = row.backend_id();
            if let Err(e) = result {
                warn!(task_id, backend_id, error = %e, "failed to submit task");
                report.failed.push(backend_id);
                continue;
            }
            // A fast back-end may already have reported its result.
            match self.tasks.backend_status(backend_id, task_id).await? {
                Some(current) if current.status == TaskStatus::NotStarted => {
                    let mut acknowledged = current;
                    acknowledged.status = TaskStatus::InProgress;
                    self.tasks.update_backend_status(task_id, &acknowledged).await?;
                }
                _ => debug!(task_id, backend_id, "status already advanced, leaving it"),
            }
            report.submitted.push(backend_id);
        }

        info!(
            task_id,
            submitted = report.submitted.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "task dispatched"
        );
        Ok(report)
    }
}
