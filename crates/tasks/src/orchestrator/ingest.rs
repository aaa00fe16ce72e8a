use tracing::{debug, error, info, warn};

use contentflow_core::{BackendId, ContentItem, Guid, TaskId, TaskResponse, TaskStatus};
use contentflow_events::{topics, EventPublisher, Message, TaskFinished};
use contentflow_store::TaskStore;

use super::core::TaskOrchestrator;
use crate::error::IngestError;
use crate::merge::MergedContent;

/// What one result ingestion did.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub task_id: TaskId,
    pub backend_id: BackendId,
    /// Status persisted for the reporting back-end.
    pub status: TaskStatus,
    pub inserted: usize,
    pub updated: usize,
    pub dropped: usize,
    /// Backend-feedback task created from the merged content.
    pub feedback_task: Option<TaskId>,
}

impl TaskOrchestrator {
    /// Apply a back-end's result to the store.
    ///
    /// Envelope problems are rejected before anything is written. Once the
    /// reporting back-end is known to be assigned, its status row is always
    /// persisted and a [`TaskFinished`] event is always published, forced to
    /// `ERROR` when the result fails validation.
    pub async fn ingest_result(&self, response: TaskResponse) -> Result<IngestReport, IngestError> {
        let (Some(backend_id), Some(task_id)) = (response.backend_id, response.task_id) else {
            return Err(IngestError::Malformed("backend_id and task_id are required".into()));
        };
        let Some(mut row) = self.tasks.backend_status(backend_id, task_id).await? else {
            warn!(backend_id, task_id, "result from a back-end not assigned to the task");
            return Err(IngestError::NotAssigned { backend_id, task_id });
        };
        let Some(task) = self.tasks.task(task_id).await? else {
            return Err(IngestError::NotAssigned { backend_id, task_id });
        };
        let task_type = task.task_type();
        let handler = self
            .handlers
            .get(task_type)
            .cloned()
            .ok_or(IngestError::UnsupportedTaskType(task_type))?;
        if let Some(reported) = response.task_type {
            if reported != task_type {
                debug!(task_id, %reported, %task_type, "reported task type differs, using the stored one");
            }
        }

        let staged = response.status.unwrap_or(TaskStatus::Unknown);
        let merged = self.merge_items(backend_id, task_id, staged, response.items).await;

        let status = match &merged {
            Ok(_) => staged,
            Err(e) => {
                warn!(backend_id, task_id, error = %e, "result rejected, marking back-end as failed");
                TaskStatus::Error
            }
        };
        row.status = status;
        row.message = response.message;
        let persisted = self.tasks.update_backend_status(task_id, &row).await;
        if let Err(e) = &persisted {
            error!(backend_id, task_id, error = %e, "failed to persist back-end status");
        }
        self.publish_finished(TaskFinished {
            backend_id,
            task_id,
            task_type,
            content_kind: task.content_kind(),
            status,
        })
        .await;

        let merged = merged?;
        persisted?;

        let mut report = IngestReport {
            task_id,
            backend_id,
            status,
            inserted: merged.inserted,
            updated: merged.updated,
            dropped: merged.dropped,
            feedback_task: None,
        };
        if handler.cascades_feedback() && !merged.items.is_empty() {
            match self
                .schedule_backend_feedback(backend_id, task_id, merged.items)
                .await
            {
                Ok(feedback) => report.feedback_task = feedback,
                Err(e) => warn!(task_id, error = %e, "failed to schedule backend feedback"),
            }
        }

        info!(
            task_id,
            backend_id,
            %status,
            inserted = report.inserted,
            updated = report.updated,
            dropped = report.dropped,
            "result ingested"
        );
        Ok(report)
    }

    async fn merge_items(
        &self,
        backend_id: BackendId,
        task_id: TaskId,
        staged: TaskStatus,
        items: Vec<ContentItem>,
    ) -> Result<MergedContent, IngestError> {
        if items.is_empty() {
            debug!(backend_id, task_id, "result carries no items");
            return Ok(MergedContent::default());
        }

        let prepared = self.merger.prepare(backend_id, items).await?;
        prepared
            .plan
            .validate()
            .map_err(|e| IngestError::Validation(e.to_string()))?;
        let merged = self.merger.commit(prepared).await;

        let item_statuses: Vec<(Guid, TaskStatus)> = merged
            .items
            .iter()
            .filter_map(|item| {
                let guid = item.guid.clone()?;
                let status = if item.statuses.is_empty() {
                    staged
                } else {
                    item.reported_status()
                };
                Some((guid, status))
            })
            .collect();
        if !item_statuses.is_empty() {
            if let Err(e) = self
                .tasks
                .record_item_statuses(task_id, backend_id, &item_statuses)
                .await
            {
                warn!(backend_id, task_id, error = %e, "failed to record item statuses");
            }
        }
        Ok(merged)
    }

    async fn publish_finished(&self, event: TaskFinished) {
        let message = match Message::new(topics::TASK_FINISHED, &event) {
            Ok(message) => message,
            Err(e) => {
                error!(task_id = event.task_id, error = %e, "failed to encode task event");
                return;
            }
        };
        if let Err(e) = self.events.publish(message).await {
            warn!(task_id = event.task_id, error = %e, "failed to publish task event");
        }
    }
}
