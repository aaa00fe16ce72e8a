use tracing::{debug, error, info, warn};

use contentflow_core::{BackendStatusList, TaskDetails, TaskId};
use contentflow_store::{BackendRegistry, TaskStore};

use super::core::TaskOrchestrator;
use crate::error::OrchestratorError;
use crate::scheduler::{JobDescriptor, Scheduler};

impl TaskOrchestrator {
    /// Persist a task (unless it already has an id) and schedule it.
    ///
    /// Without explicit back-ends the registry's capable back-ends are used.
    /// Explicit back-ends lacking a required capability are ignored. A
    /// scheduling failure is reported with the id of the persisted task.
    pub async fn create_and_schedule(&self, details: TaskDetails) -> Result<TaskId, OrchestratorError> {
        let task_type = details.task_type();
        let kind = details.content_kind();
        let handler = self.handler(task_type)?;
        handler.validate(details.content())?;

        let task_id = match details.task_id() {
            Some(task_id) => {
                debug!(task_id, "task already persisted, rescheduling");
                task_id
            }
            None => {
                let required = handler.required_capabilities(kind);
                let backends = if details.backends().is_empty() {
                    BackendStatusList::not_started(self.registry.backends(&required).await?)
                } else {
                    let capable = details.backends().with_capabilities(&required);
                    let ignored = details.backends().len() - capable.len();
                    if ignored > 0 {
                        warn!(%task_type, ignored, "ignoring back-ends without the required capabilities");
                    }
                    BackendStatusList::not_started(capable.into_iter().map(|row| row.backend))
                };
                if backends.is_empty() {
                    return Err(OrchestratorError::NoCapableBackends { task_type, required });
                }

                let mut details = details.with_backends(backends);
                if details.callback_uri().is_none() {
                    details = details.with_callback_uri(self.config.callback_uri());
                }
                let task_id = self.tasks.insert_task(&details).await?;
                info!(
                    task_id,
                    %task_type,
                    backends = details.backends().len(),
                    "task created"
                );
                task_id
            }
        };

        let job = JobDescriptor {
            task_id,
            task_type,
            content_kind: kind,
            delay: self.config.schedule_delay(),
        };
        if let Err(source) = self.scheduler.schedule(job).await {
            error!(task_id, error = %source, "failed to schedule task");
            return Err(OrchestratorError::Schedule { task_id, source });
        }
        Ok(task_id)
    }
}
