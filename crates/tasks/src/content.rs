//! User-initiated content changes and the feedback tasks they produce.

use std::sync::Arc;

use tracing::{debug, info, warn};

use contentflow_core::{
    validate_all, AccessContext, ContentItem, ContentKind, CoreError, Guid, SearchFilters, TaskDetails,
    TaskId, TaskType, UserId,
};
use contentflow_store::ContentStore;

use crate::error::ContentError;
use crate::orchestrator::TaskSubmitter;

pub struct ContentService {
    content: Arc<dyn ContentStore>,
    submitter: Arc<dyn TaskSubmitter>,
}

impl ContentService {
    pub fn new(content: Arc<dyn ContentStore>, submitter: Arc<dyn TaskSubmitter>) -> Self {
        Self { content, submitter }
    }

    /// Store the user's edits and tell back-ends about the items that carry media objects.
    ///
    /// Returns the feedback task, or `None` when no item had media objects.
    pub async fn update_content(
        &self,
        user: UserId,
        kind: ContentKind,
        items: Vec<ContentItem>,
    ) -> Result<Option<TaskId>, ContentError> {
        if items.is_empty() {
            return Ok(None);
        }
        let mut guids = Vec::with_capacity(items.len());
        for item in &items {
            let guid = item.guid.clone().ok_or(ContentError::MissingGuid)?;
            if item.kind != kind {
                return Err(CoreError::InvalidContent(format!("item {guid} is not {kind} content")).into());
            }
            validate_all(&item.media_objects)?;
            guids.push(guid);
        }
        self.require_modify(user, &guids).await?;

        let updated = self.content.update_items(&items, false).await?;
        debug!(user_id = user, updated, "content updated");

        let feedback: Vec<ContentItem> = items
            .into_iter()
            .filter(|item| !item.media_objects.is_empty())
            .collect();
        if feedback.is_empty() {
            debug!(user_id = user, "no media objects changed, no feedback task");
            return Ok(None);
        }
        let details = TaskDetails::builder(TaskType::Feedback, kind)
            .user(user)
            .items(feedback)
            .build();
        let task_id = self.submitter.submit(details).await?;
        info!(user_id = user, task_id, "content update feedback scheduled");
        Ok(Some(task_id))
    }

    /// Forward a similarity judgement. Unknown or invisible items are left out.
    pub async fn similarity_feedback(
        &self,
        user: UserId,
        kind: ContentKind,
        references: Vec<Guid>,
        similar: Vec<Guid>,
        dissimilar: Vec<Guid>,
    ) -> Result<TaskId, ContentError> {
        let access = AccessContext::user(user);
        let references = self.visible(&access, references).await?;
        let similar = self.visible(&access, similar).await?;
        let dissimilar = self.visible(&access, dissimilar).await?;

        let details = TaskDetails::builder(TaskType::Feedback, kind)
            .user(user)
            .references(references)
            .similar(similar)
            .dissimilar(dissimilar)
            .build();
        let task_id = self.submitter.submit(details).await?;
        info!(user_id = user, task_id, "similarity feedback scheduled");
        Ok(task_id)
    }

    /// Remove the user's items and tell back-ends which ones are gone.
    ///
    /// Any item the user may not modify aborts the whole call. Unknown ids are ignored.
    pub async fn delete_content(
        &self,
        user: UserId,
        kind: ContentKind,
        guids: Vec<Guid>,
    ) -> Result<Option<TaskId>, ContentError> {
        let found = self.require_modify(user, &guids).await?;
        if found.is_empty() {
            debug!(user_id = user, "nothing to delete");
            return Ok(None);
        }
        let removed = self.content.remove_items(&found).await?;
        debug!(user_id = user, removed, "content removed");

        let details = TaskDetails::builder(TaskType::Feedback, kind)
            .user(user)
            .deleted(found)
            .build();
        let task_id = self.submitter.submit(details).await?;
        info!(user_id = user, task_id, "deletion feedback scheduled");
        Ok(Some(task_id))
    }

    /// Known guids, in request order, after checking the user may modify every one of them.
    async fn require_modify(&self, user: UserId, guids: &[Guid]) -> Result<Vec<Guid>, ContentError> {
        let levels = self.content.access_details(&AccessContext::user(user), guids).await?;
        let mut found = Vec::with_capacity(levels.len());
        for guid in guids {
            match levels.get(guid) {
                Some(level) if level.can_modify() => {
                    if !found.contains(guid) {
                        found.push(guid.clone());
                    }
                }
                Some(level) => {
                    warn!(user_id = user, guid = %guid, ?level, "permission denied");
                    return Err(ContentError::PermissionDenied(guid.clone()));
                }
                None => debug!(user_id = user, guid = %guid, "ignoring unknown item"),
            }
        }
        Ok(found)
    }

    async fn visible(&self, access: &AccessContext, guids: Vec<Guid>) -> Result<Vec<Guid>, ContentError> {
        if guids.is_empty() {
            return Ok(guids);
        }
        let found = self
            .content
            .get_items(access, &guids, &SearchFilters::default())
            .await?;
        Ok(guids
            .into_iter()
            .filter(|guid| found.iter().any(|item| item.guid.as_ref() == Some(guid)))
            .collect())
    }
}
