//! Task descriptors, their payloads and the result envelope back-ends report with.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::BackendStatusList;
use crate::content::{ContentItem, ContentKind};
use crate::error::CoreError;
use crate::status::TaskStatus;
use crate::{BackendId, Guid, TaskId, UserId};

/// Metadata key linking a follow-up task to the task that caused it.
pub const RELATED_TASK_ID: &str = "related_task_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Analysis,
    Feedback,
    BackendFeedback,
    Search,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Analysis => "ANALYSIS",
            Self::Feedback => "FEEDBACK",
            Self::BackendFeedback => "BACKEND_FEEDBACK",
            Self::Search => "SEARCH",
        };
        f.write_str(name)
    }
}

/// Analysis a back-end may be asked to run or to restrict results to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisType {
    Audio,
    FaceDetection,
    KeywordExtraction,
    Visual,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "AUDIO",
            Self::FaceDetection => "FACE_DETECTION",
            Self::KeywordExtraction => "KEYWORD_EXTRACTION",
            Self::Visual => "VISUAL",
        }
    }
}

/// The payload of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskContent {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<Guid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Guid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub similar: Vec<Guid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dissimilar: Vec<Guid>,
}

impl TaskContent {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
            && self.deleted.is_empty()
            && self.references.is_empty()
            && self.similar.is_empty()
            && self.dissimilar.is_empty()
    }

    fn has_similarity(&self) -> bool {
        !self.references.is_empty() || !self.similar.is_empty() || !self.dissimilar.is_empty()
    }

    /// Content made of items only, at least one.
    pub fn validate_items_only(&self) -> Result<(), CoreError> {
        if self.items.is_empty() {
            return Err(CoreError::InvalidContent("no content items".into()));
        }
        if !self.deleted.is_empty() || self.has_similarity() {
            return Err(CoreError::InvalidContent(
                "only content items are accepted for this task type".into(),
            ));
        }
        Ok(())
    }

    /// User feedback: deletions alone, items alone, or references with similar and/or dissimilar.
    pub fn validate_feedback(&self) -> Result<(), CoreError> {
        let groups = [!self.deleted.is_empty(), !self.items.is_empty(), self.has_similarity()];
        match groups.iter().filter(|present| **present).count() {
            0 => return Err(CoreError::InvalidContent("empty feedback".into())),
            1 => {}
            _ => {
                return Err(CoreError::InvalidContent(
                    "deleted items, content items and similarity feedback must be sent separately".into(),
                ))
            }
        }

        if self.has_similarity() {
            if self.references.is_empty() {
                return Err(CoreError::InvalidContent(
                    "similar or dissimilar items given without reference items".into(),
                ));
            }
            if self.similar.is_empty() && self.dissimilar.is_empty() {
                return Err(CoreError::InvalidContent(
                    "reference items given without similar or dissimilar items".into(),
                ));
            }
            let mut seen = HashSet::new();
            for guid in self.references.iter().chain(&self.similar).chain(&self.dissimilar) {
                if !seen.insert(guid) {
                    return Err(CoreError::InvalidContent(format!(
                        "item {guid} appears in more than one similarity list"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// An immutable task descriptor. Built with [`TaskDetails::builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetails {
    task_id: Option<TaskId>,
    task_type: TaskType,
    content_kind: ContentKind,
    user_id: Option<UserId>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    callback_uri: Option<String>,
    #[serde(default)]
    parameters: Vec<AnalysisType>,
    #[serde(default)]
    backends: BackendStatusList,
    #[serde(default)]
    content: TaskContent,
}

impl TaskDetails {
    pub fn builder(task_type: TaskType, content_kind: ContentKind) -> TaskDetailsBuilder {
        TaskDetailsBuilder {
            details: TaskDetails {
                task_id: None,
                task_type,
                content_kind,
                user_id: None,
                metadata: BTreeMap::new(),
                callback_uri: None,
                parameters: Vec::new(),
                backends: BackendStatusList::new(),
                content: TaskContent::default(),
            },
        }
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn content_kind(&self) -> ContentKind {
        self.content_kind
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn callback_uri(&self) -> Option<&str> {
        self.callback_uri.as_deref()
    }

    pub fn parameters(&self) -> &[AnalysisType] {
        &self.parameters
    }

    pub fn backends(&self) -> &BackendStatusList {
        &self.backends
    }

    pub fn content(&self) -> &TaskContent {
        &self.content
    }

    /// The task this one was derived from, if any.
    pub fn related_task_id(&self) -> Option<TaskId> {
        self.metadata.get(RELATED_TASK_ID).and_then(|v| v.parse().ok())
    }

    /// The same task, identified by a store-assigned id.
    pub fn with_task_id(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// The same task, addressed to a different set of back-ends.
    pub fn with_backends(mut self, backends: BackendStatusList) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_callback_uri(mut self, uri: impl Into<String>) -> Self {
        self.callback_uri = Some(uri.into());
        self
    }
}

/// Builder for [`TaskDetails`].
#[derive(Debug, Clone)]
pub struct TaskDetailsBuilder {
    details: TaskDetails,
}

impl TaskDetailsBuilder {
    pub fn task_id(mut self, task_id: TaskId) -> Self {
        self.details.task_id = Some(task_id);
        self
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.details.user_id = Some(user_id);
        self
    }

    pub fn maybe_user(mut self, user_id: Option<UserId>) -> Self {
        self.details.user_id = user_id;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.metadata.insert(key.into(), value.into());
        self
    }

    pub fn related_task(self, task_id: TaskId) -> Self {
        self.metadata(RELATED_TASK_ID, task_id.to_string())
    }

    pub fn callback_uri(mut self, uri: impl Into<String>) -> Self {
        self.details.callback_uri = Some(uri.into());
        self
    }

    pub fn parameters(mut self, parameters: impl IntoIterator<Item = AnalysisType>) -> Self {
        self.details.parameters.extend(parameters);
        self
    }

    pub fn backends(mut self, backends: BackendStatusList) -> Self {
        self.details.backends = backends;
        self
    }

    pub fn items(mut self, items: impl IntoIterator<Item = ContentItem>) -> Self {
        self.details.content.items.extend(items);
        self
    }

    pub fn deleted(mut self, guids: impl IntoIterator<Item = Guid>) -> Self {
        self.details.content.deleted.extend(guids);
        self
    }

    pub fn references(mut self, guids: impl IntoIterator<Item = Guid>) -> Self {
        self.details.content.references.extend(guids);
        self
    }

    pub fn similar(mut self, guids: impl IntoIterator<Item = Guid>) -> Self {
        self.details.content.similar.extend(guids);
        self
    }

    pub fn dissimilar(mut self, guids: impl IntoIterator<Item = Guid>) -> Self {
        self.details.content.dissimilar.extend(guids);
        self
    }

    pub fn build(self) -> TaskDetails {
        self.details
    }
}

/// The envelope a back-end posts when it finishes (part of) a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(default)]
    pub backend_id: Option<BackendId>,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub task_type: Option<TaskType>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub items: Vec<ContentItem>,
}

impl TaskResponse {
    pub fn new(backend_id: BackendId, task_id: TaskId, status: TaskStatus) -> Self {
        Self {
            backend_id: Some(backend_id),
            task_id: Some(task_id),
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_items(mut self, items: Vec<ContentItem>) -> Self {
        self.items = items;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guids(ids: &[&str]) -> Vec<Guid> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builder_sets_related_task() {
        let details = TaskDetails::builder(TaskType::BackendFeedback, ContentKind::Photo)
            .related_task(42)
            .build();
        assert_eq!(details.related_task_id(), Some(42));
        assert_eq!(details.task_id(), None);
    }

    #[test]
    fn items_only_rejects_empty_and_mixed() {
        let empty = TaskContent::default();
        assert!(empty.validate_items_only().is_err());

        let mut mixed = TaskContent {
            items: vec![ContentItem::new(ContentKind::Photo)],
            ..TaskContent::default()
        };
        assert!(mixed.validate_items_only().is_ok());
        mixed.deleted = guids(&["g1"]);
        assert!(mixed.validate_items_only().is_err());
    }

    #[test]
    fn feedback_groups_must_be_alone() {
        let deleted = TaskContent {
            deleted: guids(&["g1"]),
            ..TaskContent::default()
        };
        assert!(deleted.validate_feedback().is_ok());

        let both = TaskContent {
            deleted: guids(&["g1"]),
            items: vec![ContentItem::new(ContentKind::Video)],
            ..TaskContent::default()
        };
        assert!(both.validate_feedback().is_err());
        assert!(TaskContent::default().validate_feedback().is_err());
    }

    #[test]
    fn similarity_feedback_rules() {
        let without_refs = TaskContent {
            similar: guids(&["s1"]),
            ..TaskContent::default()
        };
        assert!(without_refs.validate_feedback().is_err());

        let refs_only = TaskContent {
            references: guids(&["r1"]),
            ..TaskContent::default()
        };
        assert!(refs_only.validate_feedback().is_err());

        let ok = TaskContent {
            references: guids(&["r1"]),
            dissimilar: guids(&["d1"]),
            ..TaskContent::default()
        };
        assert!(ok.validate_feedback().is_ok());

        let overlap = TaskContent {
            references: guids(&["r1"]),
            similar: guids(&["r1"]),
            ..TaskContent::default()
        };
        assert!(overlap.validate_feedback().is_err());
    }

    #[test]
    fn response_fields_default_when_missing() {
        let response: TaskResponse = serde_json::from_str(r#"{"backend_id":3}"#).unwrap();
        assert_eq!(response.backend_id, Some(3));
        assert_eq!(response.task_id, None);
        assert_eq!(response.status, None);
        assert!(response.items.is_empty());
    }
}
