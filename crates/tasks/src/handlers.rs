//! Per task-type behaviour, looked up through a registration table.

use std::collections::HashMap;
use std::sync::Arc;

use contentflow_core::{Capability, ContentKind, CoreError, TaskContent, TaskType};

/// What the orchestrator needs to know about one task type.
pub trait TaskHandler: Send + Sync {
    fn task_type(&self) -> TaskType;

    /// Capabilities every back-end of such a task must declare.
    fn required_capabilities(&self, kind: ContentKind) -> Vec<Capability>;

    /// Check the payload shape before the task is persisted.
    fn validate(&self, content: &TaskContent) -> Result<(), CoreError>;

    /// Whether a finished result is forwarded to sibling back-ends.
    fn cascades_feedback(&self) -> bool {
        false
    }
}

pub struct AnalysisHandler;

impl TaskHandler for AnalysisHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Analysis
    }

    fn required_capabilities(&self, kind: ContentKind) -> Vec<Capability> {
        vec![kind.analysis_capability()]
    }

    fn validate(&self, content: &TaskContent) -> Result<(), CoreError> {
        content.validate_items_only()
    }

    fn cascades_feedback(&self) -> bool {
        true
    }
}

/// User feedback: edits, deletions and similarity judgements.
pub struct FeedbackHandler;

impl TaskHandler for FeedbackHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Feedback
    }

    fn required_capabilities(&self, kind: ContentKind) -> Vec<Capability> {
        vec![kind.analysis_capability(), Capability::UserFeedback]
    }

    fn validate(&self, content: &TaskContent) -> Result<(), CoreError> {
        content.validate_feedback()
    }
}

/// Results of one back-end forwarded to the others.
pub struct BackendFeedbackHandler;

impl TaskHandler for BackendFeedbackHandler {
    fn task_type(&self) -> TaskType {
        TaskType::BackendFeedback
    }

    fn required_capabilities(&self, kind: ContentKind) -> Vec<Capability> {
        vec![kind.analysis_capability(), Capability::BackendFeedback]
    }

    fn validate(&self, content: &TaskContent) -> Result<(), CoreError> {
        content.validate_items_only()
    }
}

#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analysis, feedback and backend feedback. Search runs synchronously and has no handler.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register(Arc::new(AnalysisHandler));
        table.register(Arc::new(FeedbackHandler));
        table.register(Arc::new(BackendFeedbackHandler));
        table
    }

    /// Register a handler, replacing any previous one for the same type.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.task_type(), handler);
    }

    pub fn get(&self, task_type: TaskType) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(&task_type)
    }

    pub fn supports(&self, task_type: TaskType) -> bool {
        self.handlers.contains_key(&task_type)
    }
}
