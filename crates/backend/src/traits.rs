use async_trait::async_trait;
use thiserror::Error;

use contentflow_core::{AnalysisBackend, BackendId, ContentKind, Guid, TaskDetails};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend {backend_id} returned {status}: {body}")]
    Api {
        backend_id: BackendId,
        status: u16,
        body: String,
    },

    #[error("backend {0} timed out")]
    Timeout(BackendId),
}

/// Transport to analysis back-ends.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Hand a task to a back-end. Success means the back-end accepted it.
    async fn submit_task(&self, backend: &AnalysisBackend, task: &TaskDetails) -> Result<(), BackendError>;

    /// Ask a back-end for items similar to a seed. `query` is an already
    /// encoded query string shared by every back-end of one search.
    async fn search_similar(
        &self,
        backend: &AnalysisBackend,
        kind: ContentKind,
        query: &str,
    ) -> Result<Vec<Guid>, BackendError>;
}
