use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use contentflow_core::{AnalysisBackend, ContentKind, Guid, TaskDetails};

use crate::traits::{BackendClient, BackendError};

/// Operation a back-end exposes for receiving new tasks.
pub const ADD_TASK: &str = "addTask";

/// HTTP/JSON client for analysis back-ends.
pub struct HttpBackendClient {
    client: Client,
}

impl HttpBackendClient {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn check(backend: &AnalysisBackend, response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Api {
            backend_id: backend.backend_id,
            status,
            body,
        })
    }

    fn map_err(backend: &AnalysisBackend, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout(backend.backend_id)
        } else {
            BackendError::Http(e)
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    guid: Guid,
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn submit_task(&self, backend: &AnalysisBackend, task: &TaskDetails) -> Result<(), BackendError> {
        let url = backend.operation_url(ADD_TASK);
        debug!(backend_id = backend.backend_id, task_id = ?task.task_id(), url = %url, "submitting task");

        let response = self
            .client
            .post(url)
            .json(task)
            .send()
            .await
            .map_err(|e| Self::map_err(backend, e))?;
        Self::check(backend, response).await?;
        Ok(())
    }

    async fn search_similar(
        &self,
        backend: &AnalysisBackend,
        kind: ContentKind,
        query: &str,
    ) -> Result<Vec<Guid>, BackendError> {
        let mut url = backend.operation_url(kind.similar_by_id_operation());
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        debug!(backend_id = backend.backend_id, url = %url, "similarity search");

        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| Self::map_err(backend, e))?;
        let parsed: SearchResponse = Self::check(backend, response)
            .await?
            .json()
            .await
            .map_err(|e| Self::map_err(backend, e))?;
        Ok(parsed.items.into_iter().map(|hit| hit.guid).collect())
    }
}
