//! Federated similarity search across every search-capable back-end.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use contentflow_backend::BackendClient;
use contentflow_core::config::SearchConfig;
use contentflow_core::{AccessContext, AnalysisBackend, ContentItem, ContentKind, Guid, MediaObject, SearchFilters};
use contentflow_store::{BackendRegistry, ContentStore};

use crate::error::SearchError;

/// A similarity search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityQuery {
    /// Item to find similar content for. Never part of the result.
    pub seed: Option<Guid>,
    pub kind: ContentKind,
    pub filters: SearchFilters,
}

impl SimilarityQuery {
    pub fn by_id(seed: impl Into<Guid>, kind: ContentKind) -> Self {
        Self {
            seed: Some(seed.into()),
            kind,
            filters: SearchFilters::default(),
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Query string shared by every back-end of one search.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        if let Some(seed) = &self.seed {
            serializer.append_pair("uid", seed);
        }
        for (key, value) in self.filters.query_pairs() {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }
}

pub struct FederatedSearchCoordinator {
    registry: Arc<dyn BackendRegistry>,
    content: Arc<dyn ContentStore>,
    client: Arc<dyn BackendClient>,
    config: SearchConfig,
}

impl FederatedSearchCoordinator {
    pub fn new(
        registry: Arc<dyn BackendRegistry>,
        content: Arc<dyn ContentStore>,
        client: Arc<dyn BackendClient>,
        config: SearchConfig,
    ) -> Self {
        Self {
            registry,
            content,
            client,
            config,
        }
    }

    /// Ask every capable back-end, merge their answers and return what the caller may see.
    ///
    /// A back-end that fails or exceeds the per-call timeout is left out of
    /// the result. Items come back in store order and never include the seed.
    pub async fn search(
        &self,
        access: &AccessContext,
        query: &SimilarityQuery,
    ) -> Result<Vec<ContentItem>, SearchError> {
        if let Some(seed) = &query.seed {
            let found = self
                .content
                .get_items(access, std::slice::from_ref(seed), &SearchFilters::default())
                .await?;
            if found.is_empty() {
                return Err(SearchError::InvalidSeed(seed.clone()));
            }
        }

        let backends = self.registry.backends(&[query.kind.search_capability()]).await?;
        if backends.is_empty() {
            debug!(kind = %query.kind, "no search back-ends available");
            return Ok(Vec::new());
        }

        let encoded = query.encode();
        let concurrency = backends.len().min(self.config.max_concurrency.max(1));
        let answers: Vec<Vec<Guid>> = stream::iter(&backends)
            .map(|backend| self.ask(backend, query.kind, &encoded))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut guids: BTreeSet<Guid> = answers.into_iter().flatten().collect();
        if let Some(seed) = &query.seed {
            guids.remove(seed);
        }
        if guids.is_empty() {
            return Ok(Vec::new());
        }

        let guids: Vec<Guid> = guids.into_iter().collect();
        let mut items = self.content.get_items(access, &guids, &query.filters).await?;
        if let Some(seed) = &query.seed {
            items.retain(|item| item.guid.as_ref() != Some(seed));
        }
        info!(
            kind = %query.kind,
            backends = backends.len(),
            candidates = guids.len(),
            results = items.len(),
            "similarity search finished"
        );
        Ok(items)
    }

    /// Store-only search for items carrying matching media objects.
    pub async fn similar_by_objects(
        &self,
        access: &AccessContext,
        kind: ContentKind,
        objects: &[MediaObject],
        filters: &SearchFilters,
    ) -> Result<Vec<ContentItem>, SearchError> {
        if objects.is_empty() {
            return Err(SearchError::InvalidQuery("no media objects given".into()));
        }
        Ok(self.content.search_by_objects(access, kind, objects, filters).await?)
    }

    async fn ask(&self, backend: &AnalysisBackend, kind: ContentKind, query: &str) -> Vec<Guid> {
        let call = self.client.search_similar(backend, kind, query);
        match tokio::time::timeout(self.config.timeout(), call).await {
            Ok(Ok(guids)) => {
                debug!(backend_id = backend.backend_id, found = guids.len(), "back-end answered");
                guids
            }
            Ok(Err(e)) => {
                warn!(backend_id = backend.backend_id, error = %e, "search call failed");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    backend_id = backend.backend_id,
                    timeout_ms = self.config.timeout_ms,
                    "search call timed out"
                );
                Vec::new()
            }
        }
    }
}
