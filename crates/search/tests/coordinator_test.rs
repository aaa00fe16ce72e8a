use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use contentflow_backend::{BackendClient, BackendError};
use contentflow_core::config::SearchConfig;
use contentflow_core::{
    AccessContext, AnalysisBackend, BackendId, Capability, ContentItem, ContentKind, Guid, MediaObject,
    SearchFilters, TaskDetails, Visibility,
};
use contentflow_search::{FederatedSearchCoordinator, SearchError, SimilarityQuery};
use contentflow_store::{ContentStore, MemoryStore, StaticRegistry};

enum Answer {
    Items(Vec<Guid>),
    Slow(Vec<Guid>),
    Fail,
}

/// Scripted search back-ends keyed by id.
struct ScriptedClient {
    answers: HashMap<BackendId, Answer>,
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl BackendClient for ScriptedClient {
    async fn submit_task(&self, _: &AnalysisBackend, _: &TaskDetails) -> Result<(), BackendError> {
        Ok(())
    }

    async fn search_similar(
        &self,
        backend: &AnalysisBackend,
        _kind: ContentKind,
        query: &str,
    ) -> Result<Vec<Guid>, BackendError> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.answers[&backend.backend_id] {
            Answer::Items(guids) => Ok(guids.clone()),
            Answer::Slow(guids) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(guids.clone())
            }
            Answer::Fail => Err(BackendError::Api {
                backend_id: backend.backend_id,
                status: 500,
                body: "boom".into(),
            }),
        }
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    seed: Guid,
    visible: Vec<Guid>,
    hidden: Guid,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let mut items = vec![ContentItem::new(ContentKind::Photo)
        .with_owner(1)
        .with_visibility(Visibility::Public)];
    for _ in 0..4 {
        items.push(
            ContentItem::new(ContentKind::Photo)
                .with_owner(3)
                .with_visibility(Visibility::Public),
        );
    }
    items.push(ContentItem::new(ContentKind::Photo).with_owner(2));
    let stored = store.insert_items(items).await.unwrap();
    let mut guids: Vec<Guid> = stored.into_iter().map(|i| i.guid.unwrap()).collect();
    let hidden = guids.pop().unwrap();
    let seed = guids.remove(0);
    Fixture {
        store,
        seed,
        visible: guids,
        hidden,
    }
}

fn search_backend(id: BackendId) -> AnalysisBackend {
    AnalysisBackend::new(id, format!("http://search-{id}.test/")).with_capabilities([Capability::PhotoSearch])
}

fn coordinator(
    store: Arc<MemoryStore>,
    answers: Vec<(BackendId, Answer)>,
) -> (FederatedSearchCoordinator, Arc<ScriptedClient>) {
    let registry = StaticRegistry::new(answers.iter().map(|(id, _)| search_backend(*id)).collect()).unwrap();
    let client = Arc::new(ScriptedClient {
        answers: answers.into_iter().collect(),
        queries: Mutex::new(Vec::new()),
    });
    let config = SearchConfig {
        timeout_ms: 100,
        max_concurrency: 2,
    };
    let coordinator = FederatedSearchCoordinator::new(Arc::new(registry), store, client.clone(), config);
    (coordinator, client)
}

fn guids_of(items: &[ContentItem]) -> Vec<Guid> {
    items.iter().map(|i| i.guid.clone().unwrap()).collect()
}

#[tokio::test]
async fn timed_out_backend_is_left_out() {
    let f = fixture().await;
    let (a, b, c, d) = (&f.visible[0], &f.visible[1], &f.visible[2], &f.visible[3]);
    let (coordinator, client) = coordinator(
        f.store.clone(),
        vec![
            (1, Answer::Items(vec![a.clone(), b.clone(), f.seed.clone()])),
            (2, Answer::Items(vec![b.clone(), c.clone(), "ghost".into(), f.hidden.clone()])),
            (3, Answer::Slow(vec![d.clone()])),
        ],
    );
    let access = AccessContext::user(1);
    let query = SimilarityQuery::by_id(f.seed.clone(), ContentKind::Photo);

    let first = coordinator.search(&access, &query).await.unwrap();
    let mut expected = vec![a.clone(), b.clone(), c.clone()];
    expected.sort();
    assert_eq!(guids_of(&first), expected);

    let second = coordinator.search(&access, &query).await.unwrap();
    assert_eq!(guids_of(&second), expected);

    let queries = client.queries.lock().unwrap();
    assert_eq!(queries.len(), 6);
    assert!(queries.iter().all(|q| *q == format!("uid={}", f.seed)));
}

#[tokio::test]
async fn seed_is_never_returned() {
    let f = fixture().await;
    let (coordinator, _) = coordinator(
        f.store.clone(),
        vec![
            (1, Answer::Items(vec![f.seed.clone()])),
            (2, Answer::Items(vec![f.seed.clone(), f.visible[0].clone()])),
        ],
    );
    let query = SimilarityQuery::by_id(f.seed.clone(), ContentKind::Photo);

    let only_seed = coordinator.search(&AccessContext::backend(), &query).await.unwrap();
    assert_eq!(guids_of(&only_seed), vec![f.visible[0].clone()]);
    assert!(only_seed.iter().all(|i| i.guid.as_ref() != Some(&f.seed)));
}

#[tokio::test]
async fn failing_backends_are_isolated() {
    let f = fixture().await;
    let (coordinator, _) = coordinator(
        f.store.clone(),
        vec![(1, Answer::Fail), (2, Answer::Items(vec![f.visible[1].clone()]))],
    );
    let query = SimilarityQuery::by_id(f.seed.clone(), ContentKind::Photo);

    let items = coordinator.search(&AccessContext::user(1), &query).await.unwrap();
    assert_eq!(guids_of(&items), vec![f.visible[1].clone()]);
}

#[tokio::test]
async fn unknown_or_invisible_seed_is_rejected() {
    let f = fixture().await;
    let (coordinator, client) = coordinator(f.store.clone(), vec![(1, Answer::Items(Vec::new()))]);

    let unknown = SimilarityQuery::by_id("missing", ContentKind::Photo);
    assert!(matches!(
        coordinator.search(&AccessContext::user(1), &unknown).await,
        Err(SearchError::InvalidSeed(_))
    ));

    let invisible = SimilarityQuery::by_id(f.hidden.clone(), ContentKind::Photo);
    assert!(matches!(
        coordinator.search(&AccessContext::user(1), &invisible).await,
        Err(SearchError::InvalidSeed(_))
    ));
    assert!(client.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn filters_apply_to_the_resolved_set() {
    let f = fixture().await;
    let (coordinator, client) = coordinator(
        f.store.clone(),
        vec![(1, Answer::Items(f.visible.clone()))],
    );
    let filters = SearchFilters {
        user_ids: vec![1],
        ..SearchFilters::default()
    };
    let query = SimilarityQuery::by_id(f.seed.clone(), ContentKind::Photo).with_filters(filters);

    // Everything the back-end found belongs to user 3.
    let items = coordinator.search(&AccessContext::user(1), &query).await.unwrap();
    assert!(items.is_empty());
    assert!(client.queries.lock().unwrap()[0].ends_with("&user_id=1"));
}

#[tokio::test]
async fn no_search_backends_means_no_results() {
    let f = fixture().await;
    let (coordinator, _) = coordinator(f.store.clone(), Vec::new());
    let query = SimilarityQuery::by_id(f.seed.clone(), ContentKind::Photo);
    assert!(coordinator.search(&AccessContext::user(1), &query).await.unwrap().is_empty());
}

#[tokio::test]
async fn similar_by_objects_matches_keywords() {
    let store = Arc::new(MemoryStore::new());
    let tagged = ContentItem::new(ContentKind::Photo)
        .with_owner(1)
        .with_media_object(MediaObject::keyword("k1", "Sunset"));
    let other = ContentItem::new(ContentKind::Photo)
        .with_owner(1)
        .with_media_object(MediaObject::keyword("k2", "forest"));
    let stored = store.insert_items(vec![tagged, other]).await.unwrap();
    let (coordinator, _) = coordinator(store.clone(), Vec::new());

    let query = [MediaObject::keyword("q", "sunset")];
    let items = coordinator
        .similar_by_objects(&AccessContext::user(1), ContentKind::Photo, &query, &SearchFilters::default())
        .await
        .unwrap();
    assert_eq!(guids_of(&items), vec![stored[0].guid.clone().unwrap()]);

    assert!(matches!(
        coordinator
            .similar_by_objects(&AccessContext::user(1), ContentKind::Photo, &[], &SearchFilters::default())
            .await,
        Err(SearchError::InvalidQuery(_))
    ));
}
