use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use contentflow_core::{
    AnalysisType, ContentItem, ContentKind, Guid, MaxTaskSize, ServiceType, TaskDetails, TaskId, TaskType,
    UserId,
};
use contentflow_events::{topics, BroadcastPublisher, EventSubscriber, SyncComplete};
use contentflow_store::{ContentStore, EntryStore, ExternalEntry, MemoryStore};
use contentflow_sync::{ContentSource, ContentSynchronizer, RemoteItem, SyncError};
use contentflow_tasks::{OrchestratorError, SchedulerError, TaskSubmitter};

// ============================================================================
// Test Helpers
// ============================================================================

struct FixedSource {
    items: Vec<RemoteItem>,
}

#[async_trait]
impl ContentSource for FixedSource {
    fn service_type(&self) -> ServiceType {
        ServiceType::Picasa
    }

    fn content_kind(&self) -> ContentKind {
        ContentKind::Photo
    }

    fn analysis_parameters(&self) -> Vec<AnalysisType> {
        vec![AnalysisType::KeywordExtraction]
    }

    async fn fetch(&self, _user: UserId) -> Result<Vec<RemoteItem>, SyncError> {
        Ok(self.items.clone())
    }
}

struct BrokenSource;

#[async_trait]
impl ContentSource for BrokenSource {
    fn service_type(&self) -> ServiceType {
        ServiceType::Picasa
    }

    fn content_kind(&self) -> ContentKind {
        ContentKind::Photo
    }

    async fn fetch(&self, _user: UserId) -> Result<Vec<RemoteItem>, SyncError> {
        Err(SyncError::Source("provider unavailable".into()))
    }
}

/// Records tasks; refuses every task of `refuse` type.
#[derive(Default)]
struct RecordingSubmitter {
    tasks: Mutex<Vec<TaskDetails>>,
    refuse: Option<TaskType>,
}

#[async_trait]
impl TaskSubmitter for RecordingSubmitter {
    async fn submit(&self, details: TaskDetails) -> Result<TaskId, OrchestratorError> {
        if Some(details.task_type()) == self.refuse {
            return Err(OrchestratorError::Schedule {
                task_id: 0,
                source: SchedulerError::ShutDown,
            });
        }
        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(details);
        Ok(tasks.len() as TaskId)
    }
}

fn remote(id: &str) -> RemoteItem {
    RemoteItem {
        remote_id: id.to_string(),
        locator: Some("album".into()),
        updated: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        item: ContentItem::new(ContentKind::Photo),
    }
}

/// Store `count` items for user 1, each linked to remote id `r{n}`.
async fn known_items(store: &MemoryStore, count: usize) -> Vec<Guid> {
    let items = (0..count)
        .map(|_| {
            let mut item = ContentItem::new(ContentKind::Photo).with_owner(1);
            item.service_type = Some(ServiceType::Picasa);
            item
        })
        .collect();
    let stored = store.insert_items(items).await.unwrap();
    let entries: Vec<ExternalEntry> = stored
        .iter()
        .enumerate()
        .map(|(n, item)| ExternalEntry {
            guid: item.guid.clone().unwrap(),
            user_id: 1,
            service_type: ServiceType::Picasa,
            remote_id: format!("r{n}"),
            locator: Some("album".into()),
            updated: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        })
        .collect();
    store.upsert_entries(&entries).await.unwrap();
    stored.into_iter().map(|i| i.guid.unwrap()).collect()
}

fn listing() -> Vec<RemoteItem> {
    (0..8)
        .map(|n| remote(&format!("r{n}")))
        .chain((0..4).map(|n| remote(&format!("n{n}"))))
        .collect()
}

fn max(n: i64) -> MaxTaskSize {
    MaxTaskSize::from_config(n)
}

// ============================================================================
// Synchronization
// ============================================================================

#[tokio::test]
async fn diff_becomes_batched_tasks() {
    let store = Arc::new(MemoryStore::new());
    let known = known_items(&store, 10).await;
    let submitter = Arc::new(RecordingSubmitter::default());
    let sync = ContentSynchronizer::new(
        Arc::new(FixedSource { items: listing() }),
        store.clone(),
        store.clone(),
        submitter.clone(),
        max(5),
    );

    let report = sync.synchronize(1).await.unwrap();
    assert_eq!((report.matched, report.inserted, report.removed), (8, 4, 2));
    assert_eq!(report.changed, 8);
    assert_eq!(
        (report.deletion_batches, report.update_batches, report.analysis_batches),
        (1, 2, 1)
    );
    assert_eq!(report.task_ids, vec![1, 2, 3, 4]);
    assert_eq!(report.failed_batches, 0);

    let tasks = submitter.tasks.lock().unwrap();
    assert_eq!(tasks[0].task_type(), TaskType::Feedback);
    let mut deleted = tasks[0].content().deleted.clone();
    deleted.sort();
    let mut lost = known[8..].to_vec();
    lost.sort();
    assert_eq!(deleted, lost);
    assert_eq!(tasks[1].content().items.len(), 5);
    assert_eq!(tasks[2].content().items.len(), 3);
    assert_eq!(tasks[3].task_type(), TaskType::Analysis);
    assert_eq!(tasks[3].content().items.len(), 4);
    assert_eq!(tasks[3].parameters(), &[AnalysisType::KeywordExtraction]);
    assert!(tasks.iter().all(|t| t.user_id() == Some(1)));

    // Matched items keep their GUIDs, new ones were minted.
    let updated: Vec<&Guid> = tasks[1..3]
        .iter()
        .flat_map(|t| t.content().items.iter().filter_map(|i| i.guid.as_ref()))
        .collect();
    assert_eq!(updated, known[..8].iter().collect::<Vec<_>>());
    assert!(tasks[3].content().items.iter().all(|i| i.guid.is_some()));
    drop(tasks);

    assert!(store.resolve_owners(&known[8..]).await.unwrap().is_empty());
    let entries = store.entries(1, ServiceType::Picasa).await.unwrap();
    assert_eq!(entries.len(), 12);
    assert!(entries.iter().any(|e| e.remote_id == "n3"));
    assert!(!entries.iter().any(|e| e.remote_id == "r9"));
}

#[tokio::test]
async fn second_run_only_updates() {
    let store = Arc::new(MemoryStore::new());
    known_items(&store, 10).await;
    let submitter = Arc::new(RecordingSubmitter::default());
    let sync = ContentSynchronizer::new(
        Arc::new(FixedSource { items: listing() }),
        store.clone(),
        store.clone(),
        submitter.clone(),
        max(-1),
    );

    sync.synchronize(1).await.unwrap();
    let again = sync.synchronize(1).await.unwrap();
    assert_eq!((again.matched, again.inserted, again.removed, again.changed), (12, 0, 0, 0));
    assert_eq!((again.deletion_batches, again.update_batches, again.analysis_batches), (0, 1, 0));
}

#[tokio::test]
async fn failed_batch_does_not_stop_the_others() {
    let store = Arc::new(MemoryStore::new());
    known_items(&store, 10).await;
    let submitter = Arc::new(RecordingSubmitter {
        refuse: Some(TaskType::Feedback),
        ..Default::default()
    });
    let sync = ContentSynchronizer::new(
        Arc::new(FixedSource { items: listing() }),
        store.clone(),
        store.clone(),
        submitter.clone(),
        max(5),
    );

    let report = sync.synchronize(1).await.unwrap();
    assert_eq!(report.failed_batches, 3);
    assert_eq!(report.task_ids.len(), 1);
    assert_eq!(submitter.tasks.lock().unwrap()[0].task_type(), TaskType::Analysis);
}

#[tokio::test]
async fn completion_is_published() {
    let store = Arc::new(MemoryStore::new());
    known_items(&store, 2).await;
    let publisher = Arc::new(BroadcastPublisher::new());
    let events = publisher.subscriber();
    events.subscribe(topics::SYNC_COMPLETE).await.unwrap();
    let sync = ContentSynchronizer::new(
        Arc::new(FixedSource { items: vec![remote("r0")] }),
        store.clone(),
        store.clone(),
        Arc::new(RecordingSubmitter::default()),
        max(-1),
    )
    .with_events(publisher);

    let report = sync.synchronize(1).await.unwrap();
    let event: SyncComplete = events.recv().await.unwrap().decode().unwrap();
    assert_eq!(event.user_id, 1);
    assert_eq!((event.matched, event.inserted, event.removed), (1, 0, 1));
    assert_eq!(event.task_ids, report.task_ids);
}

#[tokio::test]
async fn source_failure_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    known_items(&store, 3).await;
    let writes = store.write_count();
    let sync = ContentSynchronizer::new(
        Arc::new(BrokenSource),
        store.clone(),
        store.clone(),
        Arc::new(RecordingSubmitter::default()),
        max(5),
    );

    assert!(matches!(sync.synchronize(1).await, Err(SyncError::Source(_))));
    assert_eq!(store.write_count(), writes);
}
