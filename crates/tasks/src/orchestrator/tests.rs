#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use contentflow_backend::{BackendClient, BackendError};
    use contentflow_core::config::TaskConfig;
    use contentflow_core::{
        AnalysisBackend, BackendId, BackendStatusList, Capability, ContentItem, ContentKind, Guid,
        MediaObject, TaskDetails, TaskResponse, TaskStatus, TaskType, UserId,
    };
    use contentflow_events::{topics, BroadcastPublisher, BroadcastSubscriber, EventSubscriber, TaskFinished};
    use contentflow_store::{ContentStore, MemoryStore, StaticRegistry, TaskStore};

    use crate::error::{IngestError, OrchestratorError};
    use crate::orchestrator::TaskOrchestrator;
    use crate::scheduler::QueuedScheduler;

    /// Records accepted submissions; back-ends in `failing` refuse.
    #[derive(Default)]
    struct RecordingClient {
        submitted: Mutex<Vec<BackendId>>,
        failing: HashSet<BackendId>,
    }

    #[async_trait]
    impl BackendClient for RecordingClient {
        async fn submit_task(&self, backend: &AnalysisBackend, _task: &TaskDetails) -> Result<(), BackendError> {
            if self.failing.contains(&backend.backend_id) {
                return Err(BackendError::Api {
                    backend_id: backend.backend_id,
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            self.submitted.lock().unwrap().push(backend.backend_id);
            Ok(())
        }

        async fn search_similar(
            &self,
            _backend: &AnalysisBackend,
            _kind: ContentKind,
            _query: &str,
        ) -> Result<Vec<Guid>, BackendError> {
            Ok(Vec::new())
        }
    }

    struct Harness {
        orchestrator: TaskOrchestrator,
        store: Arc<MemoryStore>,
        scheduler: Arc<QueuedScheduler>,
        client: Arc<RecordingClient>,
        events: BroadcastSubscriber,
    }

    fn backend(id: BackendId, capabilities: &[Capability]) -> AnalysisBackend {
        AnalysisBackend::new(id, format!("http://backend-{id}.test/")).with_capabilities(capabilities.iter().copied())
    }

    fn feedback_backend(id: BackendId) -> AnalysisBackend {
        backend(id, &[Capability::PhotoAnalysis, Capability::BackendFeedback, Capability::UserFeedback])
    }

    fn harness(backends: Vec<AnalysisBackend>, failing: &[BackendId]) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(QueuedScheduler::new());
        let client = Arc::new(RecordingClient {
            failing: failing.iter().copied().collect(),
            ..Default::default()
        });
        let publisher = BroadcastPublisher::new();
        let events = publisher.subscriber();
        let orchestrator = TaskOrchestrator::new(
            Arc::new(StaticRegistry::new(backends).unwrap()),
            store.clone(),
            store.clone(),
            scheduler.clone(),
            Arc::new(publisher),
            client.clone(),
            TaskConfig::default(),
        );
        Harness {
            orchestrator,
            store,
            scheduler,
            client,
            events,
        }
    }

    async fn stored_item(store: &MemoryStore, owner: UserId) -> Guid {
        let item = ContentItem::new(ContentKind::Photo).with_owner(owner);
        store.insert_items(vec![item]).await.unwrap()[0].guid.clone().unwrap()
    }

    fn analysis(guid: &str, user: Option<UserId>) -> TaskDetails {
        TaskDetails::builder(TaskType::Analysis, ContentKind::Photo)
            .maybe_user(user)
            .items(vec![ContentItem::new(ContentKind::Photo).with_guid(guid)])
            .build()
    }

    fn result_item(guid: &str, object_id: &str) -> ContentItem {
        ContentItem::new(ContentKind::Photo)
            .with_guid(guid)
            .with_media_object(MediaObject::keyword(object_id, "cat"))
    }

    async fn status_of(h: &Harness, task_id: i64, backend_id: BackendId) -> TaskStatus {
        h.store.backend_status(backend_id, task_id).await.unwrap().unwrap().status
    }

    // ── Creation ────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_uses_capable_registry_backends() {
        let h = harness(
            vec![feedback_backend(1), backend(2, &[Capability::PhotoAnalysis]), backend(3, &[Capability::VideoAnalysis])],
            &[],
        );
        let guid = stored_item(&h.store, 1).await;

        let task_id = h.orchestrator.create_and_schedule(analysis(&guid, Some(1))).await.unwrap();

        let task = h.store.task(task_id).await.unwrap().unwrap();
        assert_eq!(task.task_id(), Some(task_id));
        assert_eq!(task.backends().backend_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert!(task.backends().iter().all(|row| row.status == TaskStatus::NotStarted));
        assert!(task.callback_uri().is_some());
        assert_eq!(h.scheduler.len().await, 1);
        assert_eq!(h.orchestrator.combined_status(task_id).await.unwrap(), TaskStatus::NotStarted);
    }

    #[tokio::test]
    async fn create_rejects_unsupported_type_without_writes() {
        let h = harness(vec![feedback_backend(1)], &[]);
        let search = TaskDetails::builder(TaskType::Search, ContentKind::Photo).user(1).build();

        let err = h.orchestrator.create_and_schedule(search).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnsupportedTaskType(TaskType::Search)));
        assert_eq!(h.store.write_count(), 0);
        assert_eq!(h.scheduler.len().await, 0);
    }

    #[tokio::test]
    async fn explicit_backends_without_capabilities_are_a_hard_error() {
        let plain = backend(3, &[Capability::PhotoAnalysis]);
        let h = harness(vec![feedback_backend(1), plain.clone()], &[]);
        let guid = stored_item(&h.store, 1).await;
        let writes = h.store.write_count();

        let feedback = TaskDetails::builder(TaskType::Feedback, ContentKind::Photo)
            .user(1)
            .deleted(vec![guid])
            .backends(BackendStatusList::not_started(vec![plain]))
            .build();
        let err = h.orchestrator.create_and_schedule(feedback).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NoCapableBackends { .. }));
        assert_eq!(h.store.write_count(), writes);
    }

    #[tokio::test]
    async fn invalid_content_is_rejected() {
        let h = harness(vec![feedback_backend(1)], &[]);
        let empty = TaskDetails::builder(TaskType::Feedback, ContentKind::Photo).user(1).build();

        let err = h.orchestrator.create_and_schedule(empty).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTask(_)));
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn existing_task_id_is_only_rescheduled() {
        let h = harness(vec![feedback_backend(1)], &[]);
        let guid = stored_item(&h.store, 1).await;
        let task_id = h.orchestrator.create_and_schedule(analysis(&guid, Some(1))).await.unwrap();
        let writes = h.store.write_count();

        let again = h.store.task(task_id).await.unwrap().unwrap();
        assert_eq!(h.orchestrator.create_and_schedule(again).await.unwrap(), task_id);
        assert_eq!(h.store.write_count(), writes);
        assert_eq!(h.scheduler.len().await, 2);
    }

    // ── Dispatch ────────────────────────────────────────────────────

    #[tokio::test]
    async fn dispatch_acknowledges_accepted_submissions() {
        let h = harness(vec![feedback_backend(1), feedback_backend(2), feedback_backend(3)], &[2]);
        let guid = stored_item(&h.store, 1).await;
        let task_id = h.orchestrator.create_and_schedule(analysis(&guid, Some(1))).await.unwrap();

        let report = h.orchestrator.dispatch(task_id).await.unwrap();
        assert_eq!(report.submitted, vec![1, 3]);
        assert_eq!(report.failed, vec![2]);
        assert!(report.skipped.is_empty());

        assert_eq!(status_of(&h, task_id, 1).await, TaskStatus::InProgress);
        assert_eq!(status_of(&h, task_id, 2).await, TaskStatus::NotStarted);
        assert_eq!(status_of(&h, task_id, 3).await, TaskStatus::InProgress);

        // Only the row that is still waiting is retried.
        let retry = h.orchestrator.dispatch(task_id).await.unwrap();
        assert_eq!(retry.failed, vec![2]);
        assert!(retry.submitted.is_empty());
        assert_eq!(h.client.submitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn anonymous_tasks_skip_backends_without_capability() {
        let anonymous = backend(1, &[Capability::PhotoAnalysis, Capability::AnonymousTask]);
        let h = harness(vec![anonymous, backend(2, &[Capability::PhotoAnalysis])], &[]);
        let guid = stored_item(&h.store, 1).await;
        let task_id = h.orchestrator.create_and_schedule(analysis(&guid, None)).await.unwrap();

        let report = h.orchestrator.dispatch(task_id).await.unwrap();
        assert_eq!(report.submitted, vec![1]);
        assert_eq!(report.skipped, vec![2]);
        assert_eq!(status_of(&h, task_id, 2).await, TaskStatus::NotStarted);
    }

    #[tokio::test]
    async fn dispatch_of_unknown_task_fails() {
        let h = harness(vec![feedback_backend(1)], &[]);
        assert!(matches!(
            h.orchestrator.dispatch(42).await,
            Err(OrchestratorError::TaskNotFound(42))
        ));
    }

    // ── Ingestion ───────────────────────────────────────────────────

    #[tokio::test]
    async fn combined_status_waits_for_every_backend() {
        let h = harness(vec![backend(1, &[Capability::PhotoAnalysis]), backend(2, &[Capability::PhotoAnalysis])], &[]);
        let guid = stored_item(&h.store, 1).await;
        let task_id = h.orchestrator.create_and_schedule(analysis(&guid, Some(1))).await.unwrap();
        h.orchestrator.dispatch(task_id).await.unwrap();
        assert_eq!(h.orchestrator.combined_status(task_id).await.unwrap(), TaskStatus::InProgress);

        h.orchestrator
            .ingest_result(TaskResponse::new(1, task_id, TaskStatus::Completed))
            .await
            .unwrap();
        assert_eq!(h.orchestrator.combined_status(task_id).await.unwrap(), TaskStatus::InProgress);

        h.orchestrator
            .ingest_result(TaskResponse::new(2, task_id, TaskStatus::Completed))
            .await
            .unwrap();
        assert_eq!(h.orchestrator.combined_status(task_id).await.unwrap(), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn persisted_status_is_the_last_one_set() {
        let h = harness(vec![backend(1, &[Capability::PhotoAnalysis])], &[]);
        let guid = stored_item(&h.store, 1).await;
        let task_id = h.orchestrator.create_and_schedule(analysis(&guid, Some(1))).await.unwrap();

        let report = h
            .orchestrator
            .ingest_result(TaskResponse::new(1, task_id, TaskStatus::Completed))
            .await
            .unwrap();
        assert_eq!(report.status, TaskStatus::Completed);
        assert_eq!(status_of(&h, task_id, 1).await, TaskStatus::Completed);

        // Reported COMPLETED, but the result is invalid: ERROR is what sticks.
        let mut bad = MediaObject::keyword("k1", "cat");
        bad.confidence = Some(2.0);
        let item = ContentItem::new(ContentKind::Photo).with_guid(guid.clone()).with_media_object(bad);
        let response = TaskResponse::new(1, task_id, TaskStatus::Completed).with_items(vec![item]);
        let err = h.orchestrator.ingest_result(response).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(status_of(&h, task_id, 1).await, TaskStatus::Error);

        let mut missing = TaskResponse::new(1, task_id, TaskStatus::Completed);
        missing.status = None;
        h.orchestrator.ingest_result(missing).await.unwrap();
        assert_eq!(status_of(&h, task_id, 1).await, TaskStatus::Unknown);
    }

    #[tokio::test]
    async fn unassigned_results_leave_the_store_untouched() {
        let h = harness(vec![backend(1, &[Capability::PhotoAnalysis]), backend(2, &[Capability::VideoAnalysis])], &[]);
        let guid = stored_item(&h.store, 1).await;
        let task_id = h.orchestrator.create_and_schedule(analysis(&guid, Some(1))).await.unwrap();
        let writes = h.store.write_count();

        let foreign = TaskResponse::new(2, task_id, TaskStatus::Completed).with_items(vec![result_item(&guid, "k1")]);
        let err = h.orchestrator.ingest_result(foreign).await.unwrap_err();
        assert!(matches!(err, IngestError::NotAssigned { backend_id: 2, .. }));

        let unknown_task = TaskResponse::new(1, task_id + 100, TaskStatus::Completed);
        assert!(matches!(
            h.orchestrator.ingest_result(unknown_task).await,
            Err(IngestError::NotAssigned { .. })
        ));

        let mut malformed = TaskResponse::new(1, task_id, TaskStatus::Completed);
        malformed.backend_id = None;
        assert!(matches!(
            h.orchestrator.ingest_result(malformed).await,
            Err(IngestError::Malformed(_))
        ));

        assert_eq!(h.store.write_count(), writes);
    }

    #[tokio::test]
    async fn cross_owner_object_fails_the_backend() {
        let h = harness(vec![backend(1, &[Capability::PhotoAnalysis])], &[]);
        h.events.subscribe(topics::TASK_PREFIX).await.unwrap();
        let guid = stored_item(&h.store, 1).await;
        let task_id = h.orchestrator.create_and_schedule(analysis(&guid, Some(1))).await.unwrap();
        let writes = h.store.write_count();

        let mut object = MediaObject::keyword("k1", "cat");
        object.owner = Some(2);
        let item = ContentItem::new(ContentKind::Photo).with_guid(guid.clone()).with_media_object(object);
        let response = TaskResponse::new(1, task_id, TaskStatus::Completed).with_items(vec![item]);

        let err = h.orchestrator.ingest_result(response).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(status_of(&h, task_id, 1).await, TaskStatus::Error);
        // The status row is the only write.
        assert_eq!(h.store.write_count(), writes + 1);

        let event: TaskFinished = h.events.recv().await.unwrap().decode().unwrap();
        assert_eq!(event.task_id, task_id);
        assert_eq!(event.backend_id, 1);
        assert_eq!(event.status, TaskStatus::Error);
    }

    #[tokio::test]
    async fn merged_objects_are_stored_with_item_statuses() {
        let h = harness(vec![backend(1, &[Capability::PhotoAnalysis])], &[]);
        let guid = stored_item(&h.store, 1).await;
        let task_id = h.orchestrator.create_and_schedule(analysis(&guid, Some(1))).await.unwrap();

        let response = TaskResponse::new(1, task_id, TaskStatus::Completed)
            .with_items(vec![result_item(&guid, "k1"), result_item("unknown-guid", "k2")]);
        let report = h.orchestrator.ingest_result(response).await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.feedback_task, None);

        let stored = h
            .store
            .get_items(&contentflow_core::AccessContext::user(1), &[guid.clone()], &Default::default())
            .await
            .unwrap();
        assert_eq!(stored[0].media_objects.len(), 1);
        assert_eq!(stored[0].media_objects[0].owner, Some(1));
        assert_eq!(stored[0].media_objects[0].backend_id, Some(1));

        let statuses = h.store.item_statuses(task_id, &guid).await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, TaskStatus::Completed);

        // Reporting the same object again updates it in place.
        let again = TaskResponse::new(1, task_id, TaskStatus::Completed).with_items(vec![result_item(&guid, "k1")]);
        let report = h.orchestrator.ingest_result(again).await.unwrap();
        assert_eq!((report.inserted, report.updated), (0, 1));
    }

    // ── Cascade ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn analysis_results_cascade_to_participating_feedback_backends() {
        let plain = backend(3, &[Capability::PhotoAnalysis]);
        let outsider = feedback_backend(4);
        let h = harness(vec![feedback_backend(1), feedback_backend(2), plain, outsider], &[]);
        let guid = stored_item(&h.store, 1).await;

        let participants = BackendStatusList::not_started(vec![
            feedback_backend(1),
            feedback_backend(2),
            backend(3, &[Capability::PhotoAnalysis]),
        ]);
        let task = TaskDetails::builder(TaskType::Analysis, ContentKind::Photo)
            .user(1)
            .items(vec![ContentItem::new(ContentKind::Photo).with_guid(guid.clone())])
            .backends(participants)
            .build();
        let task_id = h.orchestrator.create_and_schedule(task).await.unwrap();

        let response = TaskResponse::new(1, task_id, TaskStatus::Completed).with_items(vec![result_item(&guid, "k1")]);
        let report = h.orchestrator.ingest_result(response).await.unwrap();
        let feedback_id = report.feedback_task.expect("feedback task");

        let feedback = h.store.task(feedback_id).await.unwrap().unwrap();
        assert_eq!(feedback.task_type(), TaskType::BackendFeedback);
        assert_eq!(feedback.backends().backend_ids().collect::<Vec<_>>(), vec![2]);
        assert_eq!(feedback.user_id(), Some(1));
        assert_eq!(feedback.related_task_id(), Some(task_id));
        assert_eq!(feedback.content().items.len(), 1);
        assert_eq!(h.scheduler.len().await, 2);
    }

    #[tokio::test]
    async fn empty_results_do_not_cascade() {
        let h = harness(vec![feedback_backend(1), feedback_backend(2)], &[]);
        let guid = stored_item(&h.store, 1).await;
        let task_id = h.orchestrator.create_and_schedule(analysis(&guid, Some(1))).await.unwrap();

        let report = h
            .orchestrator
            .ingest_result(TaskResponse::new(1, task_id, TaskStatus::Completed))
            .await
            .unwrap();
        assert_eq!(report.feedback_task, None);
        assert_eq!(
            h.orchestrator.schedule_backend_feedback(1, task_id, Vec::new()).await.unwrap(),
            None
        );
        assert_eq!(h.scheduler.len().await, 1);
    }
}
