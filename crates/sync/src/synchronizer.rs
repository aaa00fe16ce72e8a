//! Mirroring one user's external-service content into the store.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use contentflow_core::{ContentItem, Guid, MaxTaskSize, TaskDetails, TaskId, TaskType, UserId};
use contentflow_events::{topics, EventPublisher, Message, SyncComplete};
use contentflow_store::{ContentStore, EntryStore, ExternalEntry};
use contentflow_tasks::{partition, TaskSubmitter};

use crate::error::SyncError;
use crate::lock::UserLock;
use crate::reconcile::reconcile;
use crate::source::{ContentSource, RemoteItem};

/// What one synchronization run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub user_id: UserId,
    pub matched: usize,
    /// Matched items whose provider location or update time changed.
    pub changed: usize,
    pub inserted: usize,
    pub removed: usize,
    /// Created tasks in creation order: deletions, updates, then analyses.
    pub task_ids: Vec<TaskId>,
    pub deletion_batches: usize,
    pub update_batches: usize,
    pub analysis_batches: usize,
    /// Batches whose task could not be created.
    pub failed_batches: usize,
}

pub struct ContentSynchronizer {
    lock: UserLock,
    source: Arc<dyn ContentSource>,
    entries: Arc<dyn EntryStore>,
    content: Arc<dyn ContentStore>,
    submitter: Arc<dyn TaskSubmitter>,
    max_task_size: MaxTaskSize,
    events: Option<Arc<dyn EventPublisher>>,
}

impl ContentSynchronizer {
    pub fn new(
        source: Arc<dyn ContentSource>,
        entries: Arc<dyn EntryStore>,
        content: Arc<dyn ContentStore>,
        submitter: Arc<dyn TaskSubmitter>,
        max_task_size: MaxTaskSize,
    ) -> Self {
        Self {
            lock: UserLock::new(),
            source,
            entries,
            content,
            submitter,
            max_task_size,
            events: None,
        }
    }

    /// Share a lock with other synchronizers of the same users.
    pub fn with_lock(mut self, lock: UserLock) -> Self {
        self.lock = lock;
        self
    }

    /// Publish a [`SyncComplete`] event after every run.
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Bring the store in line with what the provider lists for `user`.
    ///
    /// Runs for the same user never overlap. Store changes are applied
    /// first; task creation then happens per batch, and a failing batch is
    /// counted without affecting the others.
    pub async fn synchronize(&self, user: UserId) -> Result<SyncReport, SyncError> {
        let _guard = self.lock.acquire(user).await;
        let service = self.source.service_type();

        let remote = self.source.fetch(user).await?;
        let known = self.entries.entries(user, service).await?;
        debug!(user_id = user, remote = remote.len(), known = known.len(), "reconciling");
        let diff = reconcile(remote, known);

        let mut report = SyncReport {
            user_id: user,
            matched: diff.matched.len(),
            ..SyncReport::default()
        };

        // Matched: refresh items (only if newer) and changed entries.
        let mut updated_items = Vec::with_capacity(diff.matched.len());
        let mut changed_entries = Vec::new();
        for matched in diff.matched {
            if matched.changed {
                changed_entries.push(matched.entry);
            }
            updated_items.push(self.owned_item(user, matched.remote));
        }
        report.changed = changed_entries.len();
        if !updated_items.is_empty() {
            let updated = self.content.update_items(&updated_items, true).await?;
            debug!(user_id = user, updated, "matched items refreshed");
        }
        self.entries.upsert_entries(&changed_entries).await?;

        // New: insert items, then record where they came from.
        let mut inserted_items = Vec::new();
        if !diff.new.is_empty() {
            let origins: Vec<(String, Option<String>)> = diff
                .new
                .iter()
                .map(|r| (r.remote_id.clone(), r.locator.clone()))
                .collect();
            let items: Vec<ContentItem> = diff.new.into_iter().map(|r| self.owned_item(user, r)).collect();
            inserted_items = self.content.insert_items(items).await?;
            let entries: Vec<ExternalEntry> = inserted_items
                .iter()
                .zip(origins)
                .filter_map(|(item, (remote_id, locator))| {
                    Some(ExternalEntry {
                        guid: item.guid.clone()?,
                        user_id: user,
                        service_type: service,
                        remote_id,
                        locator,
                        updated: item.updated,
                    })
                })
                .collect();
            self.entries.upsert_entries(&entries).await?;
            report.inserted = inserted_items.len();
        }

        // Lost: remove items and their entries.
        let lost: Vec<Guid> = diff.lost.into_iter().map(|e| e.guid).collect();
        if !lost.is_empty() {
            report.removed = self.content.remove_items(&lost).await?;
            self.entries.remove_entries(&lost).await?;
        }

        let kind = self.source.content_kind();
        if !lost.is_empty() {
            for batch in partition(&lost, self.max_task_size) {
                let details = TaskDetails::builder(TaskType::Feedback, kind)
                    .user(user)
                    .deleted(batch.to_vec())
                    .build();
                report.deletion_batches += 1;
                self.submit_batch(details, "deletion", &mut report).await;
            }
        }
        if !updated_items.is_empty() {
            for batch in partition(&updated_items, self.max_task_size) {
                let details = TaskDetails::builder(TaskType::Feedback, kind)
                    .user(user)
                    .items(batch.to_vec())
                    .build();
                report.update_batches += 1;
                self.submit_batch(details, "update", &mut report).await;
            }
        }
        if !inserted_items.is_empty() {
            let parameters = self.source.analysis_parameters();
            for batch in partition(&inserted_items, self.max_task_size) {
                let details = TaskDetails::builder(TaskType::Analysis, kind)
                    .user(user)
                    .parameters(parameters.clone())
                    .items(batch.to_vec())
                    .build();
                report.analysis_batches += 1;
                self.submit_batch(details, "analysis", &mut report).await;
            }
        }

        info!(
            user_id = user,
            matched = report.matched,
            inserted = report.inserted,
            removed = report.removed,
            tasks = report.task_ids.len(),
            failed_batches = report.failed_batches,
            "synchronization finished"
        );
        self.publish_complete(&report).await;
        Ok(report)
    }

    fn owned_item(&self, user: UserId, remote: RemoteItem) -> ContentItem {
        let mut item = remote.item;
        item.kind = self.source.content_kind();
        item.owner = Some(user);
        item.service_type = Some(self.source.service_type());
        if item.updated.is_none() {
            item.updated = remote.updated;
        }
        item
    }

    async fn submit_batch(&self, details: TaskDetails, purpose: &str, report: &mut SyncReport) {
        match self.submitter.submit(details).await {
            Ok(task_id) => report.task_ids.push(task_id),
            Err(e) => {
                warn!(user_id = report.user_id, purpose, error = %e, "failed to create task for batch");
                report.failed_batches += 1;
            }
        }
    }

    async fn publish_complete(&self, report: &SyncReport) {
        let Some(events) = &self.events else {
            return;
        };
        let event = SyncComplete {
            user_id: report.user_id,
            matched: report.matched,
            inserted: report.inserted,
            removed: report.removed,
            task_ids: report.task_ids.clone(),
            finished_at: Utc::now(),
        };
        match Message::new(topics::SYNC_COMPLETE, &event) {
            Ok(message) => {
                if let Err(e) = events.publish(message).await {
                    warn!(user_id = report.user_id, error = %e, "failed to publish sync event");
                }
            }
            Err(e) => warn!(user_id = report.user_id, error = %e, "failed to encode sync event"),
        }
    }
}
