//! Persistence seams. Every write method is a single atomic unit.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use contentflow_core::{
    AccessContext, AnalysisBackend, BackendId, BackendStatus, BackendStatusList, Capability,
    ContentItem, ContentKind, Guid, ItemStatus, MediaObject, SearchFilters, ServiceType,
    TaskDetails, TaskId, TaskStatus, UserId,
};

use crate::error::StoreError;

/// Read-only, capability-indexed view of the configured back-ends.
#[async_trait]
pub trait BackendRegistry: Send + Sync {
    /// Enabled back-ends declaring every capability in `required`.
    async fn backends(&self, required: &[Capability]) -> Result<Vec<AnalysisBackend>, StoreError>;

    async fn backend(&self, backend_id: BackendId) -> Result<Option<AnalysisBackend>, StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a task and its status rows together, returning the new id.
    async fn insert_task(&self, details: &TaskDetails) -> Result<TaskId, StoreError>;

    /// The task with its current status rows.
    async fn task(&self, task_id: TaskId) -> Result<Option<TaskDetails>, StoreError>;

    async fn backend_status(
        &self,
        backend_id: BackendId,
        task_id: TaskId,
    ) -> Result<Option<BackendStatus>, StoreError>;

    /// All rows of a task, read as one consistent snapshot.
    async fn backend_statuses(&self, task_id: TaskId) -> Result<BackendStatusList, StoreError>;

    /// Overwrite an existing row. Fails if the task has no row for that back-end.
    async fn update_backend_status(
        &self,
        task_id: TaskId,
        status: &BackendStatus,
    ) -> Result<(), StoreError>;

    /// Record what a back-end reported for individual content items.
    async fn record_item_statuses(
        &self,
        task_id: TaskId,
        backend_id: BackendId,
        statuses: &[(Guid, TaskStatus)],
    ) -> Result<(), StoreError>;

    async fn item_statuses(&self, task_id: TaskId, guid: &str) -> Result<Vec<ItemStatus>, StoreError>;
}

/// How much a caller may do with a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    /// The caller owns the item.
    Owner,
    /// Trusted back-end access.
    Backend,
    /// Visible but not modifiable.
    ReadOnly,
    NoAccess,
}

impl AccessLevel {
    pub fn can_modify(&self) -> bool {
        matches!(self, Self::Owner | Self::Backend)
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Owners of the given items. Unknown items are absent from the map.
    async fn resolve_owners(&self, guids: &[Guid]) -> Result<HashMap<Guid, UserId>, StoreError>;

    /// Resolve object identities against the store.
    ///
    /// Objects without a `media_object_id` get the id of a stored object with
    /// the same back-end, owner and back-end object id, if there is one.
    /// Objects with a known id take owner, back-end and object id from the
    /// stored record; an unknown id is cleared so the object is inserted.
    async fn resolve_media_object_ids(&self, objects: &mut [MediaObject]) -> Result<(), StoreError>;

    /// Insert new objects, returning them with store ids assigned.
    async fn insert_media_objects(
        &self,
        objects: Vec<MediaObject>,
    ) -> Result<Vec<MediaObject>, StoreError>;

    /// Attach stored objects to an item.
    async fn associate(&self, guid: &str, media_object_ids: &[String]) -> Result<(), StoreError>;

    async fn update_media_objects(&self, objects: &[MediaObject]) -> Result<(), StoreError>;

    /// Insert new items, minting a GUID for each.
    async fn insert_items(&self, items: Vec<ContentItem>) -> Result<Vec<ContentItem>, StoreError>;

    /// Update stored items. With `only_if_newer`, an item is skipped unless its
    /// `updated` time is later than the stored one. Returns the number updated.
    async fn update_items(&self, items: &[ContentItem], only_if_newer: bool) -> Result<usize, StoreError>;

    /// Remove items and their media objects. Returns the number removed.
    async fn remove_items(&self, guids: &[Guid]) -> Result<usize, StoreError>;

    /// Items visible to `access`, passing `filters`, ordered by GUID.
    async fn get_items(
        &self,
        access: &AccessContext,
        guids: &[Guid],
        filters: &SearchFilters,
    ) -> Result<Vec<ContentItem>, StoreError>;

    /// Visible items carrying a media object matching one of `objects` by type and value.
    async fn search_by_objects(
        &self,
        access: &AccessContext,
        kind: ContentKind,
        objects: &[MediaObject],
        filters: &SearchFilters,
    ) -> Result<Vec<ContentItem>, StoreError>;

    /// Access level of the caller for each known item.
    async fn access_details(
        &self,
        access: &AccessContext,
        guids: &[Guid],
    ) -> Result<HashMap<Guid, AccessLevel>, StoreError>;
}

/// Link between a stored item and its copy on an external service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEntry {
    pub guid: Guid,
    pub user_id: UserId,
    pub service_type: ServiceType,
    /// The provider's own id for the item.
    pub remote_id: String,
    /// Provider location (album, folder or url) the item was last seen under.
    #[serde(default)]
    pub locator: Option<String>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

/// Known external-service entries, per user and service.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn entries(
        &self,
        user_id: UserId,
        service_type: ServiceType,
    ) -> Result<Vec<ExternalEntry>, StoreError>;

    /// Insert or replace entries, keyed by GUID.
    async fn upsert_entries(&self, entries: &[ExternalEntry]) -> Result<(), StoreError>;

    async fn remove_entries(&self, guids: &[Guid]) -> Result<(), StoreError>;
}
