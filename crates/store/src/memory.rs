//! In-memory store behind a single `RwLock`.
//!
//! Every trait method takes the lock once, so each write is atomic and every
//! read sees one consistent snapshot. The whole state can be saved to and
//! loaded from a JSON file, which is how the CLI keeps state between runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use contentflow_core::{
    new_guid, AccessContext, BackendId, BackendStatus, BackendStatusList, ContentItem, ContentKind,
    Guid, ItemStatus, MediaObject, SearchFilters, ServiceType, TaskDetails, TaskId, TaskStatus,
    UserId,
};

use crate::error::StoreError;
use crate::traits::{AccessLevel, ContentStore, EntryStore, ExternalEntry, TaskStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskRecord {
    details: TaskDetails,
    rows: BackendStatusList,
    #[serde(default)]
    item_statuses: BTreeMap<Guid, Vec<ItemStatus>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryState {
    next_task_id: TaskId,
    next_object_id: u64,
    tasks: BTreeMap<TaskId, TaskRecord>,
    /// Items are kept without media objects; those live in `objects`.
    items: BTreeMap<Guid, ContentItem>,
    objects: BTreeMap<String, MediaObject>,
    associations: BTreeMap<Guid, Vec<String>>,
    entries: BTreeMap<Guid, ExternalEntry>,
}

impl MemoryState {
    fn hydrate(&self, item: &ContentItem) -> ContentItem {
        let mut item = item.clone();
        if let Some(guid) = &item.guid {
            item.media_objects = self
                .associations
                .get(guid)
                .into_iter()
                .flatten()
                .filter_map(|id| self.objects.get(id).cloned())
                .collect();
        }
        item
    }

    fn next_object_id(&mut self) -> String {
        self.next_object_id += 1;
        format!("mo-{}", self.next_object_id)
    }

    fn access_level(&self, access: &AccessContext, item: &ContentItem) -> AccessLevel {
        if access.backend {
            AccessLevel::Backend
        } else if access.user.is_some() && access.user == item.owner {
            AccessLevel::Owner
        } else if item.is_visible_to(access.user) {
            AccessLevel::ReadOnly
        } else {
            AccessLevel::NoAccess
        }
    }

    fn visible(&self, access: &AccessContext, item: &ContentItem, filters: &SearchFilters) -> bool {
        self.access_level(access, item) != AccessLevel::NoAccess
            && filters.accepts(item.owner, item.service_type)
    }
}

pub struct MemoryStore {
    state: RwLock<MemoryState>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of successful mutating calls since creation.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Load a snapshot written by [`save_snapshot`](Self::save_snapshot). A missing file yields an empty store.
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no snapshot, starting empty");
            return Ok(Self::new());
        }
        let json = std::fs::read_to_string(path)?;
        let state: MemoryState = serde_json::from_str(&json)?;
        info!(
            path = %path.display(),
            tasks = state.tasks.len(),
            items = state.items.len(),
            "loaded store snapshot"
        );
        Ok(Self {
            state: RwLock::new(state),
            writes: AtomicU64::new(0),
        })
    }

    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let state = self.state.read().await;
        let json = serde_json::to_string_pretty(&*state)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tasks ─────────────────────────────────────────────────────

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, details: &TaskDetails) -> Result<TaskId, StoreError> {
        let mut state = self.state.write().await;
        state.next_task_id += 1;
        let task_id = state.next_task_id;
        let record = TaskRecord {
            details: details
                .clone()
                .with_task_id(task_id)
                .with_backends(BackendStatusList::new()),
            rows: details.backends().clone(),
            item_statuses: BTreeMap::new(),
        };
        state.tasks.insert(task_id, record);
        self.record_write();
        debug!(task_id, backends = details.backends().len(), "task inserted");
        Ok(task_id)
    }

    async fn task(&self, task_id: TaskId) -> Result<Option<TaskDetails>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .get(&task_id)
            .map(|r| r.details.clone().with_backends(r.rows.clone())))
    }

    async fn backend_status(
        &self,
        backend_id: BackendId,
        task_id: TaskId,
    ) -> Result<Option<BackendStatus>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .get(&task_id)
            .and_then(|r| r.rows.get(backend_id).cloned()))
    }

    async fn backend_statuses(&self, task_id: TaskId) -> Result<BackendStatusList, StoreError> {
        let state = self.state.read().await;
        state
            .tasks
            .get(&task_id)
            .map(|r| r.rows.clone())
            .ok_or(StoreError::TaskNotFound(task_id))
    }

    async fn update_backend_status(
        &self,
        task_id: TaskId,
        status: &BackendStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let record = state
            .tasks
            .get_mut(&task_id)
            .ok_or(StoreError::TaskNotFound(task_id))?;
        if !record.rows.replace(status.clone()) {
            return Err(StoreError::StatusNotFound {
                backend_id: status.backend_id(),
                task_id,
            });
        }
        self.record_write();
        Ok(())
    }

    async fn record_item_statuses(
        &self,
        task_id: TaskId,
        backend_id: BackendId,
        statuses: &[(Guid, TaskStatus)],
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let record = state
            .tasks
            .get_mut(&task_id)
            .ok_or(StoreError::TaskNotFound(task_id))?;
        for (guid, status) in statuses {
            let rows = record.item_statuses.entry(guid.clone()).or_default();
            match rows.iter_mut().find(|s| s.backend_id == backend_id) {
                Some(row) => row.status = *status,
                None => rows.push(ItemStatus {
                    backend_id,
                    status: *status,
                    message: None,
                }),
            }
        }
        self.record_write();
        Ok(())
    }

    async fn item_statuses(&self, task_id: TaskId, guid: &str) -> Result<Vec<ItemStatus>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .get(&task_id)
            .and_then(|r| r.item_statuses.get(guid).cloned())
            .unwrap_or_default())
    }
}

// ── Content ───────────────────────────────────────────────────

#[async_trait]
impl ContentStore for MemoryStore {
    async fn resolve_owners(&self, guids: &[Guid]) -> Result<HashMap<Guid, UserId>, StoreError> {
        let state = self.state.read().await;
        Ok(guids
            .iter()
            .filter_map(|guid| {
                let owner = state.items.get(guid)?.owner?;
                Some((guid.clone(), owner))
            })
            .collect())
    }

    async fn resolve_media_object_ids(&self, objects: &mut [MediaObject]) -> Result<(), StoreError> {
        let state = self.state.read().await;
        for object in objects.iter_mut() {
            if let Some(id) = object.media_object_id.clone() {
                match state.objects.get(&id) {
                    Some(stored) => {
                        object.owner = stored.owner;
                        object.backend_id = stored.backend_id;
                        object.object_id = stored.object_id.clone();
                        continue;
                    }
                    None => {
                        debug!(media_object_id = %id, "unknown media object id, treating as new");
                        object.media_object_id = None;
                    }
                }
            }
            let known = state.objects.values().find(|stored| {
                stored.object_id == object.object_id
                    && stored.backend_id == object.backend_id
                    && stored.owner == object.owner
            });
            if let Some(known) = known {
                object.media_object_id = known.media_object_id.clone();
            }
        }
        Ok(())
    }

    async fn insert_media_objects(
        &self,
        objects: Vec<MediaObject>,
    ) -> Result<Vec<MediaObject>, StoreError> {
        let mut state = self.state.write().await;
        let mut inserted = Vec::with_capacity(objects.len());
        for mut object in objects {
            let id = state.next_object_id();
            object.media_object_id = Some(id.clone());
            state.objects.insert(id, object.clone());
            inserted.push(object);
        }
        self.record_write();
        Ok(inserted)
    }

    async fn associate(&self, guid: &str, media_object_ids: &[String]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.items.contains_key(guid) {
            return Err(StoreError::ItemNotFound(guid.to_string()));
        }
        if let Some(missing) = media_object_ids.iter().find(|id| !state.objects.contains_key(*id)) {
            return Err(StoreError::MediaObjectNotFound(missing.clone()));
        }
        let linked = state.associations.entry(guid.to_string()).or_default();
        for id in media_object_ids {
            if !linked.contains(id) {
                linked.push(id.clone());
            }
        }
        self.record_write();
        Ok(())
    }

    async fn update_media_objects(&self, objects: &[MediaObject]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        for object in objects {
            let known = object
                .media_object_id
                .as_ref()
                .is_some_and(|id| state.objects.contains_key(id));
            if !known {
                return Err(StoreError::MediaObjectNotFound(object.object_id.clone()));
            }
        }
        for object in objects {
            if let Some(id) = &object.media_object_id {
                state.objects.insert(id.clone(), object.clone());
            }
        }
        self.record_write();
        Ok(())
    }

    async fn insert_items(&self, items: Vec<ContentItem>) -> Result<Vec<ContentItem>, StoreError> {
        let mut state = self.state.write().await;
        let mut inserted = Vec::with_capacity(items.len());
        for mut item in items {
            let guid = new_guid();
            item.guid = Some(guid.clone());
            item.statuses.clear();

            let mut linked = Vec::new();
            for mut object in std::mem::take(&mut item.media_objects) {
                let id = state.next_object_id();
                object.media_object_id = Some(id.clone());
                object.owner = item.owner;
                state.objects.insert(id.clone(), object);
                linked.push(id);
            }
            if !linked.is_empty() {
                state.associations.insert(guid.clone(), linked);
            }
            state.items.insert(guid.clone(), item);
            if let Some(stored) = state.items.get(&guid) {
                inserted.push(state.hydrate(stored));
            }
        }
        self.record_write();
        Ok(inserted)
    }

    async fn update_items(&self, items: &[ContentItem], only_if_newer: bool) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let mut updated = 0;
        for item in items {
            let Some(guid) = &item.guid else { continue };
            let Some(stored) = state.items.get_mut(guid) else {
                debug!(guid = %guid, "update skipped, item not found");
                continue;
            };
            if only_if_newer {
                let newer = match (item.updated, stored.updated) {
                    (Some(incoming), Some(current)) => incoming > current,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if !newer {
                    continue;
                }
            }
            stored.name = item.name.clone();
            stored.description = item.description.clone();
            stored.url = item.url.clone();
            stored.visibility = item.visibility;
            stored.service_type = item.service_type;
            stored.updated = item.updated;
            updated += 1;
        }
        if updated > 0 {
            self.record_write();
        }
        Ok(updated)
    }

    async fn remove_items(&self, guids: &[Guid]) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let mut removed = 0;
        for guid in guids {
            if state.items.remove(guid).is_none() {
                continue;
            }
            removed += 1;
            for id in state.associations.remove(guid).unwrap_or_default() {
                state.objects.remove(&id);
            }
        }
        if removed > 0 {
            self.record_write();
        }
        Ok(removed)
    }

    async fn get_items(
        &self,
        access: &AccessContext,
        guids: &[Guid],
        filters: &SearchFilters,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let state = self.state.read().await;
        let unique: BTreeSet<&Guid> = guids.iter().collect();
        let found: Vec<ContentItem> = unique
            .into_iter()
            .filter_map(|guid| state.items.get(guid))
            .filter(|item| state.visible(access, item, filters))
            .map(|item| state.hydrate(item))
            .collect();
        Ok(match filters.limits {
            Some(limits) => limits.apply(found),
            None => found,
        })
    }

    async fn search_by_objects(
        &self,
        access: &AccessContext,
        kind: ContentKind,
        objects: &[MediaObject],
        filters: &SearchFilters,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let state = self.state.read().await;
        let matches = |candidate: &MediaObject| {
            objects.iter().any(|query| {
                query.object_type == candidate.object_type
                    && match (&query.value, &candidate.value) {
                        (Some(q), Some(c)) => q.eq_ignore_ascii_case(c),
                        _ => false,
                    }
            })
        };
        let found: Vec<ContentItem> = state
            .items
            .values()
            .filter(|item| item.kind == kind && state.visible(access, item, filters))
            .map(|item| state.hydrate(item))
            .filter(|item| item.media_objects.iter().any(&matches))
            .collect();
        Ok(match filters.limits {
            Some(limits) => limits.apply(found),
            None => found,
        })
    }

    async fn access_details(
        &self,
        access: &AccessContext,
        guids: &[Guid],
    ) -> Result<HashMap<Guid, AccessLevel>, StoreError> {
        let state = self.state.read().await;
        Ok(guids
            .iter()
            .filter_map(|guid| {
                let item = state.items.get(guid)?;
                Some((guid.clone(), state.access_level(access, item)))
            })
            .collect())
    }
}

// ── External entries ──────────────────────────────────────────

#[async_trait]
impl EntryStore for MemoryStore {
    async fn entries(
        &self,
        user_id: UserId,
        service_type: ServiceType,
    ) -> Result<Vec<ExternalEntry>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .values()
            .filter(|e| e.user_id == user_id && e.service_type == service_type)
            .cloned()
            .collect())
    }

    async fn upsert_entries(&self, entries: &[ExternalEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        for entry in entries {
            state.entries.insert(entry.guid.clone(), entry.clone());
        }
        self.record_write();
        Ok(())
    }

    async fn remove_entries(&self, guids: &[Guid]) -> Result<(), StoreError> {
        if guids.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        for guid in guids {
            state.entries.remove(guid);
        }
        self.record_write();
        Ok(())
    }
}
