//! Merging back-end results into the content store.
//!
//! A merge happens in two steps. [`ResultMerger::prepare`] only reads: it
//! resolves owners and existing media-object identities and classifies every
//! object as an insert or an update. [`ResultMerger::commit`] then writes.
//! Anything that makes the result invalid is detected before the first write.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use contentflow_core::{media, BackendId, ContentItem, CoreError, Guid, MediaObject, TaskStatus};
use contentflow_store::ContentStore;

use crate::error::IngestError;

/// Media objects split by whether the store already knows them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    /// New objects, each with the item it belongs to.
    pub insert: Vec<(Guid, MediaObject)>,
    /// Known objects, each with the item it belongs to.
    pub update: Vec<(Guid, MediaObject)>,
}

impl MergePlan {
    /// Objects without a store id are inserted, the rest updated.
    pub fn classify<I>(objects: I) -> Self
    where
        I: IntoIterator<Item = (Guid, MediaObject)>,
    {
        let mut plan = Self::default();
        for (guid, object) in objects {
            if object.is_new() {
                plan.insert.push((guid, object));
            } else {
                plan.update.push((guid, object));
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty()
    }

    /// Validate the insert set, then the update set, each as a whole.
    pub fn validate(&self) -> Result<(), CoreError> {
        media::validate_all(self.insert.iter().map(|(_, object)| object))?;
        media::validate_all(self.update.iter().map(|(_, object)| object))
    }
}

/// A result that passed the consistency checks and is ready to be written.
#[derive(Debug, Clone)]
pub struct PreparedMerge {
    /// Surviving items, without their media objects.
    pub items: Vec<ContentItem>,
    pub plan: MergePlan,
    /// Items dropped for missing owner, guid or media objects.
    pub dropped: usize,
}

/// What a commit wrote.
#[derive(Debug, Clone, Default)]
pub struct MergedContent {
    /// Surviving items with their merged media objects.
    pub items: Vec<ContentItem>,
    pub inserted: usize,
    pub updated: usize,
    pub dropped: usize,
}

pub struct ResultMerger {
    content: Arc<dyn ContentStore>,
}

impl ResultMerger {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }

    /// Check reported items and plan the writes. Reads only.
    pub async fn prepare(
        &self,
        backend_id: BackendId,
        items: Vec<ContentItem>,
    ) -> Result<PreparedMerge, IngestError> {
        let guids: Vec<Guid> = items.iter().filter_map(|i| i.guid.clone()).collect();
        let owners = self.content.resolve_owners(&guids).await?;

        let mut survivors = Vec::with_capacity(items.len());
        let mut pending: Vec<(Guid, MediaObject)> = Vec::new();
        let mut dropped = 0;

        for mut item in items {
            let Some(guid) = item.guid.clone() else {
                warn!(backend_id, "dropping result item without guid");
                dropped += 1;
                continue;
            };
            let Some(&owner) = owners.get(&guid) else {
                warn!(backend_id, guid = %guid, "dropping result item with no known owner");
                dropped += 1;
                continue;
            };

            check_item_statuses(backend_id, &guid, &item)?;

            if item.media_objects.is_empty() {
                debug!(backend_id, guid = %guid, "result item carries no media objects");
                dropped += 1;
                continue;
            }

            for mut object in std::mem::take(&mut item.media_objects) {
                match object.backend_id {
                    Some(id) if id != backend_id => {
                        warn!(
                            backend_id,
                            reported = id,
                            object_id = %object.object_id,
                            "media object names another back-end, correcting"
                        );
                        object.backend_id = Some(backend_id);
                    }
                    None => object.backend_id = Some(backend_id),
                    Some(_) => {}
                }
                match object.owner {
                    None => object.owner = Some(owner),
                    Some(other) if other != owner => {
                        return Err(IngestError::Validation(format!(
                            "media object {} belongs to user {other}, item {guid} to user {owner}",
                            object.object_id
                        )));
                    }
                    Some(_) => {}
                }
                pending.push((guid.clone(), object));
            }

            item.owner = Some(owner);
            survivors.push(item);
        }

        let (owners_of, mut objects): (Vec<Guid>, Vec<MediaObject>) = pending.into_iter().unzip();
        self.content.resolve_media_object_ids(&mut objects).await?;
        // Known ids now carry the stored owner, which must still be the item's.
        for (guid, object) in owners_of.iter().zip(&objects) {
            let owner = owners.get(guid).copied();
            if object.owner != owner {
                return Err(IngestError::Validation(format!(
                    "media object {} is stored for another user than item {guid}",
                    object.media_object_id.as_deref().unwrap_or(&object.object_id)
                )));
            }
        }
        let plan = MergePlan::classify(owners_of.into_iter().zip(objects));

        Ok(PreparedMerge {
            items: survivors,
            plan,
            dropped,
        })
    }

    /// Write a prepared merge. Store failures are logged and leave the rest of the merge running.
    pub async fn commit(&self, prepared: PreparedMerge) -> MergedContent {
        let PreparedMerge { items, plan, dropped } = prepared;
        let mut by_item: HashMap<Guid, Vec<MediaObject>> = HashMap::new();
        let mut merged = MergedContent {
            dropped,
            ..MergedContent::default()
        };

        if !plan.insert.is_empty() {
            let (guids, objects): (Vec<Guid>, Vec<MediaObject>) = plan.insert.into_iter().unzip();
            match self.content.insert_media_objects(objects).await {
                Ok(inserted) => {
                    merged.inserted = inserted.len();
                    let mut ids: HashMap<Guid, Vec<String>> = HashMap::new();
                    for (guid, object) in guids.into_iter().zip(inserted) {
                        if let Some(id) = &object.media_object_id {
                            ids.entry(guid.clone()).or_default().push(id.clone());
                        }
                        by_item.entry(guid).or_default().push(object);
                    }
                    for (guid, ids) in &ids {
                        if let Err(e) = self.content.associate(guid, ids).await {
                            warn!(guid = %guid, error = %e, "failed to associate media objects");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "failed to insert media objects, association skipped"),
            }
        }

        if !plan.update.is_empty() {
            let (guids, objects): (Vec<Guid>, Vec<MediaObject>) = plan.update.into_iter().unzip();
            match self.content.update_media_objects(&objects).await {
                Ok(()) => {
                    merged.updated = objects.len();
                    for (guid, object) in guids.into_iter().zip(objects) {
                        by_item.entry(guid).or_default().push(object);
                    }
                }
                Err(e) => warn!(error = %e, "failed to update media objects"),
            }
        }

        merged.items = items
            .into_iter()
            .map(|mut item| {
                if let Some(guid) = &item.guid {
                    item.media_objects = by_item.remove(guid).unwrap_or_default();
                }
                item
            })
            .collect();
        merged
    }
}

/// A result item's own status list may only speak for the reporting back-end.
fn check_item_statuses(backend_id: BackendId, guid: &str, item: &ContentItem) -> Result<(), IngestError> {
    if item.statuses.is_empty() {
        return Ok(());
    }
    if item.reported_status() == TaskStatus::Error {
        warn!(backend_id, guid = %guid, "back-end reported an error for item");
        return Ok(());
    }
    if item.statuses.len() > 1 {
        return Err(IngestError::Validation(format!(
            "item {guid} carries {} back-end statuses",
            item.statuses.len()
        )));
    }
    if item.statuses[0].backend_id != backend_id {
        return Err(IngestError::Validation(format!(
            "item {guid} carries a status for back-end {}",
            item.statuses[0].backend_id
        )));
    }
    Ok(())
}
