//! Match/new/lost diff between a provider listing and known entries.

use std::collections::{HashMap, HashSet};

use contentflow_store::ExternalEntry;

use crate::source::RemoteItem;

/// A remote item the store already knows.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedItem {
    /// The known entry, refreshed with the remote locator and update time.
    pub entry: ExternalEntry,
    /// The remote item, carrying the known GUID.
    pub remote: RemoteItem,
    /// Locator or update time differ from what was known.
    pub changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub matched: Vec<MatchedItem>,
    /// Remote items not known yet, in provider order.
    pub new: Vec<RemoteItem>,
    /// Known entries the provider no longer lists.
    pub lost: Vec<ExternalEntry>,
}

/// Diff `remote` against `known`, keyed by the provider's id.
///
/// A remote id listed twice is matched once; later duplicates are ignored.
pub fn reconcile(remote: Vec<RemoteItem>, known: Vec<ExternalEntry>) -> Reconciliation {
    let mut known: HashMap<String, ExternalEntry> =
        known.into_iter().map(|e| (e.remote_id.clone(), e)).collect();
    let mut seen = HashSet::new();
    let mut result = Reconciliation::default();

    for mut item in remote {
        if !seen.insert(item.remote_id.clone()) {
            continue;
        }
        match known.remove(&item.remote_id) {
            Some(mut entry) => {
                let changed = entry.locator != item.locator || entry.updated != item.updated;
                entry.locator = item.locator.clone();
                entry.updated = item.updated;
                item.item.guid = Some(entry.guid.clone());
                result.matched.push(MatchedItem {
                    entry,
                    remote: item,
                    changed,
                });
            }
            None => {
                item.item.guid = None;
                result.new.push(item);
            }
        }
    }

    result.lost = known.into_values().collect();
    result.lost.sort_by(|a, b| a.guid.cmp(&b.guid));
    result
}
