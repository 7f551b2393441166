//! Reconciles a live collection against the set of identities actually on disk.
//!
//! Only the difference is touched: surviving entries keep their `Arc`, so consumers
//! holding them (or their positions) see no churn.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use super::collection::{AppliedChanges, LiveEntries};
use super::sorting::SortSpec;
use crate::entry::{DirectoryEntry, EntryIdentity};
use crate::error::ListingError;

/// What has to change to bring the collection in line with an observed set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Observed but not present. Sorted, so fetches run in a stable order.
    pub to_add: Vec<EntryIdentity>,
    /// Present but not observed. Sorted.
    pub to_remove: Vec<EntryIdentity>,
}

impl ReconcilePlan {
    pub fn compute(current: &LiveEntries, observed: &HashSet<EntryIdentity>) -> Self {
        let mut to_add: Vec<EntryIdentity> = observed.iter().filter(|id| !current.contains(id)).cloned().collect();
        let mut to_remove: Vec<EntryIdentity> = current
            .items()
            .iter()
            .map(|entry| &entry.identity)
            .filter(|id| !observed.contains(*id))
            .cloned()
            .collect();
        to_add.sort();
        to_remove.sort();
        Self { to_add, to_remove }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Counts for one applied reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub added: usize,
    pub removed: usize,
    /// Identities whose fetch failed. They're left out and picked up by a later pass.
    pub failed: Vec<EntryIdentity>,
}

/// Fetches every identity in `to_add`, keeping the ones that resolve.
pub fn fetch_additions<F>(to_add: &[EntryIdentity], mut fetch: F) -> (Vec<Arc<DirectoryEntry>>, Vec<EntryIdentity>)
where
    F: FnMut(&EntryIdentity) -> Result<DirectoryEntry, ListingError>,
{
    let mut fetched = Vec::with_capacity(to_add.len());
    let mut failed = Vec::new();
    for identity in to_add {
        match fetch(identity) {
            Ok(entry) => fetched.push(Arc::new(entry)),
            Err(e) => {
                log::warn!("Reconciler: couldn't fetch {}, skipping: {}", identity, e);
                failed.push(identity.clone());
            }
        }
    }
    (fetched, failed)
}

/// Brings `current` in line with `observed` in a single batch.
///
/// Entries present in both are never touched. A failed fetch skips that one addition;
/// removals are always applied.
pub fn reconcile<F>(
    current: &mut LiveEntries,
    observed: &HashSet<EntryIdentity>,
    fetch: F,
    spec: &SortSpec,
) -> (ReconcileResult, AppliedChanges)
where
    F: FnMut(&EntryIdentity) -> Result<DirectoryEntry, ListingError>,
{
    let plan = ReconcilePlan::compute(current, observed);
    if plan.is_empty() {
        return (ReconcileResult::default(), AppliedChanges::default());
    }

    let (fetched, failed) = fetch_additions(&plan.to_add, fetch);
    let changes = current.apply_changes(&plan.to_remove, fetched, spec);
    let result = ReconcileResult {
        added: changes.added.len(),
        removed: changes.removed.len(),
        failed,
    };
    log::debug!(
        "Reconciler: added={}, removed={}, failed={}",
        result.added,
        result.removed,
        result.failed.len()
    );
    (result, changes)
}
