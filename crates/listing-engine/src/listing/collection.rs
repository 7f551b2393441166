//! The live, ordered entry collection a session exposes to its consumers.
//!
//! `LiveEntries` is the plain data structure: a sorted `Vec` plus an identity index.
//! `LiveCollection` wraps it in a lock and a broadcast channel so every mutation is
//! observable, and hands out read-only `LiveCollectionView`s.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use super::reconciler::{self, ReconcilePlan, ReconcileResult};
use super::sorting::{SortSpec, compare_entries, sort_entries};
use crate::entry::{DirectoryEntry, EntryIdentity};
use crate::error::ListingError;
use crate::ignore_poison::IgnorePoisonRw;

/// One observable change to the collection.
///
/// Indices are exact: consumers that mirror the collection apply `removed` in the given
/// (descending) order, then insert `added` in the given (ascending) order.
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    /// Entries appended during loading, starting at `start`.
    Appended {
        start: usize,
        entries: Vec<Arc<DirectoryEntry>>,
    },
    /// One reconciliation batch.
    Changed {
        /// Pre-batch positions, descending.
        removed: Vec<usize>,
        /// Post-batch positions, ascending.
        added: Vec<(usize, Arc<DirectoryEntry>)>,
    },
    /// Contents replaced wholesale (cleared, re-sorted, or loaded).
    Reset { entries: Vec<Arc<DirectoryEntry>> },
}

/// Positions touched by `LiveEntries::apply_changes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    /// Pre-batch positions, descending.
    pub removed: Vec<usize>,
    /// Post-batch positions, ascending.
    pub added: Vec<usize>,
}

impl AppliedChanges {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Ordered entries with O(1) lookup by identity.
#[derive(Debug, Default)]
pub struct LiveEntries {
    items: Vec<Arc<DirectoryEntry>>,
    index: HashMap<EntryIdentity, usize>,
}

impl LiveEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Arc<DirectoryEntry>] {
        &self.items
    }

    pub fn get(&self, position: usize) -> Option<&Arc<DirectoryEntry>> {
        self.items.get(position)
    }

    pub fn position_of(&self, identity: &EntryIdentity) -> Option<usize> {
        self.index.get(identity).copied()
    }

    pub fn contains(&self, identity: &EntryIdentity) -> bool {
        self.index.contains_key(identity)
    }

    pub fn identities(&self) -> HashSet<EntryIdentity> {
        self.index.keys().cloned().collect()
    }

    /// Appends entries unsorted, as they stream in. Identities already present are skipped.
    /// Returns what was actually appended.
    pub fn append_batch(&mut self, batch: Vec<DirectoryEntry>) -> Vec<Arc<DirectoryEntry>> {
        let mut appended = Vec::with_capacity(batch.len());
        for entry in batch {
            if self.index.contains_key(&entry.identity) {
                log::warn!("LiveEntries: duplicate identity {} skipped ({})", entry.identity, entry.full_path);
                continue;
            }
            let entry = Arc::new(entry);
            self.index.insert(entry.identity.clone(), self.items.len());
            self.items.push(Arc::clone(&entry));
            appended.push(entry);
        }
        appended
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    /// Re-sorts every entry. The `Arc`s are reordered, not rebuilt.
    pub fn sort(&mut self, spec: &SortSpec) {
        sort_entries(&mut self.items, spec);
        self.reindex_from(0);
    }

    /// Removes `removals` and merges `additions` into their sorted positions, in one pass.
    ///
    /// Assumes the collection is sorted by `spec`. Unknown removals and additions whose
    /// identity is already present are ignored.
    pub fn apply_changes(
        &mut self,
        removals: &[EntryIdentity],
        additions: Vec<Arc<DirectoryEntry>>,
        spec: &SortSpec,
    ) -> AppliedChanges {
        let mut removed: Vec<usize> = removals.iter().filter_map(|id| self.position_of(id)).collect();
        removed.sort_unstable();
        removed.dedup();

        if !removed.is_empty() {
            let mut doomed = removed.iter().peekable();
            let mut position = 0;
            self.items.retain(|_| {
                let keep = doomed.peek() != Some(&&position);
                if !keep {
                    doomed.next();
                }
                position += 1;
                keep
            });
            for identity in removals {
                self.index.remove(identity);
            }
        }

        let mut incoming: Vec<Arc<DirectoryEntry>> = Vec::with_capacity(additions.len());
        let mut incoming_ids = HashSet::with_capacity(additions.len());
        for entry in additions {
            if self.index.contains_key(&entry.identity) || !incoming_ids.insert(entry.identity.clone()) {
                continue;
            }
            incoming.push(entry);
        }
        sort_entries(&mut incoming, spec);

        let mut added = Vec::with_capacity(incoming.len());
        if !incoming.is_empty() {
            let existing = std::mem::take(&mut self.items);
            let mut merged = Vec::with_capacity(existing.len() + incoming.len());
            let mut existing = existing.into_iter().peekable();
            for entry in incoming {
                // Existing entries go before equal newcomers
                while let Some(current) = existing.next_if(|current| {
                    compare_entries(current, &entry, spec) != std::cmp::Ordering::Greater
                }) {
                    merged.push(current);
                }
                added.push(merged.len());
                merged.push(entry);
            }
            merged.extend(existing);
            self.items = merged;
        }

        let first_changed = match (removed.first(), added.first()) {
            (Some(&r), Some(&a)) => Some(r.min(a)),
            (Some(&r), None) => Some(r),
            (None, Some(&a)) => Some(a),
            (None, None) => None,
        };
        if let Some(first) = first_changed {
            self.reindex_from(first);
        }

        removed.reverse();
        AppliedChanges { removed, added }
    }

    fn reindex_from(&mut self, start: usize) {
        if start == 0 {
            self.index.clear();
        }
        for (position, entry) in self.items.iter().enumerate().skip(start) {
            self.index.insert(entry.identity.clone(), position);
        }
    }
}

// ============================================================================
// Shared, observable collection
// ============================================================================

/// Owner side of the live collection. Only the session mutates it.
#[derive(Debug)]
pub(crate) struct LiveCollection {
    entries: Arc<RwLock<LiveEntries>>,
    events: broadcast::Sender<CollectionEvent>,
}

impl LiveCollection {
    pub(crate) fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            entries: Arc::new(RwLock::new(LiveEntries::new())),
            events,
        }
    }

    pub(crate) fn view(&self) -> LiveCollectionView {
        LiveCollectionView {
            entries: Arc::clone(&self.entries),
            events: self.events.clone(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read_ignore_poison().len()
    }

    pub(crate) fn plan(&self, observed: &HashSet<EntryIdentity>) -> ReconcilePlan {
        ReconcilePlan::compute(&self.entries.read_ignore_poison(), observed)
    }

    pub(crate) fn append_batch(&self, batch: Vec<DirectoryEntry>) -> usize {
        let mut entries = self.entries.write_ignore_poison();
        let start = entries.len();
        let appended = entries.append_batch(batch);
        let count = appended.len();
        if count > 0 {
            // Sent under the lock so events arrive in mutation order
            let _ = self.events.send(CollectionEvent::Appended {
                start,
                entries: appended,
            });
        }
        count
    }

    pub(crate) fn clear(&self) {
        let mut entries = self.entries.write_ignore_poison();
        if entries.is_empty() {
            return;
        }
        entries.clear();
        let _ = self.events.send(CollectionEvent::Reset { entries: Vec::new() });
    }

    pub(crate) fn sort(&self, spec: &SortSpec) {
        let mut entries = self.entries.write_ignore_poison();
        entries.sort(spec);
        let _ = self.events.send(CollectionEvent::Reset {
            entries: entries.items().to_vec(),
        });
    }

    pub(crate) fn apply_changes(
        &self,
        removals: &[EntryIdentity],
        additions: Vec<Arc<DirectoryEntry>>,
        spec: &SortSpec,
    ) -> AppliedChanges {
        let mut entries = self.entries.write_ignore_poison();
        let changes = entries.apply_changes(removals, additions, spec);
        self.publish_changes(&entries, &changes);
        changes
    }

    /// Reconciles against `observed` with a synchronous fetch, under one write lock.
    pub(crate) fn reconcile_with<F>(
        &self,
        observed: &HashSet<EntryIdentity>,
        fetch: F,
        spec: &SortSpec,
    ) -> ReconcileResult
    where
        F: FnMut(&EntryIdentity) -> Result<DirectoryEntry, ListingError>,
    {
        let mut entries = self.entries.write_ignore_poison();
        let (result, changes) = reconciler::reconcile(&mut entries, observed, fetch, spec);
        self.publish_changes(&entries, &changes);
        result
    }

    fn publish_changes(&self, entries: &LiveEntries, changes: &AppliedChanges) {
        if changes.is_empty() {
            return;
        }
        let added = changes
            .added
            .iter()
            .filter_map(|&position| entries.get(position).map(|entry| (position, Arc::clone(entry))))
            .collect();
        let _ = self.events.send(CollectionEvent::Changed {
            removed: changes.removed.clone(),
            added,
        });
    }
}

/// Read-only handle to a session's live collection. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LiveCollectionView {
    entries: Arc<RwLock<LiveEntries>>,
    events: broadcast::Sender<CollectionEvent>,
}

impl LiveCollectionView {
    pub fn len(&self) -> usize {
        self.entries.read_ignore_poison().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read_ignore_poison().is_empty()
    }

    pub fn get(&self, position: usize) -> Option<Arc<DirectoryEntry>> {
        self.entries.read_ignore_poison().get(position).cloned()
    }

    /// A copy of the current contents, in order.
    pub fn snapshot(&self) -> Vec<Arc<DirectoryEntry>> {
        self.entries.read_ignore_poison().items().to_vec()
    }

    /// Names in display order. Handy for logging and tests.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read_ignore_poison()
            .items()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn position_of(&self, identity: &EntryIdentity) -> Option<usize> {
        self.entries.read_ignore_poison().position_of(identity)
    }

    pub fn get_by_identity(&self, identity: &EntryIdentity) -> Option<Arc<DirectoryEntry>> {
        let entries = self.entries.read_ignore_poison();
        entries.position_of(identity).and_then(|position| entries.get(position).cloned())
    }

    /// Subscribes to future changes.
    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.events.subscribe()
    }

    /// Current contents plus a receiver that sees every change after them, with no gap.
    pub fn snapshot_and_subscribe(&self) -> (Vec<Arc<DirectoryEntry>>, broadcast::Receiver<CollectionEvent>) {
        let entries = self.entries.read_ignore_poison();
        (entries.items().to_vec(), self.events.subscribe())
    }
}
