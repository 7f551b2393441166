//! Directory listing: ordering, snapshot building, the live collection, and reconciliation.

pub mod collection;
pub mod reconciler;
pub mod snapshot;
pub mod sorting;

#[cfg(test)]
mod snapshot_test;
#[cfg(test)]
mod sorting_test;

pub use collection::{AppliedChanges, CollectionEvent, LiveCollectionView, LiveEntries};
pub(crate) use collection::LiveCollection;
pub use reconciler::{ReconcilePlan, ReconcileResult, fetch_additions, reconcile};
pub use snapshot::{
    CancellationToken, DEFAULT_BATCH_SIZE, EntrySink, EnumerationOptions, EnumerationOutcome, enumerate, is_listed,
};
pub use sorting::{
    FolderPlacement, SortDirection, SortKey, SortSpec, compare_entries, compare_names_natural, insertion_index,
    order_entries, sort_entries,
};
