//! Directory snapshot and live-update engine.
//!
//! A `DirectorySession` lists one working directory at a time through a
//! `DirectoryEnumerator`, streaming entries into a live, ordered collection. Loads are
//! cancellable, never leak enumeration handles, and never mix two directories. Once a
//! directory is loaded, change notifications are reconciled into it with the minimal
//! set of additions and removals.
//!
//! Consumers read the collection through a `LiveCollectionView` and follow it through
//! structured `CollectionEvent`s; load progress arrives as `SessionEvent`s.

pub mod aliases;
pub mod config;
pub mod entry;
pub mod enumerator;
pub mod error;
mod ignore_poison;
pub mod listing;
pub mod session;
pub mod watcher;

pub use aliases::{AliasResolver, KnownFolders, NoAliases, StaticAliases};
pub use config::ListingConfig;
pub use entry::{DirectoryEntry, EntryIdentity, NameDisplay, RawEntry};
pub use enumerator::{DirectoryEnumerator, ExcludeLinks, InMemoryEnumerator, IncludeLinks, LinkPolicy, LocalEnumerator};
pub use error::ListingError;
pub use listing::{
    CancellationToken, CollectionEvent, EnumerationOutcome, FolderPlacement, LiveCollectionView, ReconcileResult,
    SortDirection, SortKey, SortSpec, order_entries,
};
pub use session::{DirectorySession, NavigationOutcome, NotificationOutcome, SessionBuilder, SessionEvent, SessionPhase};
pub use watcher::{ChangeNotification, ChangeSource, ChangeSubscription, ManualChangeSource, NotifyChangeSource};
