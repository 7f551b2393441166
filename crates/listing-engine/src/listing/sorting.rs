//! Sorting configuration and logic for directory listings.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::entry::DirectoryEntry;

// ============================================================================
// Sorting configuration
// ============================================================================

/// Key to sort entries by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Name,
    DateModified,
    FileType,
    Size,
}

/// Sort direction (ascending or descending).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Where folders go relative to files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FolderPlacement {
    /// Folders first when ascending. Descending flips the grouping too (files first),
    /// except for `FileType`, where folders stay first because the key already encodes kind.
    #[default]
    Structural,
    /// Folders first for every key and direction.
    AlwaysFirst,
    /// No grouping: folders sort alongside files by the key alone.
    Mixed,
}

/// Full sort preference of a listing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
    #[serde(default)]
    pub folders: FolderPlacement,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self {
            key,
            direction,
            folders: FolderPlacement::default(),
        }
    }

    pub fn with_folders(mut self, folders: FolderPlacement) -> Self {
        self.folders = folders;
        self
    }
}

// ============================================================================
// Sorting logic
// ============================================================================

/// Compares two strings using natural (alphanumeric) sort, case-insensitive.
pub fn compare_names_natural(a: &str, b: &str) -> Ordering {
    alphanumeric_sort::compare_str(a.to_lowercase(), b.to_lowercase())
}

/// Folder/file grouping. `Less` means `a` belongs to the earlier group.
fn compare_groups(a: &DirectoryEntry, b: &DirectoryEntry, spec: &SortSpec) -> Ordering {
    let folders_first = b.is_directory.cmp(&a.is_directory);
    match (spec.direction, spec.key, spec.folders) {
        (_, _, FolderPlacement::Mixed) => Ordering::Equal,
        (SortDirection::Ascending, _, _) => folders_first,
        (SortDirection::Descending, SortKey::FileType, _) => folders_first,
        (SortDirection::Descending, _, FolderPlacement::AlwaysFirst) => folders_first,
        (SortDirection::Descending, _, FolderPlacement::Structural) => folders_first.reverse(),
    }
}

/// Total order of two entries under `spec`.
///
/// 1. Folder/file grouping (see `FolderPlacement`).
/// 2. Primary key, honoring the direction.
/// 3. Unless the key is `Name`, ties broken by name in the same direction.
pub fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry, spec: &SortSpec) -> Ordering {
    let group = compare_groups(a, b, spec);
    if group != Ordering::Equal {
        return group;
    }

    let primary = match spec.key {
        SortKey::Name => compare_names_natural(&a.name, &b.name),
        SortKey::DateModified => a.modified_utc.cmp(&b.modified_utc),
        SortKey::FileType => compare_names_natural(&a.type_label, &b.type_label),
        SortKey::Size => a.size_bytes.cmp(&b.size_bytes),
    };
    let primary = spec.direction.apply(primary);

    if spec.key == SortKey::Name || primary != Ordering::Equal {
        return primary;
    }
    spec.direction.apply(compare_names_natural(&a.name, &b.name))
}

/// Sorts entries in place. Stable, so equal names keep their relative order.
pub fn sort_entries<E: AsRef<DirectoryEntry>>(entries: &mut [E], spec: &SortSpec) {
    entries.sort_by(|a, b| compare_entries(a.as_ref(), b.as_ref(), spec));
}

/// Returns the entries in the order the listing shows them.
pub fn order_entries<E: AsRef<DirectoryEntry>>(mut entries: Vec<E>, spec: &SortSpec) -> Vec<E> {
    sort_entries(&mut entries, spec);
    entries
}

/// Index at which `entry` goes in an already sorted slice. Inserts after equal entries.
pub fn insertion_index<E: AsRef<DirectoryEntry>>(sorted: &[E], entry: &DirectoryEntry, spec: &SortSpec) -> usize {
    sorted.partition_point(|existing| compare_entries(existing.as_ref(), entry, spec) != Ordering::Greater)
}
