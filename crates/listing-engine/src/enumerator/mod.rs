//! Directory enumerator trait for abstracting the backing store.
//!
//! The engine never touches the filesystem directly. It goes through a `DirectoryEnumerator`,
//! so the same snapshot/reconcile logic runs against the local disk, a device, or an
//! in-memory fake in tests.

use std::path::Path;

use crate::entry::RawEntry;
use crate::error::ListingError;

mod in_memory;
mod local_posix;

pub use in_memory::InMemoryEnumerator;
pub use local_posix::LocalEnumerator;

/// Open enumeration handle. Yields entries one by one; dropping it releases the native handle.
pub type RawEntryIter = Box<dyn Iterator<Item = Result<RawEntry, ListingError>> + Send>;

/// Lists the entries of one directory.
///
/// `list_entries` may block (slow disks, network shares). The session only calls it
/// from a blocking worker thread, never from an async task.
pub trait DirectoryEnumerator: Send + Sync {
    /// Opens `path` for incremental listing.
    ///
    /// Root-level problems are reported here as `PathNotFound`, `AccessDenied`, or
    /// `DeviceUnavailable`. Problems while iterating come out of the iterator.
    fn list_entries(&self, path: &Path) -> Result<RawEntryIter, ListingError>;
}

/// Decides whether a link (symlink, shortcut) shows up in the listing.
pub trait LinkPolicy: Send + Sync {
    fn include(&self, entry: &RawEntry) -> bool;
}

/// Shows links like any other item.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeLinks;

impl LinkPolicy for IncludeLinks {
    fn include(&self, _entry: &RawEntry) -> bool {
        true
    }
}

/// Hides symlinks and `.lnk`/`.url` shortcut files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcludeLinks;

impl LinkPolicy for ExcludeLinks {
    fn include(&self, entry: &RawEntry) -> bool {
        if entry.is_link() {
            return false;
        }
        let lower = entry.name.to_lowercase();
        !(lower.ends_with(".lnk") || lower.ends_with(".url"))
    }
}

#[cfg(test)]
mod local_posix_test;
