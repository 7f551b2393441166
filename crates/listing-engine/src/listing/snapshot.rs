//! Snapshot builder: streams one directory into `DirectoryEntry` values.
//!
//! Pure blocking code with no runtime or caching dependencies. The session runs it on a
//! blocking worker thread and feeds the results into the live collection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::entry::{DirectoryEntry, NameDisplay, RawEntry};
use crate::enumerator::{DirectoryEnumerator, LinkPolicy};
use crate::error::ListingError;

/// Entries per batch. Sinks get a `batch_completed` call after each one.
pub const DEFAULT_BATCH_SIZE: usize = 250;

/// Cooperative cancellation flag shared between the session and one enumeration scope.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// What to show and how to name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumerationOptions {
    /// Items carrying the hidden attribute.
    pub show_hidden: bool,
    /// Hidden items that are also system items. Needs `show_hidden` as well.
    pub show_system_items: bool,
    /// Names starting with a dot, whatever their attributes.
    pub show_dot_files: bool,
    pub name_display: NameDisplay,
    pub batch_size: usize,
}

impl Default for EnumerationOptions {
    fn default() -> Self {
        Self {
            show_hidden: false,
            show_system_items: false,
            show_dot_files: true,
            name_display: NameDisplay::WithExtension,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// How an enumeration ended, when it didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum EnumerationOutcome {
    /// Every entry was delivered.
    Completed { count: usize, filtered: usize },
    /// Stopped early. `count` entries were delivered before cancellation was observed.
    Cancelled { count: usize },
}

/// Receives entries as they are found.
pub trait EntrySink {
    fn entry_found(&mut self, entry: DirectoryEntry);

    /// Called after every full batch and once more for the final partial batch.
    /// `loaded` is the running total. Not called once cancellation is observed.
    fn batch_completed(&mut self, loaded: usize) {
        let _ = loaded;
    }
}

impl<F: FnMut(DirectoryEntry)> EntrySink for F {
    fn entry_found(&mut self, entry: DirectoryEntry) {
        self(entry)
    }
}

/// Whether a raw entry makes it into the listing at all.
pub fn is_listed(raw: &RawEntry, options: &EnumerationOptions, link_policy: &dyn LinkPolicy) -> bool {
    if raw.is_pseudo_entry() {
        return false;
    }
    if raw.is_hidden() && !(options.show_hidden && (!raw.is_system() || options.show_system_items)) {
        return false;
    }
    if raw.is_dot_file() && !options.show_dot_files {
        return false;
    }
    link_policy.include(raw)
}

/// Enumerates `path`, streaming entries into `sink`.
///
/// - Cancellation is checked before every entry, so no `entry_found` fires after it's observed.
/// - The enumerator handle is dropped before this returns, on every path.
/// - Cancellation is an `Ok(Cancelled)`, not an error.
pub fn enumerate<S: EntrySink + ?Sized>(
    enumerator: &dyn DirectoryEnumerator,
    path: &Path,
    options: &EnumerationOptions,
    link_policy: &dyn LinkPolicy,
    cancellation: &CancellationToken,
    sink: &mut S,
) -> Result<EnumerationOutcome, ListingError> {
    if cancellation.is_cancelled() {
        return Ok(EnumerationOutcome::Cancelled { count: 0 });
    }

    let start = std::time::Instant::now();
    let handle = enumerator.list_entries(path)?;
    let batch_size = options.batch_size.max(1);
    let mut count = 0;
    let mut filtered = 0;
    let mut in_batch = 0;

    for item in handle {
        if cancellation.is_cancelled() {
            log::debug!("enumerate: cancelled after {} entries in {}", count, path.display());
            return Ok(EnumerationOutcome::Cancelled { count });
        }

        let raw = item?;
        if !is_listed(&raw, options, link_policy) {
            filtered += 1;
            continue;
        }

        sink.entry_found(DirectoryEntry::from_raw(raw, options.name_display)?);
        count += 1;
        in_batch += 1;

        if in_batch == batch_size {
            in_batch = 0;
            if cancellation.is_cancelled() {
                return Ok(EnumerationOutcome::Cancelled { count });
            }
            sink.batch_completed(count);
        }
    }

    if cancellation.is_cancelled() {
        return Ok(EnumerationOutcome::Cancelled { count });
    }
    if in_batch > 0 {
        sink.batch_completed(count);
    }

    log::debug!(
        "enumerate: path={}, entries={}, filtered={}, total={}ms",
        path.display(),
        count,
        filtered,
        start.elapsed().as_millis()
    );
    Ok(EnumerationOutcome::Completed { count, filtered })
}
