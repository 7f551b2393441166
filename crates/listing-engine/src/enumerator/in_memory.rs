//! In-memory enumerator for tests and embedders without a real file system.
//!
//! Keeps per-directory contents in a map and counts every handle it opens and closes,
//! so tests can assert that cancellation and failures never leak a handle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{DirectoryEnumerator, RawEntryIter};
use crate::entry::RawEntry;
use crate::error::ListingError;
use crate::ignore_poison::IgnorePoisonRw;

#[derive(Debug, Default)]
struct HandleCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

#[derive(Debug, Default)]
struct Contents {
    directories: HashMap<PathBuf, Vec<RawEntry>>,
    /// Fails `list_entries` itself.
    open_failures: HashMap<PathBuf, ListingError>,
    /// Fails the iterator after this many entries.
    iteration_failures: HashMap<PathBuf, (usize, ListingError)>,
    entry_delay: Option<Duration>,
}

/// A fake file system. Directories not explicitly added are `PathNotFound`.
#[derive(Debug, Default)]
pub struct InMemoryEnumerator {
    contents: RwLock<Contents>,
    counters: Arc<HandleCounters>,
}

impl InMemoryEnumerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the contents of `path`.
    pub fn with_directory(self, path: impl Into<PathBuf>, entries: Vec<RawEntry>) -> Self {
        self.set_directory(path, entries);
        self
    }

    /// Replaces the contents of `path`.
    pub fn set_directory(&self, path: impl Into<PathBuf>, entries: Vec<RawEntry>) {
        self.contents.write_ignore_poison().directories.insert(path.into(), entries);
    }

    /// Adds one entry to an existing (or new) directory.
    pub fn add_entry(&self, path: impl Into<PathBuf>, entry: RawEntry) {
        self.contents
            .write_ignore_poison()
            .directories
            .entry(path.into())
            .or_default()
            .push(entry);
    }

    /// Removes the entry called `name` from `path`. Returns true if it was there.
    pub fn remove_entry(&self, path: &Path, name: &str) -> bool {
        let mut contents = self.contents.write_ignore_poison();
        let Some(entries) = contents.directories.get_mut(path) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.name != name);
        entries.len() != before
    }

    /// Makes `list_entries(path)` fail with `error`.
    pub fn fail_open(&self, path: impl Into<PathBuf>, error: ListingError) {
        self.contents.write_ignore_poison().open_failures.insert(path.into(), error);
    }

    /// Makes the iterator for `path` yield `error` after `after` entries.
    pub fn fail_after(&self, path: impl Into<PathBuf>, after: usize, error: ListingError) {
        self.contents
            .write_ignore_poison()
            .iteration_failures
            .insert(path.into(), (after, error));
    }

    /// Sleeps this long before yielding each entry, to mimic a slow device.
    pub fn set_entry_delay(&self, delay: Option<Duration>) {
        self.contents.write_ignore_poison().entry_delay = delay;
    }

    /// Number of handles ever opened.
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Number of handles released.
    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Handles opened but not yet dropped.
    pub fn outstanding_handles(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }
}

impl DirectoryEnumerator for InMemoryEnumerator {
    fn list_entries(&self, path: &Path) -> Result<RawEntryIter, ListingError> {
        let contents = self.contents.read_ignore_poison();
        if let Some(error) = contents.open_failures.get(path) {
            return Err(error.clone());
        }
        let Some(entries) = contents.directories.get(path) else {
            return Err(ListingError::PathNotFound {
                path: path.to_string_lossy().to_string(),
            });
        };

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryHandle {
            entries: entries.clone().into_iter(),
            yielded: 0,
            failure: contents.iteration_failures.get(path).cloned(),
            delay: contents.entry_delay,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct InMemoryHandle {
    entries: std::vec::IntoIter<RawEntry>,
    yielded: usize,
    failure: Option<(usize, ListingError)>,
    delay: Option<Duration>,
    counters: Arc<HandleCounters>,
}

impl Iterator for InMemoryHandle {
    type Item = Result<RawEntry, ListingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((after, error)) = &self.failure
            && self.yielded >= *after
        {
            // Fail once, then end
            let error = error.clone();
            self.failure = None;
            self.entries = Vec::new().into_iter();
            return Some(Err(error));
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let entry = self.entries.next()?;
        self.yielded += 1;
        Some(Ok(entry))
    }
}

impl Drop for InMemoryHandle {
    fn drop(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}
