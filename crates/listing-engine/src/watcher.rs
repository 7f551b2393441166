//! Change notification sources for the directory a session is showing.
//!
//! A source hands the session the full re-observed contents of the directory, never a
//! delta. The session diffs that against its live collection (see `listing::reconciler`).

use notify_debouncer_full::{DebounceEventResult, new_debouncer, notify::RecursiveMode};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use crate::config::ListingConfig;
use crate::entry::{DirectoryEntry, EntryIdentity};
use crate::enumerator::{DirectoryEnumerator, LinkPolicy};
use crate::error::ListingError;
use crate::ignore_poison::IgnorePoison;
use crate::listing::{CancellationToken, EnumerationOptions, enumerate};

/// Default debounce duration in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// The full set of entries observed in a directory at one point in time.
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    /// Navigation generation the subscription was made for.
    pub generation: u64,
    pub entries: Arc<HashMap<EntryIdentity, DirectoryEntry>>,
}

impl ChangeNotification {
    pub fn from_entries(generation: u64, entries: Vec<DirectoryEntry>) -> Self {
        Self {
            generation,
            entries: Arc::new(entries.into_iter().map(|e| (e.identity.clone(), e)).collect()),
        }
    }

    pub fn observed(&self) -> HashSet<EntryIdentity> {
        self.entries.keys().cloned().collect()
    }

    /// Looks up one observed entry, as a reconciler fetch.
    pub fn fetch(&self, identity: &EntryIdentity) -> Result<DirectoryEntry, ListingError> {
        self.entries.get(identity).cloned().ok_or_else(|| ListingError::FetchFailed {
            identity: identity.clone(),
        })
    }
}

/// A live subscription. Dropping it stops watching.
///
/// The receiver only ever holds the latest notification, so a burst of changes
/// collapses into one pending reconciliation instead of a queue.
pub struct ChangeSubscription {
    pub receiver: watch::Receiver<Option<ChangeNotification>>,
    _guard: Box<dyn Send>,
}

impl ChangeSubscription {
    /// `guard` is kept alive as long as the subscription and dropped with it.
    pub fn new(receiver: watch::Receiver<Option<ChangeNotification>>, guard: impl Send + 'static) -> Self {
        Self {
            receiver,
            _guard: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSubscription").finish_non_exhaustive()
    }
}

/// Something that can tell a session when its directory changed.
pub trait ChangeSource: Send + Sync {
    fn subscribe(&self, path: &Path, generation: u64) -> Result<ChangeSubscription, ListingError>;
}

/// Lists `path` in full through the enumerator, the same way a navigation would.
pub fn observe_directory(
    enumerator: &dyn DirectoryEnumerator,
    path: &Path,
    options: &EnumerationOptions,
    link_policy: &dyn LinkPolicy,
) -> Result<Vec<DirectoryEntry>, ListingError> {
    let mut entries = Vec::new();
    enumerate(
        enumerator,
        path,
        options,
        link_policy,
        &CancellationToken::new(),
        &mut |entry: DirectoryEntry| entries.push(entry),
    )?;
    Ok(entries)
}

// ============================================================================
// File system watcher
// ============================================================================

/// Watches the real file system with a debounced, non-recursive `notify` watcher and
/// re-lists the directory after every burst of events.
pub struct NotifyChangeSource {
    enumerator: Arc<dyn DirectoryEnumerator>,
    link_policy: Arc<dyn LinkPolicy>,
    options: EnumerationOptions,
    debounce: Duration,
}

impl NotifyChangeSource {
    pub fn new(
        enumerator: Arc<dyn DirectoryEnumerator>,
        link_policy: Arc<dyn LinkPolicy>,
        options: EnumerationOptions,
        debounce: Duration,
    ) -> Self {
        Self {
            enumerator,
            link_policy,
            options,
            debounce,
        }
    }

    /// A watcher that lists the directory with the same visibility and batch settings a
    /// session built from `config` uses, debounced by `config.watch_debounce()`.
    pub fn from_config(
        enumerator: Arc<dyn DirectoryEnumerator>,
        link_policy: Arc<dyn LinkPolicy>,
        config: &ListingConfig,
    ) -> Self {
        Self::new(enumerator, link_policy, config.enumeration_options(), config.watch_debounce())
    }
}

impl ChangeSource for NotifyChangeSource {
    fn subscribe(&self, path: &Path, generation: u64) -> Result<ChangeSubscription, ListingError> {
        let (sender, receiver) = watch::channel(None);
        let enumerator = Arc::clone(&self.enumerator);
        let link_policy = Arc::clone(&self.link_policy);
        let options = self.options;
        let watched_path = path.to_path_buf();

        let mut debouncer = new_debouncer(self.debounce, None, move |result: DebounceEventResult| {
            if let Err(errors) = &result {
                // Often means the directory itself went away. Re-listing tells us.
                log::debug!("Watcher: {} error(s) for {}", errors.len(), watched_path.display());
            }
            match observe_directory(&*enumerator, &watched_path, &options, &*link_policy) {
                Ok(entries) => {
                    let _ = sender.send(Some(ChangeNotification::from_entries(generation, entries)));
                }
                Err(ListingError::PathNotFound { .. }) => {
                    log::info!("Watcher: directory deleted: {}", watched_path.display());
                    let _ = sender.send(Some(ChangeNotification::from_entries(generation, Vec::new())));
                }
                Err(ListingError::AccessDenied { .. }) => {
                    // Access may have been revoked; keep what we have
                }
                Err(e) => {
                    log::warn!("Watcher: failed to re-read {}: {}", watched_path.display(), e);
                }
            }
        })
        .map_err(|e| ListingError::Io {
            path: path.to_string_lossy().to_string(),
            message: format!("Failed to create watcher: {}", e),
        })?;

        debouncer
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| ListingError::Io {
                path: path.to_string_lossy().to_string(),
                message: format!("Failed to watch path: {}", e),
            })?;

        log::debug!("Watcher: watching {} (generation {})", path.display(), generation);
        Ok(ChangeSubscription::new(receiver, debouncer))
    }
}

// ============================================================================
// Manually driven source
// ============================================================================

/// A change source driven by hand: embedders that learn about changes some other way,
/// and tests.
#[derive(Debug, Default)]
pub struct ManualChangeSource {
    watches: Mutex<HashMap<PathBuf, (u64, watch::Sender<Option<ChangeNotification>>)>>,
}

impl ManualChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `entries` as the new contents of `path`, tagged with the generation the
    /// current subscriber registered. Returns false if nobody is watching `path`.
    pub fn publish(&self, path: &Path, entries: Vec<DirectoryEntry>) -> bool {
        let watches = self.watches.lock_ignore_poison();
        let Some((generation, sender)) = watches.get(path) else {
            return false;
        };
        sender.send(Some(ChangeNotification::from_entries(*generation, entries))).is_ok()
    }

    /// Like `publish`, with an explicit generation. Lets tests deliver a stale notification.
    pub fn publish_with_generation(&self, path: &Path, generation: u64, entries: Vec<DirectoryEntry>) -> bool {
        let watches = self.watches.lock_ignore_poison();
        let Some((_, sender)) = watches.get(path) else {
            return false;
        };
        sender.send(Some(ChangeNotification::from_entries(generation, entries))).is_ok()
    }

    /// Whether a live subscription exists for `path`.
    pub fn is_watching(&self, path: &Path) -> bool {
        self.watches
            .lock_ignore_poison()
            .get(path)
            .is_some_and(|(_, sender)| !sender.is_closed())
    }

    /// The generation the current subscriber for `path` registered with.
    pub fn generation_of(&self, path: &Path) -> Option<u64> {
        self.watches.lock_ignore_poison().get(path).map(|(generation, _)| *generation)
    }
}

impl ChangeSource for ManualChangeSource {
    fn subscribe(&self, path: &Path, generation: u64) -> Result<ChangeSubscription, ListingError> {
        let (sender, receiver) = watch::channel(None);
        self.watches
            .lock_ignore_poison()
            .insert(path.to_path_buf(), (generation, sender));
        Ok(ChangeSubscription::new(receiver, ()))
    }
}
