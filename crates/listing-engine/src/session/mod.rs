//! Directory session: owns one working directory's live collection and its load lifecycle.
//!
//! Concurrency model:
//! - At most one enumeration scope runs at a time. A new navigation cancels the previous
//!   scope and waits for it to release its handle and settle before clearing the collection.
//! - Enumeration runs on a blocking worker via `spawn_blocking`; entries are appended in
//!   batches under the state lock, which is never held across an `.await`.
//! - Change notifications are serialized. While one reconciles, only the newest waiting
//!   notification gets a turn; older ones return `Superseded`.

mod events;
mod scope;


pub use events::{NavigationOutcome, NotificationOutcome, SessionEvent, SessionPhase};

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::aliases::AliasResolver;
use crate::config::ListingConfig;
use crate::entry::{DirectoryEntry, EntryIdentity};
use crate::enumerator::{DirectoryEnumerator, IncludeLinks, LinkPolicy};
use crate::error::ListingError;
use crate::ignore_poison::IgnorePoison;
use crate::listing::{
    CancellationToken, EntrySink, EnumerationOptions, EnumerationOutcome, LiveCollection, LiveCollectionView,
    ReconcileResult, SortDirection, SortKey, SortSpec, enumerate,
};
use crate::watcher::{ChangeNotification, ChangeSource, ChangeSubscription};
use scope::{ActiveScope, ScopeResult, wait_for};

// ============================================================================
// State
// ============================================================================

struct SessionState {
    /// Working directory. Kept after a cancel or failure so `refresh` can retry it.
    path: Option<PathBuf>,
    phase: SessionPhase,
    /// Bumped on every navigation. Tags batches and change subscriptions.
    generation: u64,
    sort: SortSpec,
    /// Task forwarding change notifications for the current directory.
    follower: Option<JoinHandle<()>>,
}

impl SessionState {
    fn stop_following(&mut self) {
        if let Some(follower) = self.follower.take() {
            follower.abort();
        }
    }
}

struct SessionInner {
    id: String,
    enumerator: Arc<dyn DirectoryEnumerator>,
    aliases: Arc<dyn AliasResolver>,
    link_policy: Arc<dyn LinkPolicy>,
    change_source: Option<Arc<dyn ChangeSource>>,
    config: ListingConfig,
    collection: LiveCollection,
    state: Mutex<SessionState>,
    /// Held while starting or cancelling a scope, so those never interleave.
    scope: tokio::sync::Mutex<Option<ActiveScope>>,
    status: broadcast::Sender<SessionEvent>,
    notification_ticket: AtomicU64,
    reconcile_turn: tokio::sync::Mutex<()>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        // The scope task only holds a weak reference, so the load stops at its next entry
        if let Some(scope) = self.scope.get_mut().take() {
            scope.token.cancel();
        }
        self.state.lock_ignore_poison().stop_following();
        log::debug!("DirectorySession {}: dropped", self.id);
    }
}

/// Builds a `DirectorySession` with optional collaborators.
pub struct SessionBuilder {
    enumerator: Arc<dyn DirectoryEnumerator>,
    aliases: Arc<dyn AliasResolver>,
    config: ListingConfig,
    link_policy: Arc<dyn LinkPolicy>,
    change_source: Option<Arc<dyn ChangeSource>>,
}

impl SessionBuilder {
    /// Decides whether links and shortcuts are listed. Default: all are.
    pub fn with_link_policy(mut self, link_policy: Arc<dyn LinkPolicy>) -> Self {
        self.link_policy = link_policy;
        self
    }

    /// Follows changes to each loaded directory. Default: no change following.
    pub fn with_change_source(mut self, change_source: Arc<dyn ChangeSource>) -> Self {
        self.change_source = Some(change_source);
        self
    }

    pub fn build(self) -> DirectorySession {
        let id = uuid::Uuid::new_v4().to_string();
        let (status, _) = broadcast::channel(self.config.event_capacity.max(1));
        log::debug!("DirectorySession {}: created", id);
        DirectorySession {
            inner: Arc::new(SessionInner {
                id,
                enumerator: self.enumerator,
                aliases: self.aliases,
                link_policy: self.link_policy,
                change_source: self.change_source,
                collection: LiveCollection::new(self.config.event_capacity),
                state: Mutex::new(SessionState {
                    path: None,
                    phase: SessionPhase::Idle,
                    generation: 0,
                    sort: self.config.sort,
                    follower: None,
                }),
                config: self.config,
                scope: tokio::sync::Mutex::new(None),
                status,
                notification_ticket: AtomicU64::new(0),
                reconcile_turn: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

/// Handle to a directory session. Clones share the same session.
#[derive(Clone)]
pub struct DirectorySession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for DirectorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorySession")
            .field("id", &self.inner.id)
            .field("path", &self.current_path())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl DirectorySession {
    pub fn new(
        enumerator: Arc<dyn DirectoryEnumerator>,
        aliases: Arc<dyn AliasResolver>,
        config: ListingConfig,
    ) -> Self {
        Self::builder(enumerator, aliases, config).build()
    }

    pub fn builder(
        enumerator: Arc<dyn DirectoryEnumerator>,
        aliases: Arc<dyn AliasResolver>,
        config: ListingConfig,
    ) -> SessionBuilder {
        SessionBuilder {
            enumerator,
            aliases,
            config,
            link_policy: Arc::new(IncludeLinks),
            change_source: None,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn session_id(&self) -> &str {
        &self.inner.id
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.inner.state.lock_ignore_poison().path.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock_ignore_poison().phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase() == SessionPhase::Loading
    }

    pub fn sort(&self) -> SortSpec {
        self.inner.state.lock_ignore_poison().sort
    }

    /// Read-only view of the live collection.
    pub fn view(&self) -> LiveCollectionView {
        self.inner.collection.view()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.status.subscribe()
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Opens `target` (a path or a well-known alias like "Home") and loads it.
    ///
    /// Resolves once the load has settled: completed, cancelled (by `cancel` or a newer
    /// navigation), or failed. Failures are also reported as `LoadingFailed`.
    pub async fn navigate_to(&self, target: &str) -> Result<NavigationOutcome, ListingError> {
        let path = self.resolve_target(target);
        let done = self.start_scope(path).await;
        wait_for(done).await
    }

    /// Reloads the current directory. Entries keep their identities across the reload.
    pub async fn refresh(&self) -> Result<NavigationOutcome, ListingError> {
        let Some(path) = self.current_path() else {
            return Ok(NavigationOutcome::NoDirectory);
        };
        let done = self.start_scope(path).await;
        wait_for(done).await
    }

    /// Cancels the in-flight load, if any, and waits for it to settle. The working
    /// directory stays the same. A no-op when nothing is loading.
    pub async fn cancel(&self) {
        let mut scope = self.inner.scope.lock().await;
        if let Some(active) = scope.take() {
            log::debug!("DirectorySession {}: cancel (generation {})", self.inner.id, active.generation);
            let _ = active.cancel_and_wait().await;
        }
    }

    /// Cancels any load and stops following changes.
    pub async fn close(&self) {
        self.cancel().await;
        self.inner.state.lock_ignore_poison().stop_following();
        log::debug!("DirectorySession {}: closed", self.inner.id);
    }

    fn resolve_target(&self, target: &str) -> PathBuf {
        match self.inner.aliases.resolve(target) {
            Some(path) => {
                log::debug!("DirectorySession {}: alias {} -> {}", self.inner.id, target, path.display());
                path
            }
            None => PathBuf::from(target),
        }
    }

    /// Tears down the previous scope, resets the collection, and spawns the new load.
    async fn start_scope(&self, path: PathBuf) -> watch::Receiver<Option<ScopeResult>> {
        let mut scope = self.inner.scope.lock().await;
        if let Some(previous) = scope.take() {
            let _ = previous.cancel_and_wait().await;
        }

        let (generation, previous_path) = {
            let mut state = self.inner.state.lock_ignore_poison();
            state.stop_following();
            state.generation += 1;
            state.phase = SessionPhase::Loading;
            let previous_path = state.path.replace(path.clone());
            self.inner.collection.clear();
            (state.generation, previous_path)
        };

        log::info!(
            "DirectorySession {}: loading {} (generation {})",
            self.inner.id,
            path.display(),
            generation
        );
        self.emit(SessionEvent::LoadingStarted {
            session_id: self.inner.id.clone(),
            path: path.to_string_lossy().to_string(),
        });

        let token = CancellationToken::new();
        let (done_sender, done) = watch::channel(None);
        let task = ScopeTask {
            session: Arc::downgrade(&self.inner),
            session_id: self.inner.id.clone(),
            generation,
            path,
            previous_path,
            token: token.clone(),
            enumerator: Arc::clone(&self.inner.enumerator),
            link_policy: Arc::clone(&self.inner.link_policy),
            options: self.inner.config.enumeration_options(),
        };
        tokio::spawn(async move {
            let result = task.run().await;
            let _ = done_sender.send(Some(result));
        });

        *scope = Some(ActiveScope {
            generation,
            token,
            done: done.clone(),
        });
        done
    }

    /// Settles the collection and phase for a finished enumeration.
    fn finish_scope(
        &self,
        generation: u64,
        path: PathBuf,
        previous_path: Option<PathBuf>,
        token: &CancellationToken,
        result: Result<EnumerationOutcome, ListingError>,
    ) -> ScopeResult {
        let mut state = self.inner.state.lock_ignore_poison();
        if state.generation != generation {
            return Ok(NavigationOutcome::Cancelled);
        }
        let path_string = path.to_string_lossy().to_string();

        match result {
            Ok(EnumerationOutcome::Completed { .. }) if !token.is_cancelled() => {
                self.inner.collection.sort(&state.sort);
                let total_count = self.inner.collection.len();
                state.phase = if total_count == 0 {
                    SessionPhase::Empty
                } else {
                    SessionPhase::Ready
                };
                self.start_following(&mut state, &path, generation);
                drop(state);

                log::info!(
                    "DirectorySession {}: loaded {} entries from {}",
                    self.inner.id,
                    total_count,
                    path_string
                );
                self.emit(SessionEvent::LoadingCompleted {
                    session_id: self.inner.id.clone(),
                    path: path_string,
                    total_count,
                    previous_path: previous_path.map(|p| p.to_string_lossy().to_string()),
                });
                Ok(NavigationOutcome::Completed { path, total_count })
            }
            Ok(_) | Err(ListingError::EnumerationCancelled) => {
                // Never leave a half-loaded directory behind
                self.inner.collection.clear();
                state.phase = SessionPhase::Idle;
                drop(state);

                log::debug!("DirectorySession {}: cancelled loading {}", self.inner.id, path_string);
                self.emit(SessionEvent::LoadingCancelled {
                    session_id: self.inner.id.clone(),
                    path: path_string,
                });
                Ok(NavigationOutcome::Cancelled)
            }
            Err(error) => {
                self.inner.collection.clear();
                state.phase = SessionPhase::Idle;
                drop(state);

                log::warn!("DirectorySession {}: failed to load {}: {}", self.inner.id, path_string, error);
                self.emit(SessionEvent::LoadingFailed {
                    session_id: self.inner.id.clone(),
                    path: path_string,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.status.send(event);
    }

    // ------------------------------------------------------------------------
    // Sorting
    // ------------------------------------------------------------------------

    /// Changes the sort key and direction and re-sorts in place, without re-listing.
    pub fn set_sort(&self, key: SortKey, direction: SortDirection) {
        let spec = SortSpec {
            key,
            direction,
            ..self.sort()
        };
        self.set_sort_spec(spec);
    }

    /// Like `set_sort`, also setting folder placement.
    pub fn set_sort_spec(&self, spec: SortSpec) {
        let mut state = self.inner.state.lock_ignore_poison();
        state.sort = spec;
        // While loading, the final sort at completion picks the new spec up
        if state.phase.is_loaded() {
            self.inner.collection.sort(&spec);
        }
    }

    // ------------------------------------------------------------------------
    // Change notifications
    // ------------------------------------------------------------------------

    /// Reconciles the live collection against `observed`, the full set of identities now
    /// in the working directory. `fetch` resolves identities that need adding.
    ///
    /// Fetches run without holding any lock; the result is applied as one batch.
    pub async fn apply_change_notification<F, Fut>(
        &self,
        observed: HashSet<EntryIdentity>,
        mut fetch: F,
    ) -> NotificationOutcome
    where
        F: FnMut(EntryIdentity) -> Fut,
        Fut: Future<Output = Result<DirectoryEntry, ListingError>>,
    {
        let Some(_turn) = self.take_reconcile_turn().await else {
            return NotificationOutcome::Superseded;
        };

        let (generation, plan) = {
            let state = self.inner.state.lock_ignore_poison();
            if !state.phase.is_loaded() {
                return NotificationOutcome::NotReady;
            }
            (state.generation, self.inner.collection.plan(&observed))
        };
        if plan.is_empty() {
            return NotificationOutcome::Applied(ReconcileResult::default());
        }

        let mut fetched = Vec::with_capacity(plan.to_add.len());
        let mut failed = Vec::new();
        for identity in &plan.to_add {
            match fetch(identity.clone()).await {
                Ok(entry) => fetched.push(Arc::new(entry)),
                Err(e) => {
                    log::warn!("DirectorySession {}: couldn't fetch {}, skipping: {}", self.inner.id, identity, e);
                    failed.push(identity.clone());
                }
            }
        }

        let mut state = self.inner.state.lock_ignore_poison();
        if state.generation != generation {
            return NotificationOutcome::Stale;
        }
        let changes = self.inner.collection.apply_changes(&plan.to_remove, fetched, &state.sort);
        self.settle_phase(&mut state);

        NotificationOutcome::Applied(ReconcileResult {
            added: changes.added.len(),
            removed: changes.removed.len(),
            failed,
        })
    }

    /// Applies a notification from the change source, if it still belongs to the
    /// directory being shown.
    async fn apply_notification(&self, notification: ChangeNotification) -> NotificationOutcome {
        let Some(_turn) = self.take_reconcile_turn().await else {
            return NotificationOutcome::Superseded;
        };

        let mut state = self.inner.state.lock_ignore_poison();
        if notification.generation != state.generation {
            return NotificationOutcome::Stale;
        }
        if !state.phase.is_loaded() {
            return NotificationOutcome::NotReady;
        }
        let result = self.inner.collection.reconcile_with(
            &notification.observed(),
            |identity| notification.fetch(identity),
            &state.sort,
        );
        self.settle_phase(&mut state);
        NotificationOutcome::Applied(result)
    }

    /// Waits for this notification's turn. `None` if a newer one arrived meanwhile.
    async fn take_reconcile_turn(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        let ticket = self.inner.notification_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let turn = self.inner.reconcile_turn.lock().await;
        (self.inner.notification_ticket.load(Ordering::SeqCst) == ticket).then_some(turn)
    }

    fn settle_phase(&self, state: &mut SessionState) {
        state.phase = if self.inner.collection.len() == 0 {
            SessionPhase::Empty
        } else {
            SessionPhase::Ready
        };
    }

    fn start_following(&self, state: &mut SessionState, path: &Path, generation: u64) {
        let Some(source) = &self.inner.change_source else {
            return;
        };
        match source.subscribe(path, generation) {
            Ok(subscription) => {
                let session = Arc::downgrade(&self.inner);
                state.follower = Some(tokio::spawn(follow_changes(session, subscription)));
            }
            Err(e) => {
                // The listing is still valid, just not live
                log::warn!("DirectorySession {}: couldn't watch {}: {}", self.inner.id, path.display(), e);
            }
        }
    }
}

/// Forwards notifications to the session until the subscription ends or the session goes away.
async fn follow_changes(session: Weak<SessionInner>, mut subscription: ChangeSubscription) {
    while subscription.receiver.changed().await.is_ok() {
        let Some(notification) = subscription.receiver.borrow_and_update().clone() else {
            continue;
        };
        let Some(inner) = session.upgrade() else {
            break;
        };
        let session = DirectorySession { inner };
        let outcome = session.apply_notification(notification).await;
        log::debug!("DirectorySession {}: change notification: {:?}", session.inner.id, outcome);
    }
}

/// One load, run on its own task. Holds the session weakly so dropping every handle
/// tears the load down.
struct ScopeTask {
    session: Weak<SessionInner>,
    session_id: String,
    generation: u64,
    path: PathBuf,
    previous_path: Option<PathBuf>,
    token: CancellationToken,
    enumerator: Arc<dyn DirectoryEnumerator>,
    link_policy: Arc<dyn LinkPolicy>,
    options: EnumerationOptions,
}

impl ScopeTask {
    async fn run(self) -> ScopeResult {
        let ScopeTask {
            session,
            session_id,
            generation,
            path,
            previous_path,
            token,
            enumerator,
            link_policy,
            options,
        } = self;
        let blocking_session = Weak::clone(&session);
        let blocking_path = path.clone();
        let blocking_token = token.clone();

        // Run blocking I/O on dedicated thread pool
        let result = tokio::task::spawn_blocking(move || {
            let mut sink = StreamingSink {
                session: &blocking_session,
                generation,
                token: &blocking_token,
                pending: Vec::with_capacity(options.batch_size),
            };
            enumerate(
                &*enumerator,
                &blocking_path,
                &options,
                &*link_policy,
                &blocking_token,
                &mut sink,
            )
        })
        .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                // Task panicked
                log::error!("DirectorySession {}: enumeration task failed: {}", session_id, e);
                Err(ListingError::Internal {
                    message: format!("Task failed: {}", e),
                })
            }
        };

        let Some(inner) = session.upgrade() else {
            log::debug!("DirectorySession {}: dropped while loading {}", session_id, path.display());
            return Ok(NavigationOutcome::Cancelled);
        };
        DirectorySession { inner }.finish_scope(generation, path, previous_path, &token, result)
    }
}

/// Buffers entries from the blocking enumeration and appends them batch by batch.
struct StreamingSink<'a> {
    session: &'a Weak<SessionInner>,
    generation: u64,
    token: &'a CancellationToken,
    pending: Vec<DirectoryEntry>,
}

impl EntrySink for StreamingSink<'_> {
    fn entry_found(&mut self, entry: DirectoryEntry) {
        self.pending.push(entry);
    }

    fn batch_completed(&mut self, _loaded: usize) {
        let batch = std::mem::take(&mut self.pending);
        let Some(inner) = self.session.upgrade() else {
            // Dropped; its token is already cancelled
            return;
        };
        let state = inner.state.lock_ignore_poison();
        // Checked under the lock, so nothing lands after a cancel or newer navigation
        if state.generation != self.generation || self.token.is_cancelled() {
            return;
        }
        inner.collection.append_batch(batch);
        // Duplicates are skipped, so count what the collection holds
        let loaded_count = inner.collection.len();
        drop(state);

        let _ = inner.status.send(SessionEvent::LoadingProgressed {
            session_id: inner.id.clone(),
            loaded_count,
        });
    }
}
