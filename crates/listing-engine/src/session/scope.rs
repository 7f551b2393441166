//! One enumeration scope: the cancellation token and completion signal of a single load.

use tokio::sync::watch;

use super::events::NavigationOutcome;
use crate::error::ListingError;
use crate::listing::CancellationToken;

pub(super) type ScopeResult = Result<NavigationOutcome, ListingError>;

/// The most recent load a session started. Finished scopes stay here until the next
/// navigation replaces them; cancelling one of those is a no-op.
pub(super) struct ActiveScope {
    pub(super) generation: u64,
    pub(super) token: CancellationToken,
    pub(super) done: watch::Receiver<Option<ScopeResult>>,
}

impl ActiveScope {
    /// Signals cancellation and waits until the scope has released its enumeration handle
    /// and settled the collection.
    pub(super) async fn cancel_and_wait(self) -> ScopeResult {
        self.token.cancel();
        wait_for(self.done).await
    }
}

/// Waits for a scope to publish its result.
pub(super) async fn wait_for(mut done: watch::Receiver<Option<ScopeResult>>) -> ScopeResult {
    loop {
        let current = done.borrow_and_update().clone();
        if let Some(result) = current {
            return result;
        }
        if done.changed().await.is_err() {
            // Sender dropped; it may still have published just before
            return done.borrow().clone().unwrap_or_else(|| {
                Err(ListingError::Internal {
                    message: "enumeration task ended without a result".to_string(),
                })
            });
        }
    }
}
