//! Session status types and events.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ListingError;
use crate::listing::ReconcileResult;

/// Where a session is in its load lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Nothing loaded: before the first navigation, after a cancel, or after a failure.
    #[default]
    Idle,
    Loading,
    Ready,
    /// Loaded, and the directory has no (visible) entries.
    Empty,
}

impl SessionPhase {
    /// `Ready` or `Empty`: the collection reflects a complete listing.
    pub fn is_loaded(self) -> bool {
        matches!(self, SessionPhase::Ready | SessionPhase::Empty)
    }
}

/// Status events, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "event")]
pub enum SessionEvent {
    LoadingStarted {
        session_id: String,
        path: String,
    },
    /// Emitted after every batch. `loaded_count` is the running total.
    LoadingProgressed {
        session_id: String,
        loaded_count: usize,
    },
    LoadingCompleted {
        session_id: String,
        path: String,
        total_count: usize,
        /// The directory shown before this navigation, if any.
        previous_path: Option<String>,
    },
    LoadingCancelled {
        session_id: String,
        path: String,
    },
    LoadingFailed {
        session_id: String,
        path: String,
        error: ListingError,
    },
}

/// How a `navigate_to` or `refresh` call ended, when it didn't fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Completed { path: PathBuf, total_count: usize },
    /// Cancelled, either explicitly or by a newer navigation.
    Cancelled,
    /// `refresh` with no directory open.
    NoDirectory,
}

/// How an `apply_change_notification` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Applied(ReconcileResult),
    /// A newer notification arrived before this one got its turn.
    Superseded,
    /// No complete listing to reconcile against (idle or still loading).
    NotReady,
    /// The session navigated elsewhere in the meantime.
    Stale,
}
