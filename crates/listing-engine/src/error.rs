//! Error types for directory listing, enumeration, and reconciliation.

use serde::Serialize;

use crate::entry::EntryIdentity;

/// Errors surfaced by the listing engine.
///
/// Expected conditions (missing folder, no permission, cancellation) are values, never panics.
/// The session turns every variant except `EnumerationCancelled` and `FetchFailed` into a
/// `LoadingFailed` status event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum ListingError {
    /// The directory doesn't exist (or is not a directory).
    PathNotFound { path: String },
    /// The caller lacks permission to read the directory.
    AccessDenied { path: String },
    /// The backing volume or device went away.
    DeviceUnavailable { path: String, message: String },
    /// Internal signal only. Never shown to the user.
    EnumerationCancelled,
    /// A single item vanished between being listed and being fetched.
    FetchFailed { identity: EntryIdentity },
    /// The enumerator handed back data that can't be right (impossible timestamp and the like).
    CorruptEntry { path: String, reason: String },
    /// Any other I/O failure.
    Io { path: String, message: String },
    /// The enumeration task panicked or was torn down unexpectedly.
    Internal { message: String },
}

impl ListingError {
    /// Maps an `io::Error` for `path` to the matching variant.
    pub fn from_io(err: &std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::PathNotFound { path: path.to_string() },
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied { path: path.to_string() },
            _ if is_device_gone(err) => Self::DeviceUnavailable {
                path: path.to_string(),
                message: err.to_string(),
            },
            _ if is_not_a_directory(err) => Self::PathNotFound { path: path.to_string() },
            _ => Self::Io {
                path: path.to_string(),
                message: err.to_string(),
            },
        }
    }

    /// Returns true if this error means the user should be told about it.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::EnumerationCancelled | Self::FetchFailed { .. })
    }

    /// Returns true if retrying the same operation may succeed.
    /// The engine itself never retries; this is a hint for the presentation layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable { .. } | Self::Io { .. })
    }

    /// Returns a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::PathNotFound { path } => format!("The folder {} was removed or doesn't exist.", path),
            Self::AccessDenied { path } => {
                format!("You don't have permission to open {}. Grant access and try again.", path)
            }
            Self::DeviceUnavailable { path, .. } => {
                format!("The drive holding {} is no longer available. Did you unplug it?", path)
            }
            Self::EnumerationCancelled => "Loading was cancelled.".to_string(),
            Self::FetchFailed { .. } => "An item disappeared while the folder was being updated.".to_string(),
            Self::CorruptEntry { path, .. } => format!("Couldn't read the details of {}.", path),
            Self::Io { message, .. } => message.clone(),
            Self::Internal { message } => format!("Something went wrong while loading: {}", message),
        }
    }
}

impl std::fmt::Display for ListingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PathNotFound { path } => write!(f, "Path not found: {path}"),
            Self::AccessDenied { path } => write!(f, "Access denied: {path}"),
            Self::DeviceUnavailable { path, message } => write!(f, "Device unavailable for {path}: {message}"),
            Self::EnumerationCancelled => write!(f, "Enumeration cancelled"),
            Self::FetchFailed { identity } => write!(f, "Failed to fetch entry {identity}"),
            Self::CorruptEntry { path, reason } => write!(f, "Corrupt entry {path}: {reason}"),
            Self::Io { path, message } => write!(f, "I/O error on {path}: {message}"),
            Self::Internal { message } => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::error::Error for ListingError {}

#[cfg(unix)]
fn is_device_gone(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::ENODEV | libc::ENXIO | libc::EIO))
}

#[cfg(not(unix))]
fn is_device_gone(_err: &std::io::Error) -> bool {
    false
}

#[cfg(unix)]
fn is_not_a_directory(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENOTDIR)
}

#[cfg(not(unix))]
fn is_not_a_directory(_err: &std::io::Error) -> bool {
    false
}
