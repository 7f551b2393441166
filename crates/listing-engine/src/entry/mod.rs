//! Directory entry types: identity, display fields, and sort keys.

mod raw;

pub use raw::{FileAttributes, FileId, NativeTimestamp, RawEntry, combine_size, split_size};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::error::ListingError;

/// Type label used for every directory.
pub const FOLDER_TYPE_LABEL: &str = "Folder";

/// Stable key for one filesystem item.
///
/// `FileId` survives in-place renames. `Path` is the fallback when the backing store
/// has no file id (or when the id is shared, like hard links).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum EntryIdentity {
    FileId { device: u64, inode: u64 },
    Path { path: String },
}

impl EntryIdentity {
    pub fn from_path(path: &str) -> Self {
        Self::Path {
            path: normalize_path(path),
        }
    }
}

impl From<FileId> for EntryIdentity {
    fn from(id: FileId) -> Self {
        Self::FileId {
            device: id.device,
            inode: id.inode,
        }
    }
}

impl std::fmt::Display for EntryIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileId { device, inode } => write!(f, "{device}:{inode}"),
            Self::Path { path } => write!(f, "{path}"),
        }
    }
}

/// Whether file names are shown with their extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NameDisplay {
    #[default]
    WithExtension,
    WithoutExtension,
}

/// One file or folder in a listing.
///
/// Entries are shared as `Arc<DirectoryEntry>` by the live collection and never mutated
/// in place. A kind change (file replaced by a folder) is a removal plus an insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub identity: EntryIdentity,
    pub name: String,
    pub is_directory: bool,
    /// Zero for directories.
    pub size_bytes: u64,
    pub modified_utc: DateTime<Utc>,
    pub type_label: String,
    pub full_path: String,
}

impl DirectoryEntry {
    /// Builds an entry from an enumerator record.
    pub fn from_raw(raw: RawEntry, name_display: NameDisplay) -> Result<Self, ListingError> {
        let modified_utc = raw.modified.to_utc(&raw.full_path)?;
        let is_directory = raw.is_directory();
        let identity = match raw.file_id {
            Some(id) => EntryIdentity::from(id),
            None => EntryIdentity::from_path(&raw.full_path),
        };
        let type_label = type_label_for(&raw.name, is_directory, raw.type_hint.as_deref());
        let name = match name_display {
            NameDisplay::WithoutExtension if !is_directory => strip_extension(&raw.name),
            _ => raw.name.clone(),
        };

        Ok(Self {
            identity,
            name,
            is_directory,
            size_bytes: if is_directory { 0 } else { raw.size_bytes() },
            modified_utc,
            type_label,
            full_path: raw.full_path,
        })
    }
}

impl AsRef<DirectoryEntry> for DirectoryEntry {
    fn as_ref(&self) -> &DirectoryEntry {
        self
    }
}

/// "Folder" for directories, the resolved type if known, otherwise "<EXT> File".
pub fn type_label_for(name: &str, is_directory: bool, type_hint: Option<&str>) -> String {
    if is_directory {
        return FOLDER_TYPE_LABEL.to_string();
    }
    if let Some(hint) = type_hint
        && !hint.is_empty()
    {
        return hint.to_string();
    }
    match Path::new(name).extension() {
        Some(ext) => format!("{} File", ext.to_string_lossy().to_uppercase()),
        None => "File".to_string(),
    }
}

fn strip_extension(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Lexical normalization: drops `.` segments, duplicate and trailing separators.
/// Doesn't touch the filesystem, so `..` is kept as-is.
pub fn normalize_path(path: &str) -> String {
    let normalized: PathBuf = Path::new(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        return path.to_string();
    }
    normalized.to_string_lossy().into_owned()
}
