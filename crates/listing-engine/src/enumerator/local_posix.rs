//! Local file system enumerator.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use super::{DirectoryEnumerator, RawEntryIter};
use crate::entry::{FileAttributes, FileId, NativeTimestamp, RawEntry, normalize_path, split_size};
use crate::error::ListingError;

/// Enumerates the local file system with `std::fs::read_dir`.
///
/// Entries are read lazily, one `readdir` step per `next()`, so the snapshot builder can stop
/// early on cancellation without listing the whole directory first.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEnumerator;

impl LocalEnumerator {
    pub fn new() -> Self {
        Self
    }
}

impl DirectoryEnumerator for LocalEnumerator {
    fn list_entries(&self, path: &Path) -> Result<RawEntryIter, ListingError> {
        let root = path.to_string_lossy().to_string();
        let read_dir = fs::read_dir(path).map_err(|e| ListingError::from_io(&e, &root))?;
        log::debug!("LocalEnumerator: opened {}", path.display());
        Ok(Box::new(LocalHandle {
            inner: read_dir,
            root: path.to_path_buf(),
        }))
    }
}

struct LocalHandle {
    inner: fs::ReadDir,
    root: PathBuf,
}

impl Iterator for LocalHandle {
    type Item = Result<RawEntry, ListingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.inner.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(ListingError::from_io(&e, &self.root.to_string_lossy()))),
        };
        Some(Ok(process_dir_entry(&entry)))
    }
}

impl Drop for LocalHandle {
    fn drop(&mut self) {
        log::trace!("LocalEnumerator: closed {}", self.root.display());
    }
}

/// Builds a raw entry from a `readdir` result.
/// Never fails: if the item can't be stat'ed (permissions, broken symlink), a minimal entry is returned.
fn process_dir_entry(entry: &fs::DirEntry) -> RawEntry {
    let name = entry.file_name().to_string_lossy().to_string();
    let full_path = normalize_path(&entry.path().to_string_lossy());
    let is_symlink = entry.file_type().map(|ft| ft.is_symlink()).unwrap_or(false);

    let mut attributes = FileAttributes::empty();
    if name.starts_with('.') {
        attributes |= FileAttributes::HIDDEN;
    }
    if is_symlink {
        attributes |= FileAttributes::SYMLINK;
    }

    let metadata = if is_symlink {
        fs::symlink_metadata(entry.path())
    } else {
        entry.metadata()
    };
    let Ok(metadata) = metadata else {
        return RawEntry {
            name,
            full_path,
            file_id: None,
            attributes,
            size_high: 0,
            size_low: 0,
            modified: NativeTimestamp::epoch(),
            type_hint: None,
        };
    };

    // Symlinks to directories list as directories
    let target_is_dir = is_symlink && fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false);
    let is_dir = metadata.is_dir() || target_is_dir;
    if is_dir {
        attributes |= FileAttributes::DIRECTORY;
    }
    if metadata.permissions().readonly() {
        attributes |= FileAttributes::READONLY;
    }

    let (size_high, size_low) = if metadata.is_file() { split_size(metadata.len()) } else { (0, 0) };
    let modified = metadata
        .modified()
        .map(|t| NativeTimestamp::from_utc(DateTime::<Utc>::from(t)))
        .unwrap_or_else(|_| NativeTimestamp::epoch());

    RawEntry {
        name,
        full_path,
        file_id: file_id(&metadata, is_dir),
        attributes,
        size_high,
        size_low,
        modified,
        type_hint: None,
    }
}

/// Device + inode. Hard-linked files share an inode, so they fall back to path identity.
#[cfg(unix)]
fn file_id(metadata: &fs::Metadata, is_dir: bool) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;

    if !is_dir && metadata.nlink() > 1 {
        return None;
    }
    Some(FileId {
        device: metadata.dev(),
        inode: metadata.ino(),
    })
}

#[cfg(not(unix))]
fn file_id(_metadata: &fs::Metadata, _is_dir: bool) -> Option<FileId> {
    None
}
