//! Tests for LocalEnumerator against a real temp directory.

use std::fs;
use std::path::Path;

use super::{DirectoryEnumerator, LocalEnumerator};
use crate::entry::{EntryIdentity, FileAttributes, RawEntry};
use crate::error::ListingError;

fn list(path: &Path) -> Vec<RawEntry> {
    LocalEnumerator::new()
        .list_entries(path)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_lists_files_and_directories() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("a.txt"), "0123456789").unwrap();
    fs::create_dir(temp.path().join("Photos")).unwrap();

    let mut entries = list(temp.path());
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "Photos");
    assert!(entries[0].is_directory());
    assert_eq!(entries[1].name, "a.txt");
    assert!(!entries[1].is_directory());
    assert_eq!(entries[1].size_bytes(), 10);
}

#[test]
fn test_never_returns_pseudo_entries() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("x"), "").unwrap();
    assert!(list(temp.path()).iter().all(|e| !e.is_pseudo_entry()));
}

#[test]
fn test_dotfiles_are_hidden() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join(".secret"), "").unwrap();
    let entries = list(temp.path());
    assert!(entries[0].attributes.contains(FileAttributes::HIDDEN));
}

#[test]
fn test_missing_directory_is_path_not_found() {
    let temp = tempfile::tempdir().unwrap();
    let result = LocalEnumerator::new().list_entries(&temp.path().join("missing"));
    assert!(matches!(result, Err(ListingError::PathNotFound { .. })));
}

#[test]
fn test_file_as_root_is_path_not_found() {
    let temp = tempfile::tempdir().unwrap();
    let file = temp.path().join("plain.txt");
    fs::write(&file, "").unwrap();
    let result = LocalEnumerator::new().list_entries(&file);
    assert!(matches!(result, Err(ListingError::PathNotFound { .. })));
}

#[cfg(unix)]
#[test]
fn test_identity_survives_rename() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("before.txt"), "").unwrap();
    let before = list(temp.path()).remove(0);

    fs::rename(temp.path().join("before.txt"), temp.path().join("after.txt")).unwrap();
    let after = list(temp.path()).remove(0);

    assert_eq!(after.name, "after.txt");
    assert!(before.file_id.is_some());
    assert_eq!(before.file_id, after.file_id);
}

#[cfg(unix)]
#[test]
fn test_hard_links_fall_back_to_path_identity() {
    use crate::entry::{DirectoryEntry, NameDisplay};

    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("one"), "").unwrap();
    fs::hard_link(temp.path().join("one"), temp.path().join("two")).unwrap();

    let identities: Vec<EntryIdentity> = list(temp.path())
        .into_iter()
        .map(|raw| DirectoryEntry::from_raw(raw, NameDisplay::WithExtension).unwrap().identity)
        .collect();
    assert_eq!(identities.len(), 2);
    assert_ne!(identities[0], identities[1]);
    assert!(identities.iter().all(|id| matches!(id, EntryIdentity::Path { .. })));
}

#[cfg(unix)]
#[test]
fn test_symlink_to_directory_lists_as_directory() {
    let temp = tempfile::tempdir().unwrap();
    fs::create_dir(temp.path().join("target")).unwrap();
    std::os::unix::fs::symlink(temp.path().join("target"), temp.path().join("link")).unwrap();

    let link = list(temp.path()).into_iter().find(|e| e.name == "link").unwrap();
    assert!(link.is_link());
    assert!(link.is_directory());
}
