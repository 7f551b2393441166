//! Tests for entry ordering.

use chrono::{DateTime, TimeZone, Utc};

use super::sorting::{
    FolderPlacement, SortDirection, SortKey, SortSpec, compare_names_natural, insertion_index, order_entries,
    sort_entries,
};
use crate::entry::{DirectoryEntry, EntryIdentity, type_label_for};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn dir(name: &str) -> DirectoryEntry {
    DirectoryEntry {
        identity: EntryIdentity::from_path(&format!("/test/{}", name)),
        name: name.to_string(),
        is_directory: true,
        size_bytes: 0,
        modified_utc: at(1_600_000_000),
        type_label: type_label_for(name, true, None),
        full_path: format!("/test/{}", name),
    }
}

fn file(name: &str, size: u64, modified: i64) -> DirectoryEntry {
    DirectoryEntry {
        identity: EntryIdentity::from_path(&format!("/test/{}", name)),
        name: name.to_string(),
        is_directory: false,
        size_bytes: size,
        modified_utc: at(modified),
        type_label: type_label_for(name, false, None),
        full_path: format!("/test/{}", name),
    }
}

fn names(entries: &[DirectoryEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

/// Folders {"Photos", "zzz"}, files {"a.txt" (t1, 10 bytes), "b.txt" (t2, 20 bytes)}.
fn scenario() -> Vec<DirectoryEntry> {
    vec![
        file("b.txt", 20, 2_000),
        dir("zzz"),
        file("a.txt", 10, 1_000),
        dir("Photos"),
    ]
}

#[test]
fn test_name_ascending_puts_folders_first() {
    let sorted = order_entries(scenario(), &SortSpec::new(SortKey::Name, SortDirection::Ascending));
    assert_eq!(names(&sorted), vec!["Photos", "zzz", "a.txt", "b.txt"]);
}

#[test]
fn test_size_descending_with_folders_always_first() {
    // Regression: folders keep their place, folder tie on size falls back to name descending
    let spec = SortSpec::new(SortKey::Size, SortDirection::Descending).with_folders(FolderPlacement::AlwaysFirst);
    let sorted = order_entries(scenario(), &spec);
    assert_eq!(names(&sorted), vec!["zzz", "Photos", "b.txt", "a.txt"]);
}

#[test]
fn test_size_descending_structural_flips_grouping() {
    let spec = SortSpec::new(SortKey::Size, SortDirection::Descending);
    let sorted = order_entries(scenario(), &spec);
    assert_eq!(names(&sorted), vec!["b.txt", "a.txt", "zzz", "Photos"]);
}

#[test]
fn test_mixed_sorts_folders_alongside_files_by_name() {
    let spec = SortSpec::new(SortKey::Name, SortDirection::Ascending).with_folders(FolderPlacement::Mixed);
    let sorted = order_entries(scenario(), &spec);
    assert_eq!(names(&sorted), vec!["a.txt", "b.txt", "Photos", "zzz"]);
}

#[test]
fn test_mixed_orders_by_key_alone() {
    let by_date = SortSpec::new(SortKey::DateModified, SortDirection::Descending).with_folders(FolderPlacement::Mixed);
    let mut entries = scenario();
    entries.push(file("new.log", 1, 1_700_000_000));
    let sorted = order_entries(entries, &by_date);
    // Folders are dated between the two groups of files
    assert_eq!(names(&sorted), vec!["new.log", "zzz", "Photos", "b.txt", "a.txt"]);
}

#[test]
fn test_file_type_descending_keeps_folders_first() {
    let entries = vec![
        file("notes.md", 1, 1),
        dir("Alpha"),
        file("a.txt", 1, 1),
        dir("Beta"),
        file("b.txt", 1, 1),
    ];
    let sorted = order_entries(entries, &SortSpec::new(SortKey::FileType, SortDirection::Descending));
    // Folders first, then "TXT File" before "MD File", ties by name descending
    assert_eq!(names(&sorted), vec!["Beta", "Alpha", "b.txt", "a.txt", "notes.md"]);
}

#[test]
fn test_date_modified_ascending_with_name_tie_break() {
    let entries = vec![file("c.txt", 1, 500), file("b.txt", 1, 100), file("a.txt", 1, 500)];
    let sorted = order_entries(entries, &SortSpec::new(SortKey::DateModified, SortDirection::Ascending));
    assert_eq!(names(&sorted), vec!["b.txt", "a.txt", "c.txt"]);
}

#[test]
fn test_name_descending_structural_puts_files_first() {
    let sorted = order_entries(scenario(), &SortSpec::new(SortKey::Name, SortDirection::Descending));
    assert_eq!(names(&sorted), vec!["b.txt", "a.txt", "zzz", "Photos"]);
}

#[test]
fn test_natural_number_ordering() {
    let entries = vec![file("file10", 1, 1), file("file2", 1, 1), file("file1", 1, 1)];
    let sorted = order_entries(entries, &SortSpec::default());
    assert_eq!(names(&sorted), vec!["file1", "file2", "file10"]);
}

#[test]
fn test_name_comparison_is_case_insensitive() {
    assert_eq!(compare_names_natural("apple", "Banana"), std::cmp::Ordering::Less);
    assert_eq!(compare_names_natural("README", "readme"), std::cmp::Ordering::Equal);
}

#[test]
fn test_folders_precede_files_regardless_of_name() {
    let entries = vec![file("0.txt", 1, 1), dir("zzz"), file("AAA", 1, 1), dir("yyy")];
    let sorted = order_entries(entries, &SortSpec::default());
    let first_file = sorted.iter().position(|e| !e.is_directory).unwrap();
    assert!(sorted[..first_file].iter().all(|e| e.is_directory));
    assert!(sorted[first_file..].iter().all(|e| !e.is_directory));
}

#[test]
fn test_ordering_is_idempotent_for_every_spec() {
    let mut entries = scenario();
    entries.push(file("B.TXT", 20, 2_000));
    entries.push(file("file10.md", 5, 3_000));
    entries.push(dir("photos"));

    for key in [SortKey::Name, SortKey::DateModified, SortKey::FileType, SortKey::Size] {
        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            for folders in [FolderPlacement::Structural, FolderPlacement::AlwaysFirst, FolderPlacement::Mixed] {
                let spec = SortSpec::new(key, direction).with_folders(folders);
                let once = order_entries(entries.clone(), &spec);
                let twice = order_entries(once.clone(), &spec);
                assert_eq!(once, twice, "not idempotent for {:?}", spec);
            }
        }
    }
}

#[test]
fn test_empty_input_yields_empty_output() {
    let sorted: Vec<DirectoryEntry> = order_entries(Vec::new(), &SortSpec::default());
    assert!(sorted.is_empty());
}

#[test]
fn test_sort_entries_works_on_arcs() {
    let mut entries: Vec<std::sync::Arc<DirectoryEntry>> =
        scenario().into_iter().map(std::sync::Arc::new).collect();
    sort_entries(&mut entries, &SortSpec::default());
    assert_eq!(entries[0].name, "Photos");
}

#[test]
fn test_insertion_index_keeps_sorted_order() {
    let spec = SortSpec::default();
    let sorted = order_entries(
        vec![dir("Photos"), dir("zzz"), file("apple", 1, 1), file("cherry", 1, 1)],
        &spec,
    );
    assert_eq!(insertion_index(&sorted, &dir("Music"), &spec), 0);
    assert_eq!(insertion_index(&sorted, &dir("Zed"), &spec), 1);
    assert_eq!(insertion_index(&sorted, &file("banana", 1, 1), &spec), 3);
    assert_eq!(insertion_index(&sorted, &file("zebra", 1, 1), &spec), 4);
}
