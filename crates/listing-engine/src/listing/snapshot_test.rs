//! Tests for the snapshot builder.

use chrono::Utc;
use std::path::Path;

use super::snapshot::{CancellationToken, EntrySink, EnumerationOptions, EnumerationOutcome, enumerate};
use crate::entry::{DirectoryEntry, FileAttributes, NameDisplay, RawEntry};
use crate::enumerator::{ExcludeLinks, IncludeLinks, InMemoryEnumerator};
use crate::error::ListingError;

const DIR: &str = "/data";

fn files(count: usize) -> Vec<RawEntry> {
    (0..count)
        .map(|i| RawEntry::file(DIR, &format!("file{:03}.txt", i), i as u64, Utc::now()))
        .collect()
}

#[derive(Default)]
struct RecordingSink {
    entries: Vec<DirectoryEntry>,
    batches: Vec<usize>,
}

impl EntrySink for RecordingSink {
    fn entry_found(&mut self, entry: DirectoryEntry) {
        self.entries.push(entry);
    }

    fn batch_completed(&mut self, loaded: usize) {
        self.batches.push(loaded);
    }
}

fn options(batch_size: usize) -> EnumerationOptions {
    EnumerationOptions {
        batch_size,
        ..EnumerationOptions::default()
    }
}

#[test]
fn test_streams_every_entry_in_batches() {
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, files(7));
    let mut sink = RecordingSink::default();

    let outcome = enumerate(
        &enumerator,
        Path::new(DIR),
        &options(3),
        &IncludeLinks,
        &CancellationToken::new(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(outcome, EnumerationOutcome::Completed { count: 7, filtered: 0 });
    assert_eq!(sink.entries.len(), 7);
    assert_eq!(sink.batches, vec![3, 6, 7]);
    assert_eq!(enumerator.outstanding_handles(), 0);
}

#[test]
fn test_exact_multiple_of_batch_size_has_no_trailing_batch() {
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, files(4));
    let mut sink = RecordingSink::default();

    enumerate(
        &enumerator,
        Path::new(DIR),
        &options(2),
        &IncludeLinks,
        &CancellationToken::new(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(sink.batches, vec![2, 4]);
}

#[test]
fn test_empty_directory_completes_with_no_entries() {
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, vec![]);
    let mut sink = RecordingSink::default();

    let outcome = enumerate(
        &enumerator,
        Path::new(DIR),
        &EnumerationOptions::default(),
        &IncludeLinks,
        &CancellationToken::new(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(outcome, EnumerationOutcome::Completed { count: 0, filtered: 0 });
    assert!(sink.entries.is_empty());
    assert!(sink.batches.is_empty());
    assert_eq!(enumerator.outstanding_handles(), 0);
}

#[test]
fn test_filters_pseudo_hidden_and_links() {
    let mut pseudo = RawEntry::directory(DIR, "..");
    pseudo.full_path = "/".to_string();
    let enumerator = InMemoryEnumerator::new().with_directory(
        DIR,
        vec![
            pseudo,
            RawEntry::directory(DIR, "."),
            RawEntry::file(DIR, ".hidden", 1, Utc::now()).with_attributes(FileAttributes::HIDDEN),
            RawEntry::file(DIR, "pagefile.sys", 1, Utc::now())
                .with_attributes(FileAttributes::HIDDEN | FileAttributes::SYSTEM),
            RawEntry::file(DIR, "link", 1, Utc::now()).with_attributes(FileAttributes::SYMLINK),
            RawEntry::file(DIR, "visible.txt", 1, Utc::now()),
        ],
    );

    let mut names = Vec::new();
    let outcome = enumerate(
        &enumerator,
        Path::new(DIR),
        &EnumerationOptions::default(),
        &ExcludeLinks,
        &CancellationToken::new(),
        &mut |entry: DirectoryEntry| names.push(entry.name),
    )
    .unwrap();

    assert_eq!(names, vec!["visible.txt"]);
    assert_eq!(outcome, EnumerationOutcome::Completed { count: 1, filtered: 5 });
}

fn listed_names(entries: Vec<RawEntry>, options: &EnumerationOptions) -> Vec<String> {
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, entries);
    let mut names = Vec::new();
    enumerate(
        &enumerator,
        Path::new(DIR),
        options,
        &IncludeLinks,
        &CancellationToken::new(),
        &mut |entry: DirectoryEntry| names.push(entry.name),
    )
    .unwrap();
    names
}

fn visibility_fixture() -> Vec<RawEntry> {
    vec![
        RawEntry::directory(DIR, ".."),
        RawEntry::file(DIR, "desktop.ini", 1, Utc::now()).with_attributes(FileAttributes::HIDDEN),
        RawEntry::file(DIR, "pagefile.sys", 1, Utc::now())
            .with_attributes(FileAttributes::HIDDEN | FileAttributes::SYSTEM),
        RawEntry::file(DIR, "boot.log", 1, Utc::now()).with_attributes(FileAttributes::SYSTEM),
        RawEntry::file(DIR, ".gitignore", 1, Utc::now()),
        RawEntry::file(DIR, "notes.txt", 1, Utc::now()),
    ]
}

#[test]
fn test_defaults_hide_hidden_items_but_show_dot_files() {
    let names = listed_names(visibility_fixture(), &EnumerationOptions::default());

    // A system attribute alone doesn't hide anything
    assert_eq!(names, vec!["boot.log", ".gitignore", "notes.txt"]);
}

#[test]
fn test_show_hidden_still_hides_protected_system_items() {
    let options = EnumerationOptions {
        show_hidden: true,
        ..EnumerationOptions::default()
    };

    let names = listed_names(visibility_fixture(), &options);

    // Pseudo entries never show, even with hidden items on
    assert_eq!(names, vec!["desktop.ini", "boot.log", ".gitignore", "notes.txt"]);
}

#[test]
fn test_show_system_items_needs_show_hidden() {
    let system_only = EnumerationOptions {
        show_system_items: true,
        ..EnumerationOptions::default()
    };
    assert_eq!(
        listed_names(visibility_fixture(), &system_only),
        vec!["boot.log", ".gitignore", "notes.txt"]
    );

    let both = EnumerationOptions {
        show_hidden: true,
        show_system_items: true,
        ..EnumerationOptions::default()
    };
    assert_eq!(
        listed_names(visibility_fixture(), &both),
        vec!["desktop.ini", "pagefile.sys", "boot.log", ".gitignore", "notes.txt"]
    );
}

#[test]
fn test_dot_files_toggle_independently_of_hidden_items() {
    let options = EnumerationOptions {
        show_hidden: true,
        show_system_items: true,
        show_dot_files: false,
        ..EnumerationOptions::default()
    };
    let mut entries = visibility_fixture();
    entries.push(RawEntry::file(DIR, ".profile", 1, Utc::now()).with_attributes(FileAttributes::HIDDEN));

    let names = listed_names(entries, &options);

    assert_eq!(names, vec!["desktop.ini", "pagefile.sys", "boot.log", "notes.txt"]);
}

#[test]
fn test_name_display_is_applied() {
    let enumerator =
        InMemoryEnumerator::new().with_directory(DIR, vec![RawEntry::file(DIR, "report.pdf", 1, Utc::now())]);
    let options = EnumerationOptions {
        name_display: NameDisplay::WithoutExtension,
        ..EnumerationOptions::default()
    };

    let mut names = Vec::new();
    enumerate(
        &enumerator,
        Path::new(DIR),
        &options,
        &IncludeLinks,
        &CancellationToken::new(),
        &mut |entry: DirectoryEntry| names.push(entry.name),
    )
    .unwrap();

    assert_eq!(names, vec!["report"]);
}

#[test]
fn test_cancel_before_start_opens_nothing() {
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, files(3));
    let token = CancellationToken::new();
    token.cancel();
    let mut sink = RecordingSink::default();

    let outcome = enumerate(
        &enumerator,
        Path::new(DIR),
        &EnumerationOptions::default(),
        &IncludeLinks,
        &token,
        &mut sink,
    )
    .unwrap();

    assert_eq!(outcome, EnumerationOutcome::Cancelled { count: 0 });
    assert_eq!(enumerator.opened(), 0);
    assert!(sink.entries.is_empty());
}

/// Cancels the token from inside the sink after a fixed number of entries.
struct CancellingSink {
    token: CancellationToken,
    cancel_after: usize,
    received: usize,
    batches: Vec<usize>,
}

impl EntrySink for CancellingSink {
    fn entry_found(&mut self, _entry: DirectoryEntry) {
        self.received += 1;
        if self.received == self.cancel_after {
            self.token.cancel();
        }
    }

    fn batch_completed(&mut self, loaded: usize) {
        self.batches.push(loaded);
    }
}

#[test]
fn test_cancel_mid_enumeration_stops_delivery_and_releases_handle() {
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, files(100));
    let token = CancellationToken::new();
    let mut sink = CancellingSink {
        token: token.clone(),
        cancel_after: 15,
        received: 0,
        batches: Vec::new(),
    };

    let outcome = enumerate(
        &enumerator,
        Path::new(DIR),
        &options(10),
        &IncludeLinks,
        &token,
        &mut sink,
    )
    .unwrap();

    assert_eq!(outcome, EnumerationOutcome::Cancelled { count: 15 });
    assert_eq!(sink.received, 15);
    // Only the batch completed before cancellation is reported
    assert_eq!(sink.batches, vec![10]);
    assert_eq!(enumerator.opened(), 1);
    assert_eq!(enumerator.outstanding_handles(), 0);
}

#[test]
fn test_cancel_at_batch_boundary_skips_batch_flush() {
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, files(20));
    let token = CancellationToken::new();
    let mut sink = CancellingSink {
        token: token.clone(),
        cancel_after: 10,
        received: 0,
        batches: Vec::new(),
    };

    let outcome = enumerate(
        &enumerator,
        Path::new(DIR),
        &options(10),
        &IncludeLinks,
        &token,
        &mut sink,
    )
    .unwrap();

    assert_eq!(outcome, EnumerationOutcome::Cancelled { count: 10 });
    assert!(sink.batches.is_empty());
}

#[test]
fn test_open_failure_is_typed_and_leaks_nothing() {
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, files(1));
    enumerator.fail_open(DIR, ListingError::AccessDenied { path: DIR.to_string() });

    let result = enumerate(
        &enumerator,
        Path::new(DIR),
        &EnumerationOptions::default(),
        &IncludeLinks,
        &CancellationToken::new(),
        &mut |_: DirectoryEntry| {},
    );

    assert!(matches!(result, Err(ListingError::AccessDenied { .. })));
    assert_eq!(enumerator.outstanding_handles(), 0);
}

#[test]
fn test_missing_path_is_not_found() {
    let enumerator = InMemoryEnumerator::new();
    let result = enumerate(
        &enumerator,
        Path::new("/gone"),
        &EnumerationOptions::default(),
        &IncludeLinks,
        &CancellationToken::new(),
        &mut |_: DirectoryEntry| {},
    );
    assert!(matches!(result, Err(ListingError::PathNotFound { .. })));
}

#[test]
fn test_mid_iteration_failure_aborts_and_releases_handle() {
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, files(10));
    enumerator.fail_after(
        DIR,
        4,
        ListingError::DeviceUnavailable {
            path: DIR.to_string(),
            message: "device removed".to_string(),
        },
    );
    let mut sink = RecordingSink::default();

    let result = enumerate(
        &enumerator,
        Path::new(DIR),
        &options(100),
        &IncludeLinks,
        &CancellationToken::new(),
        &mut sink,
    );

    assert!(matches!(result, Err(ListingError::DeviceUnavailable { .. })));
    assert_eq!(sink.entries.len(), 4);
    assert!(sink.batches.is_empty());
    assert_eq!(enumerator.outstanding_handles(), 0);
}

#[test]
fn test_corrupt_timestamp_fails_enumeration() {
    let mut broken = RawEntry::file(DIR, "broken.txt", 1, Utc::now());
    broken.modified.month = 13;
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, vec![broken]);

    let result = enumerate(
        &enumerator,
        Path::new(DIR),
        &EnumerationOptions::default(),
        &IncludeLinks,
        &CancellationToken::new(),
        &mut |_: DirectoryEntry| {},
    );

    assert!(matches!(result, Err(ListingError::CorruptEntry { .. })));
    assert_eq!(enumerator.outstanding_handles(), 0);
}

#[test]
fn test_zero_batch_size_is_treated_as_one() {
    let enumerator = InMemoryEnumerator::new().with_directory(DIR, files(2));
    let mut sink = RecordingSink::default();

    enumerate(
        &enumerator,
        Path::new(DIR),
        &options(0),
        &IncludeLinks,
        &CancellationToken::new(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(sink.batches, vec![1, 2]);
}
