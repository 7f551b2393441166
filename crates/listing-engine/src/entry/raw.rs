//! Raw records handed over by a `DirectoryEnumerator`, before the engine normalizes them.

use bitflags::bitflags;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ListingError;

bitflags! {
    /// Native attribute bits carried by a raw entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileAttributes: u32 {
        const DIRECTORY = 1 << 0;
        const HIDDEN = 1 << 1;
        const SYSTEM = 1 << 2;
        /// Symlink, reparse point, or shell shortcut.
        const SYMLINK = 1 << 3;
        const READONLY = 1 << 4;
    }
}

/// Native-style file id (device + inode, or volume serial + file index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId {
    pub device: u64,
    pub inode: u64,
}

/// Broken-down UTC timestamp as native listing APIs report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

impl NativeTimestamp {
    /// Converts to a `DateTime<Utc>`. Impossible dates (month 13, Feb 30) are corrupt data.
    pub fn to_utc(&self, path: &str) -> Result<DateTime<Utc>, ListingError> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))
            .and_then(|date| {
                date.and_hms_milli_opt(
                    u32::from(self.hour),
                    u32::from(self.minute),
                    u32::from(self.second),
                    u32::from(self.millisecond),
                )
            })
            .map(|naive| naive.and_utc())
            .ok_or_else(|| ListingError::CorruptEntry {
                path: path.to_string(),
                reason: format!("invalid timestamp {:?}", self),
            })
    }

    /// Breaks a `DateTime<Utc>` down into native fields. Years outside `0..=65535` are clamped.
    pub fn from_utc(time: DateTime<Utc>) -> Self {
        Self {
            year: time.year().clamp(0, i32::from(u16::MAX)) as u16,
            month: time.month() as u8,
            day: time.day() as u8,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
            // Leap-second nanos can exceed 999_999_999
            millisecond: (time.timestamp_subsec_millis().min(999)) as u16,
        }
    }

    /// The Unix epoch, used when a timestamp can't be read at all.
    pub fn epoch() -> Self {
        Self::from_utc(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// One directory item as the enumerator sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// File name including extension.
    pub name: String,
    /// Absolute path, already normalized by the enumerator.
    pub full_path: String,
    /// Native file id, if the backing store has one.
    pub file_id: Option<FileId>,
    pub attributes: FileAttributes,
    pub size_high: u32,
    pub size_low: u32,
    pub modified: NativeTimestamp,
    /// Resolved display type ("PNG image"), when the backing store knows it.
    pub type_hint: Option<String>,
}

impl RawEntry {
    /// A plain file record with path identity, for fakes and tests.
    pub fn file(dir: &str, name: &str, size: u64, modified: DateTime<Utc>) -> Self {
        let (size_high, size_low) = split_size(size);
        Self {
            name: name.to_string(),
            full_path: join(dir, name),
            file_id: None,
            attributes: FileAttributes::empty(),
            size_high,
            size_low,
            modified: NativeTimestamp::from_utc(modified),
            type_hint: None,
        }
    }

    /// A directory record with path identity, for fakes and tests.
    pub fn directory(dir: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            full_path: join(dir, name),
            file_id: None,
            attributes: FileAttributes::DIRECTORY,
            size_high: 0,
            size_low: 0,
            modified: NativeTimestamp::epoch(),
            type_hint: None,
        }
    }

    pub fn with_attributes(mut self, attributes: FileAttributes) -> Self {
        self.attributes |= attributes;
        self
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes.contains(FileAttributes::HIDDEN)
    }

    /// Protected operating system item. Only matters together with `is_hidden`.
    pub fn is_system(&self) -> bool {
        self.attributes.contains(FileAttributes::SYSTEM)
    }

    /// Name starts with a dot. Toggled separately from the hidden attribute.
    pub fn is_dot_file(&self) -> bool {
        self.name.starts_with('.')
    }

    pub fn is_link(&self) -> bool {
        self.attributes.contains(FileAttributes::SYMLINK)
    }

    /// `.` and `..` pseudo-entries.
    pub fn is_pseudo_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    pub fn size_bytes(&self) -> u64 {
        combine_size(self.size_high, self.size_low)
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Combines the high/low halves of a native 64-bit size.
pub fn combine_size(high: u32, low: u32) -> u64 {
    (u64::from(high) << 32) | u64::from(low)
}

/// Splits a size into the (high, low) halves native APIs use.
pub fn split_size(size: u64) -> (u32, u32) {
    ((size >> 32) as u32, (size & 0xFFFF_FFFF) as u32)
}
