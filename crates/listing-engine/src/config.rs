//! Listing engine configuration.

use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::entry::NameDisplay;
use crate::listing::{DEFAULT_BATCH_SIZE, EnumerationOptions, FolderPlacement, SortSpec};
use crate::watcher::DEFAULT_DEBOUNCE_MS;

/// Default capacity of the collection and status event channels.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration for a directory session.
/// Priority: environment variables > user settings > defaults
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingConfig {
    /// Entries streamed between cancellation checks and progress events
    pub batch_size: usize,
    pub show_hidden: bool,
    /// Protected system items, on top of `show_hidden`
    pub show_system_items: bool,
    pub show_dot_files: bool,
    pub name_display: NameDisplay,
    /// Sort applied to new sessions
    pub sort: SortSpec,
    pub watch_debounce_ms: u64,
    /// Buffered events per subscriber before slow subscribers start lagging
    pub event_capacity: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            show_hidden: false,
            show_system_items: false,
            show_dot_files: true,
            name_display: NameDisplay::WithExtension,
            sort: SortSpec::default(),
            watch_debounce_ms: DEFAULT_DEBOUNCE_MS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ListingConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parses a settings JSON object, then applies env var overrides.
    /// Missing fields take their defaults.
    pub fn from_settings_and_env(settings_json: &str) -> Result<Self, serde_json::Error> {
        let settings: Self = serde_json::from_str(settings_json)?;
        Ok(settings.with_env_overrides())
    }

    /// Applies `LISTING_BATCH_SIZE`, `LISTING_SHOW_HIDDEN`, `LISTING_SHOW_SYSTEM_ITEMS`,
    /// `LISTING_SHOW_DOT_FILES`, and `LISTING_WATCH_DEBOUNCE_MS`. Unparseable values are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(batch_size) = var("LISTING_BATCH_SIZE").and_then(|v| v.parse().ok()) {
            self.batch_size = batch_size;
        }
        if let Some(show_hidden) = var("LISTING_SHOW_HIDDEN").and_then(|v| parse_flag(&v)) {
            self.show_hidden = show_hidden;
        }
        if let Some(show_system_items) = var("LISTING_SHOW_SYSTEM_ITEMS").and_then(|v| parse_flag(&v)) {
            self.show_system_items = show_system_items;
        }
        if let Some(show_dot_files) = var("LISTING_SHOW_DOT_FILES").and_then(|v| parse_flag(&v)) {
            self.show_dot_files = show_dot_files;
        }
        if let Some(ms) = var("LISTING_WATCH_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.watch_debounce_ms = ms;
        }
        self
    }

    pub fn with_folder_placement(mut self, folders: FolderPlacement) -> Self {
        self.sort.folders = folders;
        self
    }

    pub fn enumeration_options(&self) -> EnumerationOptions {
        EnumerationOptions {
            show_hidden: self.show_hidden,
            show_system_items: self.show_system_items,
            show_dot_files: self.show_dot_files,
            name_display: self.name_display,
            batch_size: self.batch_size.max(1),
        }
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => {
            log::warn!("Config: ignoring unrecognized flag value {:?}", value);
            None
        }
    }
}
