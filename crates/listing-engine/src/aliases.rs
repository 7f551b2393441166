//! Well-known location aliases ("Home", "Downloads", `~/projects`).
//!
//! Resolution is a pure lookup. Nothing here touches the filesystem.

use std::collections::HashMap;
use std::path::PathBuf;

/// Maps virtual location tokens to concrete paths.
pub trait AliasResolver: Send + Sync {
    /// Returns the concrete path for `target`, or `None` if it isn't an alias.
    fn resolve(&self, target: &str) -> Option<PathBuf>;
}

/// The user's special folders, looked up through the platform's known-folder APIs.
///
/// Tokens are matched case-insensitively: `Home` (also `~`), `Desktop`, `Documents`,
/// `Downloads`, `Pictures`, `Music`, `Videos`. Paths starting with `~/` are expanded too.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownFolders;

impl KnownFolders {
    pub fn new() -> Self {
        Self
    }
}

impl AliasResolver for KnownFolders {
    fn resolve(&self, target: &str) -> Option<PathBuf> {
        if let Some(rest) = target.strip_prefix("~/") {
            return dirs::home_dir().map(|home| home.join(rest));
        }
        match target.to_lowercase().as_str() {
            "~" | "home" => dirs::home_dir(),
            "desktop" => dirs::desktop_dir(),
            "documents" => dirs::document_dir(),
            "downloads" => dirs::download_dir(),
            "pictures" => dirs::picture_dir(),
            "music" => dirs::audio_dir(),
            "videos" => dirs::video_dir(),
            _ => None,
        }
    }
}

/// An explicit token-to-path table.
#[derive(Debug, Clone, Default)]
pub struct StaticAliases {
    aliases: HashMap<String, PathBuf>,
}

impl StaticAliases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an alias. Tokens are matched case-insensitively.
    pub fn with(mut self, token: &str, path: impl Into<PathBuf>) -> Self {
        self.aliases.insert(token.to_lowercase(), path.into());
        self
    }
}

impl AliasResolver for StaticAliases {
    fn resolve(&self, target: &str) -> Option<PathBuf> {
        self.aliases.get(&target.to_lowercase()).cloned()
    }
}

/// Never resolves anything. For sessions that only take literal paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAliases;

impl AliasResolver for NoAliases {
    fn resolve(&self, _target: &str) -> Option<PathBuf> {
        None
    }
}
