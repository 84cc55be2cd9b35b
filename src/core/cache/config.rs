//! Cache configuration builder.

use crate::core::eviction::{
    CacheLimits, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_SIZE_BYTES, DEFAULT_TARGET_PERCENT,
};
use crate::error::CacheError;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "wallpaper-cache";
const DB_FILE: &str = "wallpapers.db";

/// Where the store lives for the current user
pub fn default_db_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join(DB_FILE)
}

/// Where downloaded wallpapers go by default
pub fn default_download_dir() -> PathBuf {
    dirs::picture_dir()
        .map(|p| p.join("Wallpapers"))
        .unwrap_or_else(|| PathBuf::from("Wallpapers"))
}

/// Configuration builder for [`super::WallpaperCache`]
#[derive(Debug, Clone)]
pub struct CacheConfig {
    db_path: PathBuf,
    max_entries: usize,
    max_size_bytes: u64,
    target_percent: u8,
}

impl CacheConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            db_path: default_db_path(),
            max_entries: DEFAULT_MAX_ENTRIES,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            target_percent: DEFAULT_TARGET_PERCENT,
        }
    }

    /// Set the database file
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Set the maximum number of cached wallpapers
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the maximum total size in bytes
    pub fn max_size_bytes(mut self, max: u64) -> Self {
        self.max_size_bytes = max;
        self
    }

    /// Set the maximum total size in MiB
    pub fn max_size_mb(self, mb: u64) -> Self {
        self.max_size_bytes(mb.saturating_mul(1024 * 1024))
    }

    /// Set how far below the caps eviction reduces to, as a percentage.
    ///
    /// Clamped to 1-100 when the limits are built.
    pub fn target_utilization_percent(mut self, percent: u8) -> Self {
        self.target_percent = percent;
        self
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Validate and build the eviction limits
    pub fn limits(&self) -> Result<CacheLimits, CacheError> {
        CacheLimits::new(self.max_entries, self.max_size_bytes, self.target_percent)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let limits = CacheConfig::new().limits().unwrap();

        assert_eq!(limits.max_entries, 1000);
        assert_eq!(limits.max_size_bytes, 5000 * 1024 * 1024);
        assert_eq!(limits.target_percent, 90);
    }

    #[test]
    fn default_path_ends_in_app_dir() {
        let path = default_db_path();
        assert!(path.ends_with("wallpaper-cache/wallpapers.db"));
    }

    #[test]
    fn builder_overrides_and_validates() {
        let config = CacheConfig::new()
            .db_path("/tmp/x.db")
            .max_entries(10)
            .max_size_mb(2)
            .target_utilization_percent(200);
        let limits = config.limits().unwrap();

        assert_eq!(config.path(), Path::new("/tmp/x.db"));
        assert_eq!(limits.max_size_bytes, 2 * 1024 * 1024);
        assert_eq!(limits.target_percent, 100);
        assert!(CacheConfig::new().max_entries(0).limits().is_err());
    }
}
