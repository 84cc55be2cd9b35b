//! # Core Module
//!
//! The UI-agnostic wallpaper cache.
//!
//! ## Modules
//! - `store` - Durable records, tags, usage log and view pointer
//! - `history` - Previous/next navigation over the usage log
//! - `eviction` - Keeps the cache inside its count and size caps
//! - `curator` - Favorites, ratings, tags and statistics
//! - `cache` - The `WallpaperCache` facade and its configuration
//! - `hasher` - Content fingerprints and wallpaper ids
//! - `metadata` - Resolution probing
//! - `fetcher` - Remote gallery seam and the ingest path
//! - `executor` - Runs the user's wallpaper script
//! - `clock` - Time sources and monotonic timestamps

pub mod cache;
pub mod clock;
pub mod curator;
pub mod eviction;
pub mod executor;
pub mod fetcher;
pub mod hasher;
pub mod history;
pub mod metadata;
pub mod store;

// Re-export commonly used types
pub use cache::{CacheConfig, WallpaperCache};
pub use curator::CacheStatistics;
pub use eviction::CacheLimits;
pub use history::HistoryEntry;
pub use store::WallpaperRecord;
