//! # Wallpaper Cache
//!
//! A local cache of downloaded desktop wallpapers with browser-style
//! history navigation.
//!
//! ## What it keeps
//! - **Records** - one per distinct remote image, with its file, content
//!   fingerprint, usage counters and user curation
//! - **Usage log** - every time a wallpaper was shown
//! - **View pointer** - where previous/next navigation is anchored
//!
//! ## Architecture
//! - `core` - The cache engine (UI-agnostic)
//! - `events` - Event stream for observing cache activity
//! - `error` - Error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use crate::core::cache::{CacheConfig, WallpaperCache};
pub use crate::core::fetcher::{SearchCriteria, SearchFacets};
pub use crate::core::store::WallpaperRecord;
pub use error::{AppError, CacheError, Result};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the library
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. Calling this
/// twice is harmless.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
