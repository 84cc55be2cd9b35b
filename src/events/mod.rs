//! # Events Module
//!
//! Event stream for observing cache activity.
//!
//! ## Design
//! The cache emits events through channels, so a UI layer (the CLI today)
//! can report evictions and cleanups without the cache knowing about it.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//! let cache = WallpaperCache::open(config)?.with_events(sender);
//!
//! cache.add_wallpaper(url, &path, &facets)?;
//! for event in receiver.drain() {
//!     if let CacheEvent::Evicted { path, .. } = event {
//!         println!("evicted {}", path.display());
//!     }
//! }
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
