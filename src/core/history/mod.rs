//! # History Module
//!
//! Navigation over the usage log.
//!
//! The timeline is made of distinct wallpapers, each placed at its most
//! recent usage event (`last_seen`). A wallpaper shown many times occupies a
//! single position, and showing an old one again moves it to the front.
//!
//! ## Operations
//! - `current` - greatest `last_seen`, ignoring the view pointer
//! - `previous` / `next` - step from the view pointer, or from the front
//!   of the timeline when no pointer is set
//! - `history` - distinct wallpapers, most recent first
//!
//! Entries whose file has gone missing are skipped, never repaired.

mod navigator;
mod types;

pub use navigator::{HistoryNavigator, DEFAULT_HISTORY_LIMIT};
pub use types::{Direction, HistoryEntry};
