//! Event type definitions for cache activity.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the wallpaper cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CacheEvent {
    /// A new wallpaper record was stored
    Added { id: String, path: PathBuf },
    /// A wallpaper was shown again
    Used { id: String, use_count: u32 },
    /// A wallpaper was removed on request
    Removed { id: String, path: PathBuf },
    /// A wallpaper was evicted to respect the cache limits
    Evicted {
        id: String,
        path: PathBuf,
        size_bytes: u64,
    },
    /// An eviction pass finished
    EvictionCompleted(EvictionSummary),
    /// Records whose files disappeared were dropped
    InvalidEntriesPruned { count: usize },
    /// A download matched the content of an existing wallpaper
    DuplicateDetected {
        existing_id: String,
        discarded_path: PathBuf,
    },
}

/// Outcome of one eviction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionSummary {
    /// Records removed in this pass
    pub removed: usize,
    /// Candidates skipped because their file could not be deleted
    pub skipped: usize,
    /// Entry count after the pass
    pub remaining_count: usize,
    /// Total size in bytes after the pass
    pub remaining_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_variant_names() {
        let event = CacheEvent::InvalidEntriesPruned { count: 3 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("InvalidEntriesPruned"));
        assert!(json.contains("3"));
    }
}
