//! Types returned by history navigation.

use crate::core::store::WallpaperRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A distinct wallpaper positioned on the usage timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub record: WallpaperRecord,
    /// Most recent usage event for this wallpaper
    pub last_seen: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

impl From<HistoryEntry> for WallpaperRecord {
    fn from(entry: HistoryEntry) -> Self {
        entry.record
    }
}

/// Which way to step from the view pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward older usage
    Previous,
    /// Toward newer usage
    Next,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Previous => "previous",
            Self::Next => "next",
        }
    }
}
