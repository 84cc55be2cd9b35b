//! # Store Module
//!
//! Durable storage for wallpaper records, their tags, the usage log and the
//! view pointer.
//!
//! ## Tables
//! - `wallpapers` - one row per distinct remote image
//! - `wallpaper_tags` - tag relation, cascades with its wallpaper
//! - `usage_history` - append-only usage log, cascades with its wallpaper
//! - `view_state` - single-row view pointer, nulled when its wallpaper goes
//!
//! ## Concurrency
//! SQLite runs in WAL mode. All mutations go through one writer connection
//! behind an exclusive lock, each inside an immediate transaction. Reads use
//! a small pool of read-only connections and only ever observe committed
//! snapshots, so a multi-row change is visible entirely or not at all.

pub(crate) mod queries;
mod schema;
mod sqlite;

pub use sqlite::Store;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Highest star rating; 0 means unrated
pub const MAX_RATING: u8 = 5;
/// Lowest rating a user may assign
pub const MIN_RATING: u8 = 1;

/// A cached wallpaper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallpaperRecord {
    /// Stable id derived from the source path
    pub id: String,
    /// Where the image lives on disk
    pub local_path: PathBuf,
    /// Remote path the image was fetched from
    pub source_url: String,
    /// Fingerprint of the file bytes
    pub content_hash: String,
    pub size_bytes: u64,
    pub downloaded_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    /// Times shown, at least 1
    pub use_count: u32,
    /// Search facets active at download time
    pub categories: String,
    pub purity: String,
    /// "WxH", when it could be probed
    pub resolution: Option<String>,
    pub is_favorite: bool,
    /// 0 = unrated, otherwise 1-5
    pub rating: u8,
    pub tags: BTreeSet<String>,
}

impl WallpaperRecord {
    /// Whether the backing file is still on disk
    pub fn file_exists(&self) -> bool {
        self.local_path.exists()
    }

    /// File name for display
    pub fn file_name(&self) -> String {
        self.local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.local_path.display().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.local_path
    }
}

/// Predicate for [`Store::query_all`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub favorite: Option<bool>,
    pub min_rating: Option<u8>,
    /// Records must carry every one of these tags
    pub all_tags: BTreeSet<String>,
    pub last_used_before: Option<DateTime<Utc>>,
    pub max_use_count: Option<u32>,
    pub content_hash: Option<String>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn favorite(mut self, favorite: bool) -> Self {
        self.favorite = Some(favorite);
        self
    }

    pub fn min_rating(mut self, rating: u8) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.all_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn last_used_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.last_used_before = Some(cutoff);
        self
    }

    pub fn max_use_count(mut self, count: u32) -> Self {
        self.max_use_count = Some(count);
        self
    }

    pub fn content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }
}

/// Sort order for [`Store::query_all`]. Ties always break on id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordOrder {
    /// Least recently used first
    LastUsedAsc,
    /// Most recently used first
    #[default]
    LastUsedDesc,
    /// Highest rating first, then most recently used
    RatingThenLastUsed,
    /// Most used first
    UseCountDesc,
    /// Oldest download first
    DownloadedAsc,
}

impl RecordOrder {
    fn sql(&self) -> &'static str {
        match self {
            RecordOrder::LastUsedAsc => "w.last_used_at ASC, w.id ASC",
            RecordOrder::LastUsedDesc => "w.last_used_at DESC, w.id ASC",
            RecordOrder::RatingThenLastUsed => "w.rating DESC, w.last_used_at DESC, w.id ASC",
            RecordOrder::UseCountDesc => "w.use_count DESC, w.id ASC",
            RecordOrder::DownloadedAsc => "w.downloaded_at ASC, w.id ASC",
        }
    }
}

/// A filtered, ordered scan over wallpaper records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub filter: RecordFilter,
    pub order: RecordOrder,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new(filter: RecordFilter, order: RecordOrder) -> Self {
        Self {
            filter,
            order,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the WHERE/ORDER BY/LIMIT tail and its parameters
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        let f = &self.filter;

        if let Some(favorite) = f.favorite {
            clauses.push("w.is_favorite = ?".to_string());
            params.push(Value::Integer(favorite as i64));
        }
        if let Some(rating) = f.min_rating {
            clauses.push("w.rating >= ?".to_string());
            params.push(Value::Integer(rating as i64));
        }
        if !f.all_tags.is_empty() {
            let placeholders = vec!["?"; f.all_tags.len()].join(", ");
            clauses.push(format!(
                "(SELECT COUNT(DISTINCT t.tag) FROM wallpaper_tags t
                  WHERE t.wallpaper_id = w.id AND t.tag IN ({placeholders})) = ?"
            ));
            params.extend(f.all_tags.iter().map(|t| Value::Text(t.clone())));
            params.push(Value::Integer(f.all_tags.len() as i64));
        }
        if let Some(cutoff) = f.last_used_before {
            clauses.push("w.last_used_at < ?".to_string());
            params.push(Value::Integer(crate::core::clock::to_micros(cutoff)));
        }
        if let Some(count) = f.max_use_count {
            clauses.push("w.use_count <= ?".to_string());
            params.push(Value::Integer(count as i64));
        }
        if let Some(hash) = &f.content_hash {
            clauses.push("w.content_hash = ?".to_string());
            params.push(Value::Text(hash.clone()));
        }

        let mut sql = String::new();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(self.order.sql());
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(limit as i64));
        }

        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_only_orders() {
        let (sql, params) = RecordQuery::default().to_sql();
        assert_eq!(sql, " ORDER BY w.last_used_at DESC, w.id ASC");
        assert!(params.is_empty());
    }

    #[test]
    fn tag_filter_uses_intersection_count() {
        let query = RecordQuery::new(
            RecordFilter::all().with_tags(["a", "b", "a"]),
            RecordOrder::LastUsedDesc,
        );
        let (sql, params) = query.to_sql();

        assert!(sql.contains("COUNT(DISTINCT t.tag)"));
        // two distinct tags plus the expected count
        assert_eq!(params.len(), 3);
        assert_eq!(params[2], Value::Integer(2));
    }

    #[test]
    fn combined_filters_are_anded_and_limited() {
        let query = RecordQuery::new(
            RecordFilter::all().favorite(false).min_rating(3),
            RecordOrder::LastUsedAsc,
        )
        .limit(10);
        let (sql, params) = query.to_sql();

        assert!(sql.contains("w.is_favorite = ? AND w.rating >= ?"));
        assert!(sql.ends_with("LIMIT ?"));
        assert_eq!(params.last(), Some(&Value::Integer(10)));
    }
}
