//! Typed cache statistics.

use crate::core::clock::{from_micros, to_micros};
use crate::core::history::HistoryNavigator;
use crate::core::store::Store;
use crate::error::CacheError;
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const MOST_USED_LIMIT: usize = 5;
const TOP_TAGS_LIMIT: usize = 10;
const RESOLUTION_LIMIT: usize = 10;
const WEEK_DAYS: i64 = 7;
const MONTH_DAYS: i64 = 30;

/// Snapshot of the whole cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub total_wallpapers: usize,
    /// Records whose file is on disk right now
    pub valid_wallpapers: usize,
    pub invalid_wallpapers: usize,
    pub total_size_bytes: u64,
    pub oldest_download: Option<DateTime<Utc>>,
    pub newest_download: Option<DateTime<Utc>>,
    pub current_wallpaper: Option<String>,
    pub previous_wallpaper: Option<String>,
    pub favorite_count: usize,
    /// Mean over rated records only
    pub average_rating: Option<f64>,
    pub most_used: Vec<UsageCount>,
    pub top_tags: Vec<TagCount>,
    pub resolutions: Vec<ResolutionCount>,
    /// Distinct wallpapers used in the trailing 7 days
    pub unique_last_week: usize,
    /// Distinct wallpapers used in the trailing 30 days
    pub unique_last_month: usize,
    pub total_history_entries: usize,
}

impl CacheStatistics {
    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes as f64 / 1024.0 / 1024.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCount {
    pub id: String,
    pub path: PathBuf,
    pub use_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionCount {
    /// "WxH", or "unknown" when it was never probed
    pub resolution: String,
    pub count: usize,
}

/// Everything that comes straight out of SQL
struct Aggregates {
    total: usize,
    size: u64,
    oldest: Option<i64>,
    newest: Option<i64>,
    favorites: usize,
    average_rating: Option<f64>,
    paths: Vec<PathBuf>,
    most_used: Vec<UsageCount>,
    top_tags: Vec<TagCount>,
    resolutions: Vec<ResolutionCount>,
    week: usize,
    month: usize,
    history_entries: usize,
}

pub(super) fn collect(store: &Store) -> Result<CacheStatistics, CacheError> {
    let now = store.now();
    let agg = store.read(|conn| aggregates(conn, now))?;

    // file checks run outside the read snapshot
    let valid = agg.paths.par_iter().filter(|p| p.exists()).count();

    let recent = HistoryNavigator::new(store).history(2)?;
    let mut recent = recent.into_iter().map(|e| e.record.id);

    Ok(CacheStatistics {
        total_wallpapers: agg.total,
        valid_wallpapers: valid,
        invalid_wallpapers: agg.total.saturating_sub(valid),
        total_size_bytes: agg.size,
        oldest_download: agg.oldest.map(from_micros),
        newest_download: agg.newest.map(from_micros),
        current_wallpaper: recent.next(),
        previous_wallpaper: recent.next(),
        favorite_count: agg.favorites,
        average_rating: agg.average_rating,
        most_used: agg.most_used,
        top_tags: agg.top_tags,
        resolutions: agg.resolutions,
        unique_last_week: agg.week,
        unique_last_month: agg.month,
        total_history_entries: agg.history_entries,
    })
}

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<usize, CacheError> {
    let n: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(n.max(0) as usize)
}

fn aggregates(conn: &Connection, now: DateTime<Utc>) -> Result<Aggregates, CacheError> {
    let (total, size, oldest, newest): (i64, i64, Option<i64>, Option<i64>) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0), MIN(downloaded_at), MAX(downloaded_at)
         FROM wallpapers",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    let average_rating: Option<f64> = conn.query_row(
        "SELECT AVG(rating) FROM wallpapers WHERE rating > 0",
        [],
        |row| row.get(0),
    )?;

    let paths = conn
        .prepare("SELECT path FROM wallpapers")?
        .query_map([], |row| row.get::<_, String>(0).map(PathBuf::from))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let most_used = conn
        .prepare(
            "SELECT id, path, use_count FROM wallpapers \
             ORDER BY use_count DESC, id ASC LIMIT ?",
        )?
        .query_map([MOST_USED_LIMIT as i64], |row| {
            Ok(UsageCount {
                id: row.get(0)?,
                path: PathBuf::from(row.get::<_, String>(1)?),
                use_count: row.get::<_, i64>(2)?.max(0) as u32,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let top_tags = conn
        .prepare(
            "SELECT tag, COUNT(*) AS n FROM wallpaper_tags
             GROUP BY tag ORDER BY n DESC, tag ASC LIMIT ?",
        )?
        .query_map([TOP_TAGS_LIMIT as i64], |row| {
            Ok(TagCount {
                tag: row.get(0)?,
                count: row.get::<_, i64>(1)?.max(0) as usize,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let resolutions = conn
        .prepare(
            "SELECT COALESCE(resolution, 'unknown') AS r, COUNT(*) AS n FROM wallpapers
             GROUP BY r ORDER BY n DESC, r ASC LIMIT ?",
        )?
        .query_map([RESOLUTION_LIMIT as i64], |row| {
            Ok(ResolutionCount {
                resolution: row.get(0)?,
                count: row.get::<_, i64>(1)?.max(0) as usize,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let active_since = "SELECT COUNT(DISTINCT wallpaper_id) FROM usage_history WHERE used_at > ?";
    let week = count(conn, active_since, [to_micros(now - Duration::days(WEEK_DAYS))])?;
    let month = count(conn, active_since, [to_micros(now - Duration::days(MONTH_DAYS))])?;

    Ok(Aggregates {
        total: total.max(0) as usize,
        size: size.max(0) as u64,
        oldest,
        newest,
        favorites: count(conn, "SELECT COUNT(*) FROM wallpapers WHERE is_favorite = 1", [])?,
        average_rating,
        paths,
        most_used,
        top_tags,
        resolutions,
        week,
        month,
        history_entries: count(conn, "SELECT COUNT(*) FROM usage_history", [])?,
    })
}
