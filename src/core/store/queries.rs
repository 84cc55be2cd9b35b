//! Row-level operations shared by the store, navigator, eviction engine and
//! curator.
//!
//! Every function takes a plain `&Connection` so callers can compose several
//! of them inside one transaction.

use super::{RecordQuery, WallpaperRecord, MAX_RATING};
use crate::core::clock::{from_micros, to_micros};
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Column list matching [`record_from_row`], for a table aliased as `w`
pub(crate) const RECORD_COLUMNS: &str = "w.id, w.path, w.source_url, w.content_hash, \
     w.size_bytes, w.downloaded_at, w.last_used_at, w.use_count, w.categories, w.purity, \
     w.resolution, w.is_favorite, w.rating";

/// Build a record from a row selected with [`RECORD_COLUMNS`]. Tags are left empty.
pub(crate) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<WallpaperRecord> {
    Ok(WallpaperRecord {
        id: row.get(0)?,
        local_path: PathBuf::from(row.get::<_, String>(1)?),
        source_url: row.get(2)?,
        content_hash: row.get(3)?,
        size_bytes: row.get::<_, i64>(4)?.max(0) as u64,
        downloaded_at: from_micros(row.get(5)?),
        last_used_at: from_micros(row.get(6)?),
        use_count: row.get::<_, i64>(7)?.max(1) as u32,
        categories: row.get(8)?,
        purity: row.get(9)?,
        resolution: row.get(10)?,
        is_favorite: row.get(11)?,
        rating: row.get::<_, i64>(12)?.clamp(0, MAX_RATING as i64) as u8,
        tags: BTreeSet::new(),
    })
}

pub(crate) fn load_tags(conn: &Connection, id: &str) -> Result<BTreeSet<String>, CacheError> {
    let mut stmt =
        conn.prepare_cached("SELECT tag FROM wallpaper_tags WHERE wallpaper_id = ? ORDER BY tag")?;
    let tags = stmt
        .query_map([id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;
    Ok(tags)
}

pub(crate) fn exists(conn: &Connection, id: &str) -> Result<bool, CacheError> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM wallpapers WHERE id = ?)",
        [id],
        |row| row.get(0),
    )?;
    Ok(found)
}

pub(crate) fn fetch_record(
    conn: &Connection,
    id: &str,
) -> Result<Option<WallpaperRecord>, CacheError> {
    let record = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM wallpapers w WHERE w.id = ?"),
            [id],
            record_from_row,
        )
        .optional()?;

    match record {
        Some(mut record) => {
            record.tags = load_tags(conn, &record.id)?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

pub(crate) fn require_record(conn: &Connection, id: &str) -> Result<WallpaperRecord, CacheError> {
    fetch_record(conn, id)?.ok_or_else(|| CacheError::not_found(id))
}

fn validate(record: &WallpaperRecord) -> Result<(), CacheError> {
    if record.id.is_empty() {
        return Err(CacheError::invalid("id", "must not be empty"));
    }
    if record.rating > MAX_RATING {
        return Err(CacheError::invalid(
            "rating",
            format!("must be between 0 and {MAX_RATING}, got {}", record.rating),
        ));
    }
    if record.use_count < 1 {
        return Err(CacheError::invalid("use_count", "must be at least 1"));
    }
    Ok(())
}

fn replace_tags(conn: &Connection, record: &WallpaperRecord) -> Result<(), CacheError> {
    conn.execute(
        "DELETE FROM wallpaper_tags WHERE wallpaper_id = ?",
        [&record.id],
    )?;
    let mut stmt =
        conn.prepare_cached("INSERT INTO wallpaper_tags (wallpaper_id, tag) VALUES (?, ?)")?;
    for tag in &record.tags {
        stmt.execute(params![record.id, tag])?;
    }
    Ok(())
}

pub(crate) fn insert_record(conn: &Connection, record: &WallpaperRecord) -> Result<(), CacheError> {
    validate(record)?;
    if exists(conn, &record.id)? {
        return Err(CacheError::DuplicateId {
            id: record.id.clone(),
        });
    }

    conn.execute(
        "INSERT INTO wallpapers
         (id, path, source_url, content_hash, size_bytes, downloaded_at, last_used_at,
          use_count, categories, purity, resolution, is_favorite, rating)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            record.id,
            record.local_path.to_string_lossy(),
            record.source_url,
            record.content_hash,
            record.size_bytes as i64,
            to_micros(record.downloaded_at),
            to_micros(record.last_used_at),
            record.use_count as i64,
            record.categories,
            record.purity,
            record.resolution,
            record.is_favorite,
            record.rating as i64,
        ],
    )?;
    replace_tags(conn, record)
}

/// Overwrite the mutable columns and tags of an existing record
pub(crate) fn write_record(conn: &Connection, record: &WallpaperRecord) -> Result<(), CacheError> {
    validate(record)?;
    let changed = conn.execute(
        "UPDATE wallpapers
         SET path = ?, source_url = ?, content_hash = ?, size_bytes = ?, last_used_at = ?,
             use_count = ?, categories = ?, purity = ?, resolution = ?, is_favorite = ?,
             rating = ?
         WHERE id = ?",
        params![
            record.local_path.to_string_lossy(),
            record.source_url,
            record.content_hash,
            record.size_bytes as i64,
            to_micros(record.last_used_at),
            record.use_count as i64,
            record.categories,
            record.purity,
            record.resolution,
            record.is_favorite,
            record.rating as i64,
            record.id,
        ],
    )?;
    if changed == 0 {
        return Err(CacheError::not_found(&record.id));
    }
    replace_tags(conn, record)
}

/// Delete a record; tags, usage events and the view pointer follow via the schema
pub(crate) fn delete_record(conn: &Connection, id: &str) -> Result<bool, CacheError> {
    let deleted = conn.execute("DELETE FROM wallpapers WHERE id = ?", [id])?;
    Ok(deleted > 0)
}

pub(crate) fn append_usage(
    conn: &Connection,
    id: &str,
    used_at: DateTime<Utc>,
) -> Result<(), CacheError> {
    if !exists(conn, id)? {
        return Err(CacheError::not_found(id));
    }
    conn.execute(
        "INSERT INTO usage_history (wallpaper_id, used_at) VALUES (?, ?)",
        params![id, to_micros(used_at)],
    )?;
    Ok(())
}

pub(crate) fn set_view_pointer(
    conn: &Connection,
    id: &str,
    updated_at: DateTime<Utc>,
) -> Result<(), CacheError> {
    if !exists(conn, id)? {
        return Err(CacheError::not_found(id));
    }
    conn.execute(
        "INSERT INTO view_state (id, current_wallpaper_id, updated_at)
         VALUES (1, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             current_wallpaper_id = excluded.current_wallpaper_id,
             updated_at = excluded.updated_at",
        params![id, to_micros(updated_at)],
    )?;
    Ok(())
}

pub(crate) fn view_pointer(conn: &Connection) -> Result<Option<String>, CacheError> {
    let id: Option<Option<String>> = conn
        .query_row(
            "SELECT current_wallpaper_id FROM view_state WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.flatten().filter(|id| !id.is_empty()))
}

pub(crate) fn select_records(
    conn: &Connection,
    query: &RecordQuery,
) -> Result<Vec<WallpaperRecord>, CacheError> {
    let (tail, values) = query.to_sql();
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM wallpapers w{tail}"
    ))?;
    let mut records = stmt
        .query_map(params_from_iter(values.iter()), record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for record in &mut records {
        record.tags = load_tags(conn, &record.id)?;
    }
    Ok(records)
}

/// Entry count and total byte size
pub(crate) fn totals(conn: &Connection) -> Result<(usize, u64), CacheError> {
    let (count, size): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM wallpapers",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((count.max(0) as usize, size.max(0) as u64))
}

/// Usage timestamps of one wallpaper, newest first
pub(crate) fn usage_history(
    conn: &Connection,
    id: &str,
    limit: Option<usize>,
) -> Result<Vec<DateTime<Utc>>, CacheError> {
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let mut stmt = conn.prepare_cached(
        "SELECT used_at FROM usage_history WHERE wallpaper_id = ?
         ORDER BY used_at DESC, id DESC LIMIT ?",
    )?;
    let stamps = stmt
        .query_map(params![id, limit], |row| row.get::<_, i64>(0))?
        .map(|r| r.map(from_micros))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(stamps)
}

/// Latest usage timestamp on record, used to seed the stamp issuer
pub(crate) fn latest_stamp(conn: &Connection) -> Result<Option<i64>, CacheError> {
    let latest: Option<i64> = conn.query_row(
        "SELECT MAX(m) FROM (
             SELECT MAX(used_at) AS m FROM usage_history
             UNION ALL SELECT MAX(last_used_at) FROM wallpapers
         )",
        [],
        |row| row.get(0),
    )?;
    Ok(latest)
}
