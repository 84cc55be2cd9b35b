//! Cursor over distinct wallpapers ordered by their last usage.

use super::types::{Direction, HistoryEntry};
use crate::core::clock::from_micros;
use crate::core::store::queries::{self, RECORD_COLUMNS};
use crate::core::store::{Store, WallpaperRecord};
use crate::error::CacheError;
use rusqlite::{Connection, OptionalExtension, ToSql};
use tracing::debug;

/// Used when a non-positive history limit is requested
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Every wallpaper with at least one usage event, paired with its `last_seen`
const TIMELINE: &str = "FROM wallpapers w
     JOIN (SELECT wallpaper_id, MAX(used_at) AS last_seen
           FROM usage_history GROUP BY wallpaper_id) h
       ON h.wallpaper_id = w.id";

/// Reads the usage timeline from a [`Store`]
pub struct HistoryNavigator<'a> {
    store: &'a Store,
}

impl<'a> HistoryNavigator<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// The most recently used wallpaper
    pub fn current(&self) -> Result<Option<WallpaperRecord>, CacheError> {
        self.store
            .read(|conn| first(walk(conn, Walk::newest_first(), 0, 1)?))
    }

    /// Step back from the view pointer.
    ///
    /// Without a pointer the newest wallpaper is taken to be on screen, so
    /// the second newest is returned.
    pub fn previous(&self) -> Result<Option<WallpaperRecord>, CacheError> {
        self.step(Direction::Previous)
    }

    /// Step forward from the view pointer, or behave like [`Self::current`]
    /// when no pointer is set.
    pub fn next(&self) -> Result<Option<WallpaperRecord>, CacheError> {
        self.step(Direction::Next)
    }

    pub fn step(&self, direction: Direction) -> Result<Option<WallpaperRecord>, CacheError> {
        self.store.read(|conn| {
            let entries = match (anchor(conn)?, direction) {
                (None, Direction::Previous) => walk(conn, Walk::newest_first(), 1, 1)?,
                (None, Direction::Next) => walk(conn, Walk::newest_first(), 0, 1)?,
                (Some(anchor), direction) => {
                    walk(conn, Walk::from_anchor(&anchor, direction), 0, 1)?
                }
            };
            debug!(
                direction = direction.as_str(),
                found = entries.first().map(|e| e.id()).unwrap_or(""),
                "History step"
            );
            first(entries)
        })
    }

    /// A wallpaper by id, hidden when its file is missing
    pub fn by_id(&self, id: &str) -> Result<Option<WallpaperRecord>, CacheError> {
        let record = self.store.find(id)?;
        Ok(record.filter(WallpaperRecord::file_exists))
    }

    /// Distinct wallpapers, most recent first. `limit <= 0` means
    /// [`DEFAULT_HISTORY_LIMIT`].
    pub fn history(&self, limit: i64) -> Result<Vec<HistoryEntry>, CacheError> {
        let limit = if limit <= 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            limit as usize
        };
        self.store
            .read(|conn| walk(conn, Walk::newest_first(), 0, limit))
    }
}

/// The pointed-at wallpaper and its `last_seen`
struct Anchor {
    id: String,
    last_seen: i64,
}

fn anchor(conn: &Connection) -> Result<Option<Anchor>, CacheError> {
    let Some(id) = queries::view_pointer(conn)? else {
        return Ok(None);
    };
    let last_seen: Option<i64> = conn
        .query_row(
            "SELECT MAX(used_at) FROM usage_history WHERE wallpaper_id = ?",
            [&id],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    // a pointer at a wallpaper that was never used has no position
    Ok(last_seen.map(|last_seen| Anchor { id, last_seen }))
}

/// One directional scan of the timeline
struct Walk<'p> {
    condition: &'static str,
    descending: bool,
    params: Vec<&'p dyn ToSql>,
}

impl<'p> Walk<'p> {
    fn newest_first() -> Self {
        Self {
            condition: "",
            descending: true,
            params: Vec::new(),
        }
    }

    /// Positions strictly past the anchor, nearest first.
    /// `(last_seen, id)` is compared as a tuple so ties stay ordered.
    fn from_anchor(anchor: &'p Anchor, direction: Direction) -> Self {
        let (condition, descending) = match direction {
            Direction::Next => (
                " WHERE h.last_seen > ?1 OR (h.last_seen = ?1 AND w.id > ?2)",
                false,
            ),
            Direction::Previous => (
                " WHERE h.last_seen < ?1 OR (h.last_seen = ?1 AND w.id < ?2)",
                true,
            ),
        };
        Self {
            condition,
            descending,
            params: vec![&anchor.last_seen as &dyn ToSql, &anchor.id],
        }
    }

    fn sql(&self) -> String {
        let dir = if self.descending { "DESC" } else { "ASC" };
        format!(
            "SELECT {RECORD_COLUMNS}, h.last_seen {TIMELINE}{} \
             ORDER BY h.last_seen {dir}, w.id {dir}",
            self.condition
        )
    }
}

/// Collect `take` entries with a file on disk, after passing over `skip` of them
fn walk(
    conn: &Connection,
    scan: Walk<'_>,
    skip: usize,
    take: usize,
) -> Result<Vec<HistoryEntry>, CacheError> {
    let mut stmt = conn.prepare(&scan.sql())?;
    let mut rows = stmt.query(scan.params.as_slice())?;
    let mut entries = Vec::new();
    let mut skipped = 0;

    while entries.len() < take {
        let Some(row) = rows.next()? else {
            break;
        };
        let record = queries::record_from_row(row)?;
        if !record.file_exists() {
            debug!(
                id = %record.id,
                path = %record.local_path.display(),
                "Skipping stale history entry"
            );
            continue;
        }
        if skipped < skip {
            skipped += 1;
            continue;
        }
        let last_seen = from_micros(row.get(13)?);
        entries.push(HistoryEntry { record, last_seen });
    }
    drop(rows);

    for entry in &mut entries {
        entry.record.tags = queries::load_tags(conn, &entry.record.id)?;
    }
    Ok(entries)
}

fn first(entries: Vec<HistoryEntry>) -> Result<Option<WallpaperRecord>, CacheError> {
    Ok(entries.into_iter().next().map(WallpaperRecord::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        store: Store,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = Store::open(&dir.path().join("wallpapers.db")).unwrap();
            Self { dir, store }
        }

        /// Insert a record and its first usage event
        fn add(&self, id: &str) {
            let at = self.store.stamp();
            self.add_at(id, at);
        }

        fn add_at(&self, id: &str, at: DateTime<Utc>) {
            let path = self.dir.path().join(format!("{id}.jpg"));
            std::fs::write(&path, id.as_bytes()).unwrap();
            let record = WallpaperRecord {
                id: id.to_string(),
                local_path: path,
                source_url: format!("https://example.invalid/{id}"),
                content_hash: format!("hash-{id}"),
                size_bytes: 1,
                downloaded_at: at,
                last_used_at: at,
                use_count: 1,
                categories: "111".to_string(),
                purity: "100".to_string(),
                resolution: None,
                is_favorite: false,
                rating: 0,
                tags: BTreeSet::new(),
            };
            self.store.insert(&record).unwrap();
            self.store.append_usage(id, at).unwrap();
        }

        fn use_again(&self, id: &str) {
            self.store.append_usage(id, self.store.stamp()).unwrap();
        }

        fn nav(&self) -> HistoryNavigator<'_> {
            HistoryNavigator::new(&self.store)
        }
    }

    fn id(record: Option<WallpaperRecord>) -> Option<String> {
        record.map(|r| r.id)
    }

    #[test]
    fn empty_history_navigates_to_nothing() {
        let fx = Fixture::new();

        assert!(fx.nav().current().unwrap().is_none());
        assert!(fx.nav().previous().unwrap().is_none());
        assert!(fx.nav().next().unwrap().is_none());
        assert!(fx.nav().history(0).unwrap().is_empty());
    }

    #[test]
    fn current_and_previous_without_pointer() {
        let fx = Fixture::new();
        fx.add("a");
        fx.add("b");
        fx.add("c");

        assert_eq!(id(fx.nav().current().unwrap()).as_deref(), Some("c"));
        assert_eq!(id(fx.nav().previous().unwrap()).as_deref(), Some("b"));
        assert_eq!(id(fx.nav().next().unwrap()).as_deref(), Some("c"));
    }

    #[test]
    fn steps_are_relative_to_the_pointer() {
        let fx = Fixture::new();
        fx.add("a");
        fx.add("b");
        fx.add("c");
        fx.store.set_view_pointer("b").unwrap();

        assert_eq!(id(fx.nav().next().unwrap()).as_deref(), Some("c"));
        assert_eq!(id(fx.nav().previous().unwrap()).as_deref(), Some("a"));
    }

    #[test]
    fn stepping_past_either_end_finds_nothing() {
        let fx = Fixture::new();
        fx.add("a");
        fx.add("b");

        fx.store.set_view_pointer("b").unwrap();
        assert!(fx.nav().next().unwrap().is_none());

        fx.store.set_view_pointer("a").unwrap();
        assert!(fx.nav().previous().unwrap().is_none());
    }

    #[test]
    fn reuse_promotes_to_current() {
        let fx = Fixture::new();
        fx.add("a");
        fx.add("b");
        fx.add("c");
        fx.use_again("a");

        assert_eq!(id(fx.nav().current().unwrap()).as_deref(), Some("a"));
        assert_eq!(id(fx.nav().previous().unwrap()).as_deref(), Some("c"));

        let order: Vec<_> = fx
            .nav()
            .history(10)
            .unwrap()
            .into_iter()
            .map(|e| e.record.id)
            .collect();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    #[test]
    fn stale_entries_are_skipped() {
        let fx = Fixture::new();
        fx.add("a");
        fx.add("b");
        fx.add("c");
        std::fs::remove_file(fx.dir.path().join("c.jpg")).unwrap();
        std::fs::remove_file(fx.dir.path().join("b.jpg")).unwrap();

        assert_eq!(id(fx.nav().current().unwrap()).as_deref(), Some("a"));
        assert!(fx.nav().by_id("b").unwrap().is_none());
        assert_eq!(fx.nav().history(0).unwrap().len(), 1);

        fx.store.set_view_pointer("a").unwrap();
        assert!(fx.nav().next().unwrap().is_none());
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let fx = Fixture::new();
        let at = Utc::now();
        fx.add_at("x", at);
        fx.add_at("y", at);

        assert_eq!(id(fx.nav().current().unwrap()).as_deref(), Some("y"));

        fx.store.set_view_pointer("x").unwrap();
        assert_eq!(id(fx.nav().next().unwrap()).as_deref(), Some("y"));
        fx.store.set_view_pointer("y").unwrap();
        assert_eq!(id(fx.nav().previous().unwrap()).as_deref(), Some("x"));
    }

    #[test]
    fn history_respects_limit_and_default() {
        let fx = Fixture::new();
        for i in 0..55 {
            fx.add(&format!("w{i:02}"));
        }

        assert_eq!(fx.nav().history(3).unwrap().len(), 3);
        assert_eq!(fx.nav().history(0).unwrap().len(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(fx.nav().history(-1).unwrap().len(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(fx.nav().history(3).unwrap()[0].id(), "w54");
    }

    #[test]
    fn history_entries_carry_last_seen() {
        let fx = Fixture::new();
        fx.add("a");
        fx.use_again("a");

        let entries = fx.nav().history(1).unwrap();
        let latest = fx.store.usage_history("a", Some(1)).unwrap()[0];
        assert_eq!(entries[0].last_seen, latest);
    }
}
