//! SQLite store with a single writer and a pool of snapshot readers.

use super::queries;
use super::schema;
use super::{RecordQuery, WallpaperRecord};
use crate::core::clock::{Clock, StampIssuer, SystemClock};
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

const READER_POOL_SIZE: usize = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent wallpaper store
///
/// Uses WAL (Write-Ahead Logging) mode so readers proceed while a write is
/// in flight and never see it half-applied.
pub struct Store {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
    stamps: StampIssuer,
    db_path: PathBuf,
}

impl Store {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        Self::open_with_clock(path, Box::new(SystemClock))
    }

    /// Open a store that takes its timestamps from `clock`
    pub fn open_with_clock(path: &Path, clock: Box<dyn Clock>) -> Result<Self, CacheError> {
        let open_failed = |reason: String| CacheError::OpenFailed {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| open_failed(e.to_string()))?;
            }
        }

        let writer = Connection::open(path).map_err(|e| open_failed(e.to_string()))?;
        writer
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| open_failed(e.to_string()))?;
        let mode: String = writer
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| open_failed(e.to_string()))?;
        writer
            .pragma_update(None, "foreign_keys", 1)
            .map_err(|e| open_failed(e.to_string()))?;
        writer
            .pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| open_failed(e.to_string()))?;
        schema::initialize(&writer).map_err(|e| open_failed(e.to_string()))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened wallpaper store");

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let reader = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| open_failed(e.to_string()))?;
            reader
                .busy_timeout(BUSY_TIMEOUT)
                .map_err(|e| open_failed(e.to_string()))?;
            readers.push(Mutex::new(reader));
        }

        let stamps = StampIssuer::new(clock);
        if let Some(latest) = queries::latest_stamp(&writer)? {
            stamps.observe(latest);
        }

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            next_reader: AtomicUsize::new(0),
            stamps,
            db_path: path.to_path_buf(),
        })
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Current time from the store's clock
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.stamps.now()
    }

    /// A timestamp strictly later than every one issued before
    pub(crate) fn stamp(&self) -> DateTime<Utc> {
        self.stamps.issue()
    }

    fn corrupted(&self) -> CacheError {
        CacheError::Corrupted {
            path: self.db_path.clone(),
        }
    }

    /// Run `f` against a committed snapshot
    pub(crate) fn read<T, F>(&self, f: F) -> Result<T, CacheError>
    where
        F: FnOnce(&Connection) -> Result<T, CacheError>,
    {
        let slot = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let mut conn = self.readers[slot].lock().map_err(|_| self.corrupted())?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Run `f` inside one immediate transaction under the writer lock.
    ///
    /// Nothing `f` does is visible to readers unless it returns `Ok`.
    pub(crate) fn write<T, F>(&self, f: F) -> Result<T, CacheError>
    where
        F: FnOnce(&Connection) -> Result<T, CacheError>,
    {
        let mut conn = self.writer.lock().map_err(|_| self.corrupted())?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Insert a new record; fails with `DuplicateId` if the id exists
    pub fn insert(&self, record: &WallpaperRecord) -> Result<(), CacheError> {
        self.write(|conn| queries::insert_record(conn, record))
    }

    pub fn get(&self, id: &str) -> Result<WallpaperRecord, CacheError> {
        self.read(|conn| queries::require_record(conn, id))
    }

    pub fn find(&self, id: &str) -> Result<Option<WallpaperRecord>, CacheError> {
        self.read(|conn| queries::fetch_record(conn, id))
    }

    /// Atomic read-modify-write of one record.
    ///
    /// The mutator may not change the id or lower the use count.
    pub fn update<F>(&self, id: &str, mutate: F) -> Result<WallpaperRecord, CacheError>
    where
        F: FnOnce(&mut WallpaperRecord),
    {
        self.write(|conn| {
            let before = queries::require_record(conn, id)?;
            let mut after = before.clone();
            mutate(&mut after);

            if after.id != before.id {
                return Err(CacheError::invalid("id", "cannot be changed by an update"));
            }
            if after.use_count < before.use_count {
                return Err(CacheError::invalid(
                    "use_count",
                    format!("cannot decrease from {} to {}", before.use_count, after.use_count),
                ));
            }

            queries::write_record(conn, &after)?;
            Ok(after)
        })
    }

    /// Delete a record and its backing file.
    ///
    /// The rows go first and the file is unlinked last, right before commit.
    /// A file that is already gone is fine. Any other file error rolls the
    /// rows back, so the record is kept.
    pub fn remove(&self, id: &str) -> Result<WallpaperRecord, CacheError> {
        self.write(|conn| {
            let record = queries::require_record(conn, id)?;
            queries::delete_record(conn, id)?;
            delete_backing_file(&record.local_path)
                .map_err(|e| CacheError::file_system(&record.local_path, e))?;
            Ok(record)
        })
    }

    /// Delete only the row, leaving any file alone
    pub(crate) fn forget(&self, id: &str) -> Result<bool, CacheError> {
        self.write(|conn| queries::delete_record(conn, id))
    }

    pub fn append_usage(&self, id: &str, used_at: DateTime<Utc>) -> Result<(), CacheError> {
        self.write(|conn| queries::append_usage(conn, id, used_at))
    }

    pub fn set_view_pointer(&self, id: &str) -> Result<(), CacheError> {
        let at = self.stamps.now();
        self.write(|conn| queries::set_view_pointer(conn, id, at))
    }

    /// The pointed-at id, if any
    pub fn view_pointer(&self) -> Result<Option<String>, CacheError> {
        self.read(queries::view_pointer)
    }

    /// Filtered, ordered scan
    pub fn query_all(&self, query: &RecordQuery) -> Result<Vec<WallpaperRecord>, CacheError> {
        self.read(|conn| queries::select_records(conn, query))
    }

    /// Usage timestamps of one wallpaper, newest first
    pub fn usage_history(
        &self,
        id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<DateTime<Utc>>, CacheError> {
        self.read(|conn| {
            if !queries::exists(conn, id)? {
                return Err(CacheError::not_found(id));
            }
            queries::usage_history(conn, id, limit)
        })
    }

    /// Entry count and total byte size
    pub fn totals(&self) -> Result<(usize, u64), CacheError> {
        self.read(queries::totals)
    }
}

/// Remove a file from disk. Returns `false` when it was already missing.
pub(crate) fn delete_backing_file(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
