//! # Cache Module
//!
//! The [`WallpaperCache`] facade: the single public contract over the store,
//! history navigation, eviction and curation.
//!
//! ## Add path
//! `add_wallpaper` hashes the file and probes its resolution, then inserts
//! the record together with its first usage event in one write. The write
//! lock is released before eviction runs, which takes its own short writes.
//! That pass spares the new wallpaper, so the returned record always has its
//! file on disk even when every older entry is a favorite.
//!
//! ## Validity
//! Every list and lookup re-checks that the backing file exists at call
//! time. Records with missing files are hidden until
//! `cleanup_invalid_entries` drops them.
//!
//! ## Example
//! ```rust,ignore
//! use wallpaper_cache::{CacheConfig, SearchFacets, WallpaperCache};
//!
//! let cache = WallpaperCache::open(CacheConfig::new())?;
//! let record = cache.add_wallpaper(url, &path, &SearchFacets::default())?;
//! cache.set_current_view(&record.id)?;
//! ```

mod config;

pub use config::{default_db_path, default_download_dir, CacheConfig};

use crate::core::clock::{Clock, SystemClock};
use crate::core::curator::{CacheStatistics, CuratorOps};
use crate::core::eviction::{CacheLimits, EvictionEngine};
use crate::core::fetcher::SearchFacets;
use crate::core::hasher::{hash_file, wallpaper_id, ContentDigest};
use crate::core::history::{HistoryEntry, HistoryNavigator};
use crate::core::metadata::probe_resolution;
use crate::core::store::{
    queries, RecordFilter, RecordOrder, RecordQuery, Store, WallpaperRecord,
};
use crate::error::CacheError;
use crate::events::{null_sender, CacheEvent, EventSender, EvictionSummary};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Local wallpaper cache
pub struct WallpaperCache {
    store: Store,
    limits: CacheLimits,
    events: EventSender,
}

impl WallpaperCache {
    /// Open or create the cache described by `config`
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        Self::open_with_clock(config, Box::new(SystemClock))
    }

    /// Open with an explicit time source
    pub fn open_with_clock(
        config: CacheConfig,
        clock: Box<dyn Clock>,
    ) -> Result<Self, CacheError> {
        let limits = config.limits()?;
        let store = Store::open_with_clock(config.path(), clock)?;
        info!(path = %config.path().display(), "Opened wallpaper cache");
        Ok(Self {
            store,
            limits,
            events: null_sender(),
        })
    }

    /// Report cache activity to `events`
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    pub fn db_path(&self) -> &Path {
        self.store.path()
    }

    pub(crate) fn emit(&self, event: CacheEvent) {
        self.events.send(event);
    }

    // ---- add / update ----

    /// Record a newly downloaded file and count it as shown once.
    ///
    /// Fails with `DuplicateId` if `source_url` is already cached. The
    /// eviction pass that follows never removes the wallpaper just added.
    pub fn add_wallpaper(
        &self,
        source_url: &str,
        local_path: &Path,
        facets: &SearchFacets,
    ) -> Result<WallpaperRecord, CacheError> {
        let digest = hash_file(local_path)?;
        self.add_wallpaper_with_digest(source_url, local_path, facets, digest)
    }

    /// [`add_wallpaper`](Self::add_wallpaper) for a file the caller already
    /// hashed, e.g. to check it for duplicates first
    pub fn add_wallpaper_with_digest(
        &self,
        source_url: &str,
        local_path: &Path,
        facets: &SearchFacets,
        digest: ContentDigest,
    ) -> Result<WallpaperRecord, CacheError> {
        let resolution = probe_resolution(local_path).map(|r| r.to_string());
        let now = self.store.stamp();
        let record = WallpaperRecord {
            id: wallpaper_id(source_url),
            local_path: local_path.to_path_buf(),
            source_url: source_url.to_string(),
            content_hash: digest.hex,
            size_bytes: digest.size_bytes,
            downloaded_at: now,
            last_used_at: now,
            use_count: 1,
            categories: facets.categories.clone(),
            purity: facets.purity.clone(),
            resolution,
            is_favorite: false,
            rating: 0,
            tags: BTreeSet::new(),
        };

        self.store.write(|conn| {
            queries::insert_record(conn, &record)?;
            queries::append_usage(conn, &record.id, now)
        })?;
        info!(
            id = %record.id,
            path = %record.local_path.display(),
            "Added wallpaper to cache"
        );
        self.emit(CacheEvent::Added {
            id: record.id.clone(),
            path: record.local_path.clone(),
        });

        // insert lock is released; eviction takes its own
        EvictionEngine::new(&self.store, self.limits, &self.events)
            .sparing(&record.id)
            .enforce()?;
        Ok(record)
    }

    /// Count another showing: bump the use count, move `last_used_at`
    /// forward and append a usage event, atomically.
    pub fn mark_as_used(&self, id: &str) -> Result<WallpaperRecord, CacheError> {
        let now = self.store.stamp();
        let record = self.store.write(|conn| {
            let mut record = queries::require_record(conn, id)?;
            record.use_count = record.use_count.saturating_add(1);
            record.last_used_at = now;
            queries::write_record(conn, &record)?;
            queries::append_usage(conn, id, now)?;
            Ok(record)
        })?;
        debug!(id, use_count = record.use_count, "Marked wallpaper as used");
        self.emit(CacheEvent::Used {
            id: record.id.clone(),
            use_count: record.use_count,
        });
        Ok(record)
    }

    /// Remove a wallpaper and delete its file. File errors are returned.
    pub fn remove_wallpaper(&self, id: &str) -> Result<WallpaperRecord, CacheError> {
        let record = self.store.remove(id)?;
        info!(id, path = %record.local_path.display(), "Removed wallpaper");
        self.emit(CacheEvent::Removed {
            id: record.id.clone(),
            path: record.local_path.clone(),
        });
        Ok(record)
    }

    /// Records whose backing file is gone
    pub fn find_invalid_entries(&self) -> Result<Vec<WallpaperRecord>, CacheError> {
        let mut records = self.store.query_all(&RecordQuery::default())?;
        records.retain(|r| !r.file_exists());
        Ok(records)
    }

    /// Drop every record whose backing file is gone, leaving the rest alone
    pub fn cleanup_invalid_entries(&self) -> Result<Vec<WallpaperRecord>, CacheError> {
        let candidates = self.find_invalid_entries()?;
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let removed = self.store.write(|conn| {
            let mut removed = Vec::with_capacity(candidates.len());
            for record in candidates {
                // the file may have come back since the scan
                if record.file_exists() {
                    continue;
                }
                if queries::delete_record(conn, &record.id)? {
                    removed.push(record);
                }
            }
            Ok(removed)
        })?;

        info!(count = removed.len(), "Cleaned up invalid cache entries");
        self.emit(CacheEvent::InvalidEntriesPruned {
            count: removed.len(),
        });
        Ok(removed)
    }

    pub fn toggle_favorite(&self, id: &str) -> Result<bool, CacheError> {
        self.curator().toggle_favorite(id)
    }

    /// Rate 1-5
    pub fn set_rating(&self, id: &str, rating: u8) -> Result<(), CacheError> {
        self.curator().set_rating(id, rating)
    }

    pub fn add_tags<S: AsRef<str>>(
        &self,
        id: &str,
        tags: &[S],
    ) -> Result<BTreeSet<String>, CacheError> {
        self.curator().add_tags(id, tags)
    }

    pub fn remove_tags<S: AsRef<str>>(
        &self,
        id: &str,
        tags: &[S],
    ) -> Result<BTreeSet<String>, CacheError> {
        self.curator().remove_tags(id, tags)
    }

    // ---- reads ----

    /// Most recently used wallpaper
    pub fn get_current(&self) -> Result<Option<WallpaperRecord>, CacheError> {
        self.navigator().current()
    }

    pub fn get_previous(&self) -> Result<Option<WallpaperRecord>, CacheError> {
        self.navigator().previous()
    }

    pub fn get_next(&self) -> Result<Option<WallpaperRecord>, CacheError> {
        self.navigator().next()
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<WallpaperRecord>, CacheError> {
        self.navigator().by_id(id)
    }

    /// Distinct wallpapers, most recent first; `limit <= 0` uses the default of 50
    pub fn get_history(&self, limit: i64) -> Result<Vec<HistoryEntry>, CacheError> {
        self.navigator().history(limit)
    }

    /// An existing wallpaper with the same content fingerprint
    pub fn find_duplicate(
        &self,
        content_hash: &str,
    ) -> Result<Option<WallpaperRecord>, CacheError> {
        let matches = self.valid(RecordQuery::new(
            RecordFilter::all().content_hash(content_hash),
            RecordOrder::DownloadedAsc,
        ))?;
        Ok(matches.into_iter().next())
    }

    pub fn get_statistics(&self) -> Result<CacheStatistics, CacheError> {
        self.curator().statistics()
    }

    /// Wallpapers not used within `older_than`, least recently used first
    pub fn get_old_wallpapers(
        &self,
        older_than: Duration,
    ) -> Result<Vec<WallpaperRecord>, CacheError> {
        let cutoff = self.store.now() - older_than;
        self.valid(RecordQuery::new(
            RecordFilter::all().last_used_before(cutoff),
            RecordOrder::LastUsedAsc,
        ))
    }

    /// Wallpapers shown at most once, oldest download first
    pub fn get_unused_wallpapers(&self) -> Result<Vec<WallpaperRecord>, CacheError> {
        self.valid(RecordQuery::new(
            RecordFilter::all().max_use_count(1),
            RecordOrder::DownloadedAsc,
        ))
    }

    pub fn get_favorites(&self) -> Result<Vec<WallpaperRecord>, CacheError> {
        self.curator().favorites()
    }

    pub fn get_random_favorite(&self) -> Result<Option<WallpaperRecord>, CacheError> {
        self.curator().random_favorite()
    }

    pub fn get_by_rating(&self, min: u8) -> Result<Vec<WallpaperRecord>, CacheError> {
        self.curator().by_rating(min)
    }

    pub fn get_by_tags<S: AsRef<str>>(
        &self,
        tags: &[S],
    ) -> Result<Vec<WallpaperRecord>, CacheError> {
        self.curator().by_tags(tags)
    }

    /// Usage timestamps of one wallpaper, newest first
    pub fn get_usage_history(
        &self,
        id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<DateTime<Utc>>, CacheError> {
        self.store.usage_history(id, limit)
    }

    // ---- view pointer ----

    /// Anchor previous/next at `id`
    pub fn set_current_view(&self, id: &str) -> Result<(), CacheError> {
        self.store.set_view_pointer(id)?;
        debug!(id, "Set current view");
        Ok(())
    }

    pub fn get_current_view(&self) -> Result<Option<String>, CacheError> {
        self.store.view_pointer()
    }

    // ---- limits ----

    /// Evict least recently used non-favorites if a cap is exceeded
    pub fn enforce_cache_limits(&self) -> Result<EvictionSummary, CacheError> {
        EvictionEngine::new(&self.store, self.limits, &self.events).enforce()
    }

    // ---- internals ----

    /// Raw lookup that ignores file existence
    pub(crate) fn find_record(&self, id: &str) -> Result<Option<WallpaperRecord>, CacheError> {
        self.store.find(id)
    }

    /// Drop a record without touching any file
    pub(crate) fn forget(&self, id: &str) -> Result<bool, CacheError> {
        let forgotten = self.store.forget(id)?;
        if forgotten {
            warn!(id, "Dropped stale cache record");
        }
        Ok(forgotten)
    }

    fn navigator(&self) -> HistoryNavigator<'_> {
        HistoryNavigator::new(&self.store)
    }

    fn curator(&self) -> CuratorOps<'_> {
        CuratorOps::new(&self.store)
    }

    fn valid(&self, query: RecordQuery) -> Result<Vec<WallpaperRecord>, CacheError> {
        let mut records = self.store.query_all(&query)?;
        records.retain(WallpaperRecord::file_exists);
        Ok(records)
    }
}
