//! Bringing remote wallpapers into the cache.

use super::{pick_random, Fetcher, RemoteWallpaper, SearchCriteria, SearchFacets};
use crate::core::cache::WallpaperCache;
use crate::core::hasher::{hash_file, wallpaper_id};
use crate::core::store::WallpaperRecord;
use crate::error::{CacheError, FetchError, Result};
use crate::events::CacheEvent;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How a remote wallpaper ended up in the cache
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Newly downloaded and added
    Downloaded(WallpaperRecord),
    /// The file was already in the download directory without a usable
    /// record, and was added as is
    Adopted(WallpaperRecord),
    /// Already cached; counted as used again
    Existing(WallpaperRecord),
    /// Same bytes as a cached wallpaper. The new file was deleted and the
    /// existing record counted as used.
    Duplicate {
        existing: WallpaperRecord,
        discarded: PathBuf,
    },
}

impl IngestOutcome {
    /// The record now standing for the wallpaper
    pub fn record(&self) -> &WallpaperRecord {
        match self {
            IngestOutcome::Downloaded(r)
            | IngestOutcome::Adopted(r)
            | IngestOutcome::Existing(r) => r,
            IngestOutcome::Duplicate { existing, .. } => existing,
        }
    }
}

/// Downloads through a [`Fetcher`] into a [`WallpaperCache`]
pub struct Ingestor<'a> {
    cache: &'a WallpaperCache,
    fetcher: &'a dyn Fetcher,
    download_dir: PathBuf,
    facets: SearchFacets,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        cache: &'a WallpaperCache,
        fetcher: &'a dyn Fetcher,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            download_dir: download_dir.into(),
            facets: SearchFacets::default(),
        }
    }

    /// Facets recorded on newly added wallpapers
    pub fn facets(mut self, facets: SearchFacets) -> Self {
        self.facets = facets;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Search, pick one result at random and ingest it
    pub fn search_and_ingest(&self, criteria: &SearchCriteria) -> Result<IngestOutcome> {
        let results = self.fetcher.search(criteria)?;
        debug!(count = results.len(), "Search returned results");
        let item = pick_random(&results).ok_or(FetchError::NoResults)?;
        self.ingest(item)
    }

    /// Make `item` the most recently used wallpaper, downloading it only if
    /// the cache does not already hold it
    pub fn ingest(&self, item: &RemoteWallpaper) -> Result<IngestOutcome> {
        let id = wallpaper_id(&item.path);

        if let Some(record) = self.cache.find_record(&id)? {
            if record.file_exists() {
                info!(id, "Wallpaper already cached");
                return Ok(IngestOutcome::Existing(self.cache.mark_as_used(&id)?));
            }
            self.cache.forget(&id)?;
        }

        let target = self.download_dir.join(item.file_name());
        let adopted = target.is_file();
        let file = if adopted {
            debug!(path = %target.display(), "Reusing file already on disk");
            target
        } else {
            fs::create_dir_all(&self.download_dir)
                .map_err(|e| CacheError::file_system(&self.download_dir, e))?;
            self.fetcher.download(item, &self.download_dir)?
        };

        let digest = hash_file(&file)?;
        if let Some(existing) = self.cache.find_duplicate(&digest.hex)? {
            if existing.local_path != file {
                fs::remove_file(&file).map_err(|e| CacheError::file_system(&file, e))?;
                info!(
                    existing = %existing.id,
                    discarded = %file.display(),
                    "Duplicate content, reusing cached wallpaper"
                );
                self.cache.emit(CacheEvent::DuplicateDetected {
                    existing_id: existing.id.clone(),
                    discarded_path: file.clone(),
                });
                let existing = self.cache.mark_as_used(&existing.id)?;
                return Ok(IngestOutcome::Duplicate {
                    existing,
                    discarded: file,
                });
            }
        }

        let record = self
            .cache
            .add_wallpaper_with_digest(&item.path, &file, &self.facets, digest)?;
        Ok(if adopted {
            IngestOutcome::Adopted(record)
        } else {
            IngestOutcome::Downloaded(record)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::CacheConfig;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves fixed bytes per URL and counts downloads
    struct FakeFetcher {
        files: HashMap<String, Vec<u8>>,
        downloads: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(files: &[(&str, &[u8])]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(url, bytes)| (url.to_string(), bytes.to_vec()))
                    .collect(),
                downloads: AtomicUsize::new(0),
            }
        }

        fn downloads(&self) -> usize {
            self.downloads.load(Ordering::SeqCst)
        }
    }

    impl Fetcher for FakeFetcher {
        fn search(
            &self,
            _criteria: &SearchCriteria,
        ) -> std::result::Result<Vec<RemoteWallpaper>, FetchError> {
            let mut urls: Vec<_> = self.files.keys().cloned().collect();
            urls.sort();
            Ok(urls.into_iter().map(RemoteWallpaper::new).collect())
        }

        fn download(
            &self,
            item: &RemoteWallpaper,
            dir: &Path,
        ) -> std::result::Result<PathBuf, FetchError> {
            let bytes = self.files.get(&item.path).ok_or_else(|| FetchError::Download {
                url: item.path.clone(),
                reason: "404".to_string(),
            })?;
            let path = dir.join(item.file_name());
            fs::write(&path, bytes).map_err(|e| FetchError::Download {
                url: item.path.clone(),
                reason: e.to_string(),
            })?;
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Ok(path)
        }
    }

    const A: &str = "https://w.wallhaven.cc/full/aa/wallhaven-aa.jpg";
    const B: &str = "https://w.wallhaven.cc/full/bb/wallhaven-bb.jpg";

    struct Fixture {
        dir: TempDir,
        cache: WallpaperCache,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let cache =
                WallpaperCache::open(CacheConfig::new().db_path(dir.path().join("wallpapers.db")))
                    .unwrap();
            Self { dir, cache }
        }

        fn walls(&self) -> PathBuf {
            self.dir.path().join("walls")
        }
    }

    #[test]
    fn first_ingest_downloads_then_reuses() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(&[(A, b"aaaa")]);
        let ingestor = Ingestor::new(&fx.cache, &fetcher, fx.walls());

        let first = ingestor.ingest(&RemoteWallpaper::new(A)).unwrap();
        assert!(matches!(first, IngestOutcome::Downloaded(_)));
        assert_eq!(first.record().use_count, 1);

        let second = ingestor.ingest(&RemoteWallpaper::new(A)).unwrap();
        assert!(matches!(second, IngestOutcome::Existing(_)));
        assert_eq!(second.record().use_count, 2);
        assert_eq!(fetcher.downloads(), 1);
    }

    #[test]
    fn duplicate_content_is_folded_onto_existing() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(&[(A, b"same"), (B, b"same")]);
        let ingestor = Ingestor::new(&fx.cache, &fetcher, fx.walls());

        let original = ingestor.ingest(&RemoteWallpaper::new(A)).unwrap();
        let outcome = ingestor.ingest(&RemoteWallpaper::new(B)).unwrap();

        match outcome {
            IngestOutcome::Duplicate { existing, discarded } => {
                assert_eq!(existing.id, original.record().id);
                assert_eq!(existing.use_count, 2);
                assert!(!discarded.exists());
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert!(fx.cache.find_record(&wallpaper_id(B)).unwrap().is_none());
    }

    #[test]
    fn file_on_disk_is_adopted_without_download() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.walls()).unwrap();
        fs::write(fx.walls().join("wallhaven-aa.jpg"), b"aaaa").unwrap();
        let fetcher = FakeFetcher::new(&[(A, b"aaaa")]);
        let ingestor = Ingestor::new(&fx.cache, &fetcher, fx.walls());

        let outcome = ingestor.ingest(&RemoteWallpaper::new(A)).unwrap();

        assert!(matches!(outcome, IngestOutcome::Adopted(_)));
        assert_eq!(fetcher.downloads(), 0);
    }

    #[test]
    fn stale_record_is_replaced() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(&[(A, b"aaaa")]);
        let ingestor = Ingestor::new(&fx.cache, &fetcher, fx.walls());
        let first = ingestor.ingest(&RemoteWallpaper::new(A)).unwrap();
        fs::remove_file(&first.record().local_path).unwrap();

        let outcome = ingestor.ingest(&RemoteWallpaper::new(A)).unwrap();

        assert!(matches!(outcome, IngestOutcome::Downloaded(_)));
        assert_eq!(outcome.record().use_count, 1);
        assert_eq!(fetcher.downloads(), 2);
    }

    #[test]
    fn empty_search_is_no_results() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(&[]);
        let ingestor = Ingestor::new(&fx.cache, &fetcher, fx.walls());

        let err = ingestor.search_and_ingest(&SearchCriteria::default()).unwrap_err();
        assert!(matches!(err, crate::error::AppError::Fetch(FetchError::NoResults)));
    }

    #[test]
    fn search_and_ingest_adds_a_result() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::new(&[(A, b"aaaa")]);
        let ingestor = Ingestor::new(&fx.cache, &fetcher, fx.walls())
            .facets(SearchFacets::new("100", "100"));

        let outcome = ingestor.search_and_ingest(&SearchCriteria::default()).unwrap();

        assert_eq!(outcome.record().source_url, A);
        assert_eq!(outcome.record().categories, "100");
        assert_eq!(
            fx.cache.get_current().unwrap().map(|r| r.id),
            Some(wallpaper_id(A))
        );
    }
}
