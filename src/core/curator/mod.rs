//! # Curator Module
//!
//! User curation of cached wallpapers: favorites, star ratings and tags,
//! plus the queries and statistics built on them.
//!
//! ## Rules
//! - Ratings are 1-5; 0 only ever means "not rated yet".
//! - Tag changes are idempotent. Adding a tag twice or removing one that is
//!   not there succeeds without changing anything.
//! - Every query drops records whose file is no longer on disk.

mod stats;

pub use stats::{CacheStatistics, ResolutionCount, TagCount, UsageCount};

use crate::core::store::{
    RecordFilter, RecordOrder, RecordQuery, Store, WallpaperRecord, MAX_RATING, MIN_RATING,
};
use crate::error::CacheError;
use rand::Rng;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::info;

/// Longest tag accepted, in characters
pub const MAX_TAG_LEN: usize = 64;

static TAG_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[^,\p{Cc}]{1,64}$"));

/// Trim a tag and check it is storable
pub fn normalize_tag(tag: &str) -> Result<String, CacheError> {
    let tag = tag.trim();
    let pattern = TAG_PATTERN
        .as_ref()
        .map_err(|e| CacheError::invalid("tag", e.to_string()))?;

    if tag.is_empty() {
        return Err(CacheError::invalid("tag", "must not be empty"));
    }
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(CacheError::invalid(
            "tag",
            format!("'{tag}' is longer than {MAX_TAG_LEN} characters"),
        ));
    }
    if !pattern.is_match(tag) {
        return Err(CacheError::invalid(
            "tag",
            format!("'{}' contains a comma or control character", tag.escape_debug()),
        ));
    }
    Ok(tag.to_string())
}

fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Result<BTreeSet<String>, CacheError> {
    tags.iter().map(|t| normalize_tag(t.as_ref())).collect()
}

/// Favorite, rating and tag operations over a [`Store`]
pub struct CuratorOps<'a> {
    store: &'a Store,
}

impl<'a> CuratorOps<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Flip the favorite flag, returning the new value
    pub fn toggle_favorite(&self, id: &str) -> Result<bool, CacheError> {
        let record = self.store.update(id, |r| r.is_favorite = !r.is_favorite)?;
        info!(id, favorite = record.is_favorite, "Toggled favorite");
        Ok(record.is_favorite)
    }

    pub fn set_rating(&self, id: &str, rating: u8) -> Result<(), CacheError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(CacheError::invalid(
                "rating",
                format!("must be between {MIN_RATING} and {MAX_RATING}, got {rating}"),
            ));
        }
        self.store.update(id, |r| r.rating = rating)?;
        info!(id, rating, "Set wallpaper rating");
        Ok(())
    }

    /// Add tags, returning the full tag set afterwards
    pub fn add_tags<S: AsRef<str>>(
        &self,
        id: &str,
        tags: &[S],
    ) -> Result<BTreeSet<String>, CacheError> {
        let tags = normalize_tags(tags)?;
        let record = self.store.update(id, |r| r.tags.extend(tags.iter().cloned()))?;
        info!(id, tags = ?tags, "Added tags to wallpaper");
        Ok(record.tags)
    }

    /// Remove tags, returning the full tag set afterwards
    pub fn remove_tags<S: AsRef<str>>(
        &self,
        id: &str,
        tags: &[S],
    ) -> Result<BTreeSet<String>, CacheError> {
        let tags = normalize_tags(tags)?;
        let record = self
            .store
            .update(id, |r| r.tags.retain(|t| !tags.contains(t)))?;
        info!(id, tags = ?tags, "Removed tags from wallpaper");
        Ok(record.tags)
    }

    /// Favorites, highest rated first, then most recently used
    pub fn favorites(&self) -> Result<Vec<WallpaperRecord>, CacheError> {
        self.valid(RecordQuery::new(
            RecordFilter::all().favorite(true),
            RecordOrder::RatingThenLastUsed,
        ))
    }

    /// Records rated at least `min`, in favorites order
    pub fn by_rating(&self, min: u8) -> Result<Vec<WallpaperRecord>, CacheError> {
        self.valid(RecordQuery::new(
            RecordFilter::all().min_rating(min),
            RecordOrder::RatingThenLastUsed,
        ))
    }

    /// Records carrying every one of `tags`, most recently used first
    pub fn by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Result<Vec<WallpaperRecord>, CacheError> {
        let tags = normalize_tags(tags)?;
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        self.valid(RecordQuery::new(
            RecordFilter::all().with_tags(tags),
            RecordOrder::LastUsedDesc,
        ))
    }

    /// Uniformly random favorite
    pub fn random_favorite(&self) -> Result<Option<WallpaperRecord>, CacheError> {
        let mut favorites = self.favorites()?;
        if favorites.is_empty() {
            return Ok(None);
        }
        let pick = rand::rng().random_range(0..favorites.len());
        Ok(Some(favorites.swap_remove(pick)))
    }

    /// Aggregate statistics over the whole cache
    pub fn statistics(&self) -> Result<CacheStatistics, CacheError> {
        stats::collect(self.store)
    }

    fn valid(&self, query: RecordQuery) -> Result<Vec<WallpaperRecord>, CacheError> {
        let mut records = self.store.query_all(&query)?;
        records.retain(WallpaperRecord::file_exists);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

        fn add(&self, id: &str) {
            let path = self.dir.path().join(format!("{id}.jpg"));
            std::fs::write(&path, id.as_bytes()).unwrap();
            let at = self.store.stamp();
            self.store
                .insert(&WallpaperRecord {
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
                })
                .unwrap();
            self.store.append_usage(id, at).unwrap();
        }

        fn ops(&self) -> CuratorOps<'_> {
            CuratorOps::new(&self.store)
        }
    }

    fn ids(records: Vec<WallpaperRecord>) -> Vec<String> {
        records.into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn tags_are_trimmed_and_validated() {
        assert_eq!(normalize_tag("  nature ").unwrap(), "nature");
        assert_eq!(normalize_tag("city at night").unwrap(), "city at night");
        assert!(normalize_tag("   ").is_err());
        assert!(normalize_tag("a,b").is_err());
        assert!(normalize_tag("tab\there").is_err());
        assert!(normalize_tag(&"x".repeat(65)).is_err());
        assert!(normalize_tag(&"é".repeat(64)).is_ok());
    }

    #[test]
    fn toggle_favorite_flips_and_reports() {
        let fx = Fixture::new();
        fx.add("a");

        assert!(fx.ops().toggle_favorite("a").unwrap());
        assert!(!fx.ops().toggle_favorite("a").unwrap());
        assert!(matches!(
            fx.ops().toggle_favorite("missing"),
            Err(CacheError::NotFound { .. })
        ));
    }

    #[test]
    fn rating_bounds_are_enforced() {
        let fx = Fixture::new();
        fx.add("a");

        for bad in [0, 6] {
            assert!(matches!(
                fx.ops().set_rating("a", bad),
                Err(CacheError::InvalidArgument { field: "rating", .. })
            ));
        }
        fx.ops().set_rating("a", 1).unwrap();
        fx.ops().set_rating("a", 5).unwrap();
        assert_eq!(fx.store.get("a").unwrap().rating, 5);
        assert!(matches!(
            fx.ops().set_rating("missing", 3),
            Err(CacheError::NotFound { .. })
        ));
    }

    #[test]
    fn tag_changes_are_idempotent() {
        let fx = Fixture::new();
        fx.add("a");

        fx.ops().add_tags("a", &["space", "dark"]).unwrap();
        let tags = fx.ops().add_tags("a", &["space"]).unwrap();
        assert_eq!(tags.len(), 2);

        fx.ops().remove_tags("a", &["dark", "never-added"]).unwrap();
        let tags = fx.ops().remove_tags("a", &["dark"]).unwrap();
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["space"]);
    }

    #[test]
    fn by_tags_is_an_intersection() {
        let fx = Fixture::new();
        fx.add("only-a");
        fx.add("both");
        fx.ops().add_tags("only-a", &["a"]).unwrap();
        fx.ops().add_tags("both", &["a", "b"]).unwrap();

        assert_eq!(ids(fx.ops().by_tags(&["a", "b"]).unwrap()), vec!["both"]);
        assert_eq!(ids(fx.ops().by_tags(&["a"]).unwrap()), vec!["both", "only-a"]);
        assert!(fx.ops().by_tags::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn favorites_order_by_rating_then_recency() {
        let fx = Fixture::new();
        for id in ["low", "high", "recent-low"] {
            fx.add(id);
            fx.ops().toggle_favorite(id).unwrap();
        }
        fx.add("not-favorite");
        fx.ops().set_rating("high", 5).unwrap();
        fx.ops().set_rating("low", 2).unwrap();
        fx.ops().set_rating("recent-low", 2).unwrap();
        fx.ops().set_rating("not-favorite", 5).unwrap();

        assert_eq!(
            ids(fx.ops().favorites().unwrap()),
            vec!["high", "recent-low", "low"]
        );
        assert_eq!(
            ids(fx.ops().by_rating(5).unwrap()),
            vec!["not-favorite", "high"]
        );
    }

    #[test]
    fn random_favorite_only_picks_favorites() {
        let fx = Fixture::new();
        assert!(fx.ops().random_favorite().unwrap().is_none());

        fx.add("a");
        fx.add("b");
        fx.ops().toggle_favorite("b").unwrap();

        for _ in 0..10 {
            assert_eq!(fx.ops().random_favorite().unwrap().unwrap().id, "b");
        }
    }

    #[test]
    fn queries_hide_missing_files() {
        let fx = Fixture::new();
        fx.add("a");
        fx.ops().toggle_favorite("a").unwrap();
        std::fs::remove_file(fx.dir.path().join("a.jpg")).unwrap();

        assert!(fx.ops().favorites().unwrap().is_empty());
    }
}
