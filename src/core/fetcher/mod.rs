//! # Fetcher Module
//!
//! The seam between the cache and a remote wallpaper gallery.
//!
//! The cache itself never talks to the network. A [`Fetcher`] answers
//! searches and downloads single images into a directory; the
//! [`Ingestor`] ties a fetcher to a [`WallpaperCache`](crate::core::cache::WallpaperCache),
//! reusing files already on disk and folding content duplicates onto the
//! record that already holds them.

mod ingest;
mod types;

pub use ingest::{IngestOutcome, Ingestor};
pub use types::{RemoteWallpaper, SearchCriteria, SearchFacets};

use crate::error::FetchError;
use rand::Rng;
use std::path::{Path, PathBuf};

/// A remote wallpaper source
pub trait Fetcher: Send + Sync {
    /// Run a search and return its results in gallery order
    fn search(&self, criteria: &SearchCriteria) -> Result<Vec<RemoteWallpaper>, FetchError>;

    /// Download `item` into `dir`, returning the written file's path
    fn download(&self, item: &RemoteWallpaper, dir: &Path) -> Result<PathBuf, FetchError>;
}

/// Pick one search result uniformly at random
pub fn pick_random(items: &[RemoteWallpaper]) -> Option<&RemoteWallpaper> {
    if items.is_empty() {
        return None;
    }
    items.get(rand::rng().random_range(0..items.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_random_handles_empty_and_single() {
        assert!(pick_random(&[]).is_none());

        let one = [RemoteWallpaper::new("https://example.invalid/a.jpg")];
        assert_eq!(pick_random(&one), Some(&one[0]));
    }

    #[test]
    fn pick_random_stays_in_bounds() {
        let items: Vec<_> = (0..5)
            .map(|i| RemoteWallpaper::new(format!("https://example.invalid/{i}.jpg")))
            .collect();
        for _ in 0..50 {
            let pick = pick_random(&items).unwrap();
            assert!(items.contains(pick));
        }
    }
}
