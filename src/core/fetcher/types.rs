//! Remote gallery types.

use serde::{Deserialize, Serialize};

/// Search facets stored with every wallpaper.
///
/// Each is a three-character bitmask as the gallery expects it, e.g.
/// categories "010" (anime only) and purity "110" (SFW and sketchy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFacets {
    pub categories: String,
    pub purity: String,
}

impl Default for SearchFacets {
    fn default() -> Self {
        Self {
            categories: "010".to_string(),
            purity: "110".to_string(),
        }
    }
}

impl SearchFacets {
    pub fn new(categories: impl Into<String>, purity: impl Into<String>) -> Self {
        Self {
            categories: categories.into(),
            purity: purity.into(),
        }
    }
}

/// A query against the remote gallery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Free-text tag query
    pub query: Option<String>,
    pub facets: SearchFacets,
    pub sorting: String,
    pub order: String,
    /// Window for toplist sorting, e.g. "1y"
    pub top_range: String,
    /// Minimum resolution, e.g. "2560x1440"
    pub at_least: Option<String>,
    pub ratios: Vec<String>,
    pub page: u32,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            query: None,
            facets: SearchFacets::default(),
            sorting: "toplist".to_string(),
            order: "desc".to_string(),
            top_range: "1y".to_string(),
            at_least: Some("2560x1440".to_string()),
            ratios: vec!["16x9".to_string(), "16x10".to_string()],
            page: 1,
        }
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteWallpaper {
    /// Full-size image URL; the cache id is derived from it
    pub path: String,
}

impl RemoteWallpaper {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Last path segment, used as the local file name
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(&self.path)
    }
}
