//! # Error Module
//!
//! Error types for the wallpaper cache and its collaborators.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - ids, paths, what went wrong
//! - **Caller misuse is loud** - `NotFound` and `InvalidArgument` always surface
//! - **Batches are best-effort** - eviction and cleanup log file failures and move on

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Script error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Errors raised by the wallpaper cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Wallpaper not found in cache: {id}")]
    NotFound { id: String },

    #[error("Wallpaper already cached: {id}")]
    DuplicateId { id: String },

    #[error("Invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("Database query failed: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("File operation failed for {path}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open cache database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Cache corruption detected at {path}. Delete this file and try again.")]
    Corrupted { path: PathBuf },
}

impl CacheError {
    pub(crate) fn not_found(id: &str) -> Self {
        CacheError::NotFound { id: id.to_string() }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        CacheError::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::FileSystem {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the remote gallery collaborator
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Search failed: {0}")]
    Search(String),

    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("No wallpapers found")]
    NoResults,
}

/// Errors from running the wallpaper script
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Script not found: {path}")]
    ScriptNotFound { path: PathBuf },

    #[error("Failed to start script {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Script {path} exited with {status}")]
    Failed { path: PathBuf, status: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
