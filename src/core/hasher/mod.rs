//! # Hasher Module
//!
//! Content fingerprints and stable identifiers for wallpapers.
//!
//! ## Two kinds of hashes
//! - **Content digest** - SHA-256 over the file bytes. Identical downloads
//!   served under different remote paths share a digest, which is what
//!   duplicate detection keys on.
//! - **Wallpaper id** - xxh3 over the remote source path. The id never
//!   depends on content, so the same URL always maps to the same record.
//!
//! ## Example
//! ```rust,ignore
//! use wallpaper_cache::core::hasher::{hash_file, wallpaper_id};
//!
//! let digest = hash_file(&path)?;
//! let id = wallpaper_id("https://w.wallhaven.cc/full/ab/wallhaven-ab12cd.jpg");
//! ```

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

/// Fingerprint and size of a file's bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDigest {
    /// Lowercase hex SHA-256 of the contents
    pub hex: String,
    /// Number of bytes hashed
    pub size_bytes: u64,
}

/// Hash a file's contents.
///
/// Streams the file so large wallpapers are never held in memory.
pub fn hash_file(path: &Path) -> Result<ContentDigest, CacheError> {
    let file = File::open(path).map_err(|e| CacheError::file_system(path, e))?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = Sha256::new();
    let size_bytes =
        io::copy(&mut reader, &mut hasher).map_err(|e| CacheError::file_system(path, e))?;

    Ok(ContentDigest {
        hex: format!("{:x}", hasher.finalize()),
        size_bytes,
    })
}

/// Derive the cache id for a remote source path.
pub fn wallpaper_id(source_url: &str) -> String {
    format!("{:016x}", xxh3_64(source_url.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn same_bytes_give_same_digest() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.jpg", b"identical wallpaper bytes");
        let b = write_file(&dir, "b.jpg", b"identical wallpaper bytes");

        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }

    #[test]
    fn digest_reports_size_and_known_value() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "abc.png", b"abc");

        let digest = hash_file(&path).unwrap();

        assert_eq!(digest.size_bytes, 3);
        assert_eq!(
            digest.hex,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn missing_file_is_a_file_system_error() {
        let result = hash_file(Path::new("/definitely/not/here.jpg"));
        assert!(matches!(result, Err(CacheError::FileSystem { .. })));
    }

    #[test]
    fn id_is_stable_and_sixteen_hex_chars() {
        let url = "https://w.wallhaven.cc/full/ab/wallhaven-ab12cd.jpg";
        let id = wallpaper_id(url);

        assert_eq!(id, wallpaper_id(url));
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, wallpaper_id("https://w.wallhaven.cc/full/ab/other.jpg"));
    }
}
