//! # Metadata Module
//!
//! Best-effort image resolution probing.
//!
//! Only the image header is read, so probing a multi-megabyte wallpaper is
//! cheap. A file that cannot be probed simply has no resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Image dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Read the dimensions of an image file
pub fn probe_resolution(path: &Path) -> Option<Resolution> {
    match image::image_dimensions(path) {
        Ok((width, height)) => Some(Resolution { width, height }),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to get image resolution");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    /// Minimal valid 1x1 PNG
    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
        0xFF, 0xFF, 0x3F, 0x00, 0x05, 0xFE, 0x02, 0xFE, 0xDC, 0xCC, 0x59, 0xE7, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn displays_as_width_by_height() {
        let res = Resolution {
            width: 2560,
            height: 1440,
        };
        assert_eq!(res.to_string(), "2560x1440");
    }

    #[test]
    fn probes_png_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.png");
        File::create(&path).unwrap().write_all(PNG_1X1).unwrap();

        assert_eq!(
            probe_resolution(&path),
            Some(Resolution {
                width: 1,
                height: 1
            })
        );
    }

    #[test]
    fn unreadable_image_has_no_resolution() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        File::create(&path)
            .unwrap()
            .write_all(b"not an image")
            .unwrap();

        assert!(probe_resolution(&path).is_none());
    }
}
