//! # Scanner Module
//!
//! Lists the images in a working directory and classifies each one as
//! cached (already renamed to its hash) or not.
//!
//! The listing is not recursive: only regular files directly inside the
//! directory are considered, so the review folder is never picked up.
//!
//! ## Example
//! ```rust,ignore
//! use hashimg::core::scanner::map_images;
//!
//! let images = map_images("/home/me/wallpapers".as_ref(), "0x@")?;
//! ```

mod filter;

pub use filter::{ImageFilter, IMAGE_EXTENSIONS};

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Whether an image name already carries the hash prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheStatus {
    /// Never processed; its content must be hashed
    NotCached,
    /// Previously renamed; the hash is embedded in the name
    Cached,
}

impl CacheStatus {
    /// Classify a file name against the hash prefix
    pub fn of(file_name: &str, prefix: &str) -> Self {
        if file_name.starts_with(prefix) {
            CacheStatus::Cached
        } else {
            CacheStatus::NotCached
        }
    }

    pub fn is_cached(self) -> bool {
        self == CacheStatus::Cached
    }
}

/// File name -> cache status for every image in a directory.
///
/// Ordered so the submission order is stable for a given listing.
pub type ImageMap = BTreeMap<String, CacheStatus>;

/// Map every image in `dir` to its cache status
pub fn map_images(dir: &Path, prefix: &str) -> Result<ImageMap, ScanError> {
    let filter = ImageFilter::new();
    let mut images = ImageMap::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| ScanError::ReadDirectory {
            path: dir.to_path_buf(),
            source: err.into(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };

        if !filter.should_include(name) {
            continue;
        }

        images.insert(name.to_string(), CacheStatus::of(name, prefix));
    }

    if images.is_empty() {
        return Err(ScanError::NoImages {
            path: dir.to_path_buf(),
        });
    }

    debug!(dir = %dir.display(), count = images.len(), "mapped images");
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn classifies_prefixed_names_as_cached() {
        assert_eq!(CacheStatus::of("0x@1b4f0e9851.png", "0x@"), CacheStatus::Cached);
        assert_eq!(CacheStatus::of("holiday.png", "0x@"), CacheStatus::NotCached);
    }

    #[test]
    fn maps_only_images_in_top_level() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.PNG"), "a").unwrap();
        fs::write(dir.path().join("0x@1b4f0e9851.jpg"), "b").unwrap();
        fs::write(dir.path().join("readme.txt"), "c").unwrap();
        fs::create_dir(dir.path().join("nested.png")).unwrap();
        fs::write(dir.path().join("nested.png").join("inner.png"), "d").unwrap();

        let images = map_images(dir.path(), "0x@").unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images["a.PNG"], CacheStatus::NotCached);
        assert_eq!(images["0x@1b4f0e9851.jpg"], CacheStatus::Cached);
    }

    #[test]
    fn empty_directory_has_no_images() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let err = map_images(dir.path(), "0x@").unwrap_err();
        assert!(matches!(err, ScanError::NoImages { .. }));
    }

    #[test]
    fn missing_directory_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");

        let err = map_images(&missing, "0x@").unwrap_err();
        assert!(matches!(err, ScanError::ReadDirectory { .. }));
    }
}
