//! Which directory entries count as images.

use std::collections::HashSet;

/// Extensions recognised as images, lowercase and without the dot
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "heic"];

/// Accepts file names with an image extension, in any case. Dot-files are
/// never images.
pub struct ImageFilter {
    extensions: HashSet<&'static str>,
}

impl ImageFilter {
    pub fn new() -> Self {
        Self {
            extensions: IMAGE_EXTENSIONS.iter().copied().collect(),
        }
    }

    pub fn should_include(&self, file_name: &str) -> bool {
        if file_name.starts_with('.') {
            return false;
        }

        file_name.rsplit_once('.').is_some_and(|(_, ext)| {
            self.extensions
                .contains(ext.to_ascii_lowercase().as_str())
        })
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new()
    }
}
