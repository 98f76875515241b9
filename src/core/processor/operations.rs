//! Filesystem mutations queued during the update phase.

use crate::error::ProcessError;
use std::fs;
use std::path::{Path, PathBuf};

/// One rename or delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FileOperation {
    Delete(PathBuf),
    Rename { from: PathBuf, to: PathBuf },
}

impl FileOperation {
    pub(crate) fn apply(&self) -> Result<(), ProcessError> {
        match self {
            FileOperation::Delete(path) => {
                fs::remove_file(path).map_err(|source| ProcessError::Update {
                    operation: "delete",
                    path: path.clone(),
                    source,
                })
            }
            FileOperation::Rename { from, to } => {
                fs::rename(from, to).map_err(|source| ProcessError::Update {
                    operation: "rename",
                    path: from.clone(),
                    source,
                })
            }
        }
    }
}

/// `<prefix><hash><.ext>` with the extension lowercased
pub fn canonical_name(prefix: &str, hash: &str, original: &Path) -> String {
    format!("{prefix}{hash}{}", extension_of(original).to_lowercase())
}

/// Canonical name placed next to the original file
pub(crate) fn target_path(prefix: &str, hash: &str, original: &Path) -> PathBuf {
    original.with_file_name(canonical_name(prefix, hash, original))
}

/// `<hash>_<position><.ext>` for a file parked in the review folder
pub(crate) fn review_name(hash: &str, position: usize, original: &Path) -> String {
    format!("{hash}_{position}{}", extension_of(original))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
