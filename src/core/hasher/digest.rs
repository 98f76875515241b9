//! SHA-256 content digests and hashes embedded in file names.

use crate::error::HashError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// Hex characters in a full SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Stream a file through SHA-256 and keep the first `length` hex characters.
///
/// `buffer_size` overrides the read-buffer capacity.
pub fn hash_file(
    path: &Path,
    length: usize,
    buffer_size: Option<usize>,
) -> Result<String, HashError> {
    let io_error = |source: io::Error| HashError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_error)?;
    let mut reader = match buffer_size {
        Some(capacity) => BufReader::with_capacity(capacity, file),
        None => BufReader::new(file),
    };

    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(io_error)?;

    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(length);
    Ok(hex)
}

/// Recover the hash from a prefixed name: strip the extension, then the prefix
pub fn hash_from_name(file_name: &str, prefix: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(dot) => &file_name[..dot],
        None => file_name,
    };
    stem.strip_prefix(prefix).unwrap_or(stem).to_string()
}
