//! # hashimg
//!
//! Deduplicates a folder of images and gives every survivor a canonical
//! name derived from its content hash.
//!
//! ## How It Works
//! - Every image is hashed (SHA-256, truncated) on a bounded worker pool
//! - Images already carrying the hash prefix are trusted without rehashing
//! - Duplicates are deleted, or set aside in a review folder first
//! - Survivors are renamed to `<prefix><hash><.ext>`
//!
//! ## Architecture
//! - `core` - The hash-and-reconcile engine (UI-agnostic)
//! - `error` - Error types for every phase
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;

// Re-export commonly used types at the crate root
pub use error::{HashimgError, Result};

use tracing_subscriber::EnvFilter;

/// Install a stderr `tracing` subscriber filtered by `RUST_LOG`.
///
/// Defaults to `warn` when `RUST_LOG` is unset. A second call keeps the
/// first subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
