//! # Core Module
//!
//! The UI-agnostic hash-and-reconcile engine.
//!
//! ## Modules
//! - `scanner` - Lists images and classifies them as cached or new
//! - `pool` - Bounded worker pool shared by both phases
//! - `hasher` - Computes (or reads back) content hashes
//! - `reconciler` - Splits hashes into survivors and duplicate groups
//! - `processor` - Orchestrates hashing, review and the filesystem update
//! - `status` - Live counters for progress observers
//! - `opener` - Reveals the review folder in the file browser

pub mod hasher;
pub mod opener;
pub mod pool;
pub mod processor;
pub mod reconciler;
pub mod scanner;
pub mod status;

// Re-export commonly used types
pub use hasher::{HashOutcome, HashResultSet};
pub use processor::{ImageProcessor, ProcessState};
pub use reconciler::{reconcile, ReconciliationResult};
pub use scanner::{map_images, CacheStatus, ImageMap};
pub use status::{ProcessStatus, StatusSnapshot};
