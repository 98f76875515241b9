//! # Error Module
//!
//! Error types for the deduplication pipeline.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, limits, what went wrong
//! - **Errors are data** until the orchestrator decides which one is fatal

use crate::core::processor::ProcessState;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum HashimgError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Output error: {0}")]
    Output(String),
}

/// Errors that occur while listing the working directory
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No images found in {path}")]
    NoImages { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid worker pool construction
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Thread count must be at least {minimum} (got {requested})")]
    ThreadCountTooSmall { requested: usize, minimum: usize },

    #[error("Queue capacity must be at least {minimum} (got {requested})")]
    QueueTooSmall { requested: usize, minimum: usize },

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors from hasher construction or from hashing a single file
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Hash prefix {prefix:?} is too short (must be at least {minimum} characters)")]
    PrefixTooShort { prefix: String, minimum: usize },

    #[error("Hash length {length} is too short (must be at least {minimum} characters)")]
    LengthTooShort { length: usize, minimum: usize },

    #[error("Hash length {length} is too long (a digest has {maximum} characters)")]
    LengthTooLong { length: usize, maximum: usize },

    #[error("Hasher has no result sink; one must be provided")]
    MissingSink,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Errors raised by the image processor
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("No images to process")]
    NoImages,

    #[error("Cannot {operation} while the processor is {state}")]
    InvalidState {
        operation: &'static str,
        state: ProcessState,
    },

    #[error("Failed to analyze file sizes in {path}: {source}")]
    Analyze {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to {operation} {path}: {source}")]
    Update {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {path} into the review folder: {source}")]
    Review {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to restore {path} from the review folder: {source}")]
    Restore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, HashimgError>;

impl HashimgError {
    /// True when the run stopped because there was nothing to process
    pub fn is_no_images(&self) -> bool {
        matches!(
            self,
            HashimgError::Scan(ScanError::NoImages { .. })
                | HashimgError::Process(ProcessError::NoImages)
        )
    }
}
