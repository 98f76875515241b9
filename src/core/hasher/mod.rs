//! # Hasher Module
//!
//! Turns image files into truncated content hashes on a worker pool.
//!
//! ## How It Works
//! - **Cached** images already carry `<prefix><hash>` in their name, so the
//!   hash is read back from the name with no file I/O
//! - Every other image is streamed through SHA-256 and the lowercase hex
//!   digest is cut to the configured length
//!
//! Failures never escape a worker. An unreadable file still produces an
//! outcome, carrying its error, and the caller decides what to do with it
//! once [`ContentHasher::wait`] returns.
//!
//! ## Example
//! ```rust,ignore
//! let sink = Arc::new(HashAccumulator::new());
//! let hasher = HasherConfig::new()
//!     .prefix("0x@")
//!     .length(32)
//!     .sink(Arc::clone(&sink))
//!     .build()?;
//!
//! hasher.submit("cat.png".into(), CacheStatus::NotCached, dir.join("cat.png"));
//! hasher.wait();
//! let results = sink.take();
//! ```

mod digest;
mod outcome;

pub use digest::{hash_file, hash_from_name, DIGEST_HEX_LEN};
pub use outcome::{HashAccumulator, HashOutcome, HashResultSet};

use crate::core::pool::{WorkerPool, MIN_QUEUE_CAPACITY, MIN_THREADS};
use crate::core::scanner::CacheStatus;
use crate::core::status::{NullObserver, ProgressKind, ProgressObserver};
use crate::error::HashError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::trace;

/// Shortest accepted hash prefix; shorter ones clash with ordinary names
pub const MIN_PREFIX_LEN: usize = 3;

/// Shortest accepted hash length; shorter ones collide too easily
pub const MIN_HASH_LEN: usize = 10;

/// Largest read buffer a size hint can ask for
pub const MAX_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Configuration builder for [`ContentHasher`]
#[derive(Clone)]
pub struct HasherConfig {
    prefix: String,
    length: usize,
    threads: usize,
    queue_size: usize,
    buffer_size: u64,
    sink: Option<Arc<HashAccumulator>>,
    observer: Arc<dyn ProgressObserver>,
}

impl HasherConfig {
    /// Create a configuration with defaults; a sink must still be set
    pub fn new() -> Self {
        Self {
            prefix: "0x@".to_string(),
            length: 32,
            threads: MIN_THREADS,
            queue_size: MIN_QUEUE_CAPACITY,
            buffer_size: 0,
            sink: None,
            observer: Arc::new(NullObserver),
        }
    }

    /// Prefix marking renamed images; it should not occur in ordinary names
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Number of hex characters kept from the digest
    pub fn length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Read-buffer size hint in bytes; zero keeps the default buffer
    pub fn buffer_size(mut self, bytes: u64) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Where outcomes are recorded
    pub fn sink(mut self, sink: Arc<HashAccumulator>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Notified once per finished file
    pub fn observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Validate the configuration and start the worker pool
    pub fn build(self) -> Result<ContentHasher, HashError> {
        if self.prefix.chars().count() < MIN_PREFIX_LEN {
            return Err(HashError::PrefixTooShort {
                prefix: self.prefix,
                minimum: MIN_PREFIX_LEN,
            });
        }

        if self.length < MIN_HASH_LEN {
            return Err(HashError::LengthTooShort {
                length: self.length,
                minimum: MIN_HASH_LEN,
            });
        }

        if self.length > DIGEST_HEX_LEN {
            return Err(HashError::LengthTooLong {
                length: self.length,
                maximum: DIGEST_HEX_LEN,
            });
        }

        let sink = self.sink.ok_or(HashError::MissingSink)?;
        let pool = WorkerPool::new(self.threads, self.queue_size)?;

        let buffer_size = match usize::try_from(self.buffer_size) {
            Ok(0) => None,
            Ok(bytes) => Some(bytes.min(MAX_BUFFER_SIZE)),
            Err(_) => Some(MAX_BUFFER_SIZE),
        };

        Ok(ContentHasher {
            pool,
            job: Arc::new(HashJob {
                prefix: self.prefix,
                length: self.length,
                buffer_size,
                sink,
                observer: self.observer,
            }),
        })
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings and sinks shared by every hash task
struct HashJob {
    prefix: String,
    length: usize,
    buffer_size: Option<usize>,
    sink: Arc<HashAccumulator>,
    observer: Arc<dyn ProgressObserver>,
}

impl HashJob {
    fn run(&self, file_name: &str, cache_status: CacheStatus, path: PathBuf) {
        let outcome = match cache_status {
            CacheStatus::Cached => {
                HashOutcome::cached(hash_from_name(file_name, &self.prefix), path)
            }
            CacheStatus::NotCached => match hash_file(&path, self.length, self.buffer_size) {
                Ok(hash) => HashOutcome::computed(hash, path),
                Err(error) => HashOutcome::failed(path, error),
            },
        };

        trace!(file_name, hash = %outcome.hash, "hashed");
        self.sink.record(outcome);
        self.observer.on_progress(ProgressKind::Hashed(cache_status));
    }
}

/// Parallel content hasher backed by a [`WorkerPool`]
pub struct ContentHasher {
    pool: WorkerPool,
    job: Arc<HashJob>,
}

impl ContentHasher {
    /// Queue one file; blocks while the pool queue is full
    pub fn submit(&self, file_name: String, cache_status: CacheStatus, path: PathBuf) {
        let job = Arc::clone(&self.job);
        self.pool
            .submit(move || job.run(&file_name, cache_status, path));
    }

    /// Wait for every queued file. The sink is complete afterwards.
    pub fn wait(self) {
        self.pool.wait();
    }
}
