//! Hash outcomes and the thread-safe accumulator workers write them into.

use crate::error::HashError;
use std::collections::HashMap;
use std::mem;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Result of hashing one image
#[derive(Debug)]
pub struct HashOutcome {
    /// Truncated lowercase hex digest
    pub hash: String,
    /// Where the file lives
    pub path: PathBuf,
    /// The hash was read from the file name rather than computed
    pub cached: bool,
    /// Chosen as the keeper of its duplicate group during reconciliation
    pub novel: bool,
    /// Failure while reading the file; `hash` is empty when set
    pub error: Option<HashError>,
}

impl HashOutcome {
    /// Outcome whose hash was derived from a prefixed file name
    pub fn cached(hash: String, path: PathBuf) -> Self {
        Self {
            hash,
            path,
            cached: true,
            novel: false,
            error: None,
        }
    }

    /// Outcome of hashing the file content
    pub fn computed(hash: String, path: PathBuf) -> Self {
        Self {
            hash,
            path,
            cached: false,
            novel: false,
            error: None,
        }
    }

    /// Outcome for a file that could not be hashed
    pub fn failed(path: PathBuf, error: HashError) -> Self {
        Self {
            hash: String::new(),
            path,
            cached: false,
            novel: false,
            error: Some(error),
        }
    }
}

/// Everything the hashing phase produced
#[derive(Debug, Default)]
pub struct HashResultSet {
    /// Outcomes for files that were not yet prefixed, in completion order
    pub new_outcomes: Vec<HashOutcome>,
    /// Outcomes for prefixed files, keyed by their embedded hash.
    ///
    /// Two cached files embedding the same hash collapse to the last one
    /// recorded.
    pub cached_outcomes: HashMap<String, HashOutcome>,
}

impl HashResultSet {
    pub fn len(&self) -> usize {
        self.new_outcomes.len() + self.cached_outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the first recorded error, new outcomes first
    pub fn take_first_error(&mut self) -> Option<HashError> {
        self.new_outcomes
            .iter_mut()
            .chain(self.cached_outcomes.values_mut())
            .find_map(|outcome| outcome.error.take())
    }
}

/// Mutex-guarded [`HashResultSet`] shared by hash workers.
///
/// Each worker locks only long enough to push its own outcome.
#[derive(Debug, Default)]
pub struct HashAccumulator {
    results: Mutex<HashResultSet>,
}

impl HashAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one outcome in the bucket matching its origin
    pub fn record(&self, outcome: HashOutcome) {
        let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        if outcome.cached {
            let hash = outcome.hash.clone();
            if let Some(replaced) = results.cached_outcomes.insert(hash, outcome) {
                debug!(
                    path = %replaced.path.display(),
                    "cached image shares its hash with another cached image"
                );
            }
        } else {
            results.new_outcomes.push(outcome);
        }
    }

    /// Take everything recorded so far, leaving the accumulator empty
    pub fn take(&self) -> HashResultSet {
        mem::take(&mut *self.results.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn cached_collisions_keep_the_last_write() {
        let accumulator = HashAccumulator::new();
        accumulator.record(HashOutcome::cached("abc".into(), "0x@abc.png".into()));
        accumulator.record(HashOutcome::cached("abc".into(), "0x@abc.jpg".into()));
        accumulator.record(HashOutcome::computed("def".into(), "x.png".into()));

        let results = accumulator.take();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results.cached_outcomes["abc"].path,
            PathBuf::from("0x@abc.jpg")
        );
        assert!(accumulator.take().is_empty());
    }

    #[test]
    fn take_first_error_prefers_new_outcomes() {
        let mut results = HashResultSet::default();
        results
            .new_outcomes
            .push(HashOutcome::computed("aaa".into(), "ok.png".into()));
        results.new_outcomes.push(HashOutcome::failed(
            "broken.png".into(),
            HashError::Io {
                path: "broken.png".into(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
        ));

        let error = results.take_first_error().unwrap();
        assert!(error.to_string().contains("broken.png"));
        assert!(results.take_first_error().is_none());
    }
}
