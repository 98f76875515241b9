//! # Reconciler Module
//!
//! Splits hash outcomes into survivors (one per distinct hash) and
//! duplicate groups.
//!
//! ## Precedence
//! New outcomes are walked in the order they were recorded. For each one:
//! 1. A hash that already has a group just gains another member
//! 2. A hash matching a cached image opens a group led by that cached
//!    image, flagged as the keeper
//! 3. A hash matching an earlier new survivor opens a group led by that
//!    survivor, flagged as the keeper
//! 4. Anything else becomes a survivor
//!
//! Cached images nobody collided with are survivors as well. A cached
//! keeper is never renamed or deleted; its flag only routes it during the
//! update phase.

use crate::core::hasher::{HashOutcome, HashResultSet};
use std::collections::HashMap;
use tracing::warn;

/// Survivors and duplicate groups, keyed by hash
#[derive(Debug, Default)]
pub struct ReconciliationResult {
    /// One outcome per hash that has no duplicates
    pub survivors: HashMap<String, HashOutcome>,
    /// Every outcome of a duplicated hash, keeper first
    pub duplicate_groups: HashMap<String, Vec<HashOutcome>>,
}

impl ReconciliationResult {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicate_groups.is_empty()
    }

    /// Total outcomes across survivors and groups
    pub fn outcome_count(&self) -> usize {
        self.survivors.len() + self.duplicate_groups.values().map(Vec::len).sum::<usize>()
    }
}

/// Partition hash results by hash. Pure and single-threaded.
pub fn reconcile(results: HashResultSet) -> ReconciliationResult {
    let HashResultSet {
        new_outcomes,
        mut cached_outcomes,
    } = results;

    let mut survivors: HashMap<String, HashOutcome> = HashMap::new();
    let mut duplicate_groups: HashMap<String, Vec<HashOutcome>> = HashMap::new();

    for outcome in new_outcomes {
        if let Some(error) = &outcome.error {
            warn!(path = %outcome.path.display(), %error, "skipping image that failed to hash");
            continue;
        }

        if let Some(group) = duplicate_groups.get_mut(&outcome.hash) {
            group.push(outcome);
            continue;
        }

        if let Some(mut keeper) = cached_outcomes.remove(&outcome.hash) {
            keeper.novel = true;
            survivors.remove(&outcome.hash);
            duplicate_groups.insert(outcome.hash.clone(), vec![keeper, outcome]);
            continue;
        }

        if let Some(mut keeper) = survivors.remove(&outcome.hash) {
            keeper.novel = true;
            duplicate_groups.insert(outcome.hash.clone(), vec![keeper, outcome]);
            continue;
        }

        survivors.insert(outcome.hash.clone(), outcome);
    }

    for (hash, outcome) in cached_outcomes {
        if let Some(error) = &outcome.error {
            warn!(path = %outcome.path.display(), %error, "skipping image that failed to hash");
            continue;
        }
        survivors.insert(hash, outcome);
    }

    ReconciliationResult {
        survivors,
        duplicate_groups,
    }
}
