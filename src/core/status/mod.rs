//! # Status Module
//!
//! Live counters and timings for one processing run.
//!
//! Workers update the counters through [`ProgressObserver`]; a UI polls
//! the same [`ProcessStatus`] from another thread (usually via
//! [`ProcessStatus::snapshot`]). All counters are atomics, so neither side
//! ever blocks the other.
//!
//! Progress maxima are fixed before their phase starts, so a poller never
//! sees a counter above its maximum.

use crate::core::processor::ProcessState;
use crate::core::scanner::CacheStatus;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// One unit of completed work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// A file was hashed (or its hash was read from its name)
    Hashed(CacheStatus),
    /// A rename or delete finished, successfully or not
    Updated,
}

/// Receives progress notifications from worker threads.
///
/// Called inside workers, so implementations must be cheap and must not
/// block.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, kind: ProgressKind);
}

/// Observer that ignores everything
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_progress(&self, _kind: ProgressKind) {}
}

/// Timed sections of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    /// Mean file size scan used for the read-buffer hint
    Analyze,
    Hash,
    Filter,
    Update,
    Total,
}

/// Shared, concurrently updated state of a processing run
#[derive(Debug, Default)]
pub struct ProcessStatus {
    total_images: AtomicUsize,
    dupe_images: AtomicUsize,
    cached_images: AtomicUsize,
    new_images: AtomicUsize,
    hash_progress: AtomicUsize,
    max_hash_progress: AtomicUsize,
    update_progress: AtomicUsize,
    max_update_progress: AtomicUsize,
    analyze_nanos: AtomicU64,
    hash_nanos: AtomicU64,
    filter_nanos: AtomicU64,
    update_nanos: AtomicU64,
    total_nanos: AtomicU64,
    hash_done: AtomicBool,
    update_done: AtomicBool,
    hash_error: Mutex<Option<String>>,
    update_error: Mutex<Option<String>>,
    state: Mutex<ProcessState>,
}

impl ProcessStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_images(&self) -> usize {
        self.total_images.load(Ordering::SeqCst)
    }

    pub fn dupe_images(&self) -> usize {
        self.dupe_images.load(Ordering::SeqCst)
    }

    pub fn cached_images(&self) -> usize {
        self.cached_images.load(Ordering::SeqCst)
    }

    pub fn new_images(&self) -> usize {
        self.new_images.load(Ordering::SeqCst)
    }

    pub fn hash_progress(&self) -> usize {
        self.hash_progress.load(Ordering::SeqCst)
    }

    pub fn max_hash_progress(&self) -> usize {
        self.max_hash_progress.load(Ordering::SeqCst)
    }

    pub fn update_progress(&self) -> usize {
        self.update_progress.load(Ordering::SeqCst)
    }

    pub fn max_update_progress(&self) -> usize {
        self.max_update_progress.load(Ordering::SeqCst)
    }

    pub fn is_hash_done(&self) -> bool {
        self.hash_done.load(Ordering::SeqCst)
    }

    pub fn is_update_done(&self) -> bool {
        self.update_done.load(Ordering::SeqCst)
    }

    /// First fatal error of the hash phase, rendered for display
    pub fn hash_error(&self) -> Option<String> {
        self.hash_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First fatal error of the update phase, rendered for display
    pub fn update_error(&self) -> Option<String> {
        self.update_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> ProcessState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn duration(&self, timing: Timing) -> Duration {
        Duration::from_nanos(self.timing_slot(timing).load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: ProcessState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Sets the image total and the hash-phase maximum in one step
    pub(crate) fn begin_hashing(&self, total_images: usize) {
        self.total_images.store(total_images, Ordering::SeqCst);
        self.max_hash_progress.store(total_images, Ordering::SeqCst);
    }

    /// Fixes the update-phase maximum before any update task is queued
    pub(crate) fn begin_updating(&self, max_update_progress: usize) {
        self.max_update_progress
            .store(max_update_progress, Ordering::SeqCst);
    }

    pub(crate) fn set_dupe_images(&self, count: usize) {
        self.dupe_images.store(count, Ordering::SeqCst);
    }

    pub(crate) fn set_new_images(&self, count: usize) {
        self.new_images.store(count, Ordering::SeqCst);
    }

    pub(crate) fn record(&self, timing: Timing, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let slot = self.timing_slot(timing);
        if timing == Timing::Total {
            slot.fetch_add(nanos, Ordering::SeqCst);
        } else {
            slot.store(nanos, Ordering::SeqCst);
        }
    }

    pub(crate) fn finish_hashing(&self) {
        self.hash_done.store(true, Ordering::SeqCst);
    }

    pub(crate) fn finish_updating(&self) {
        self.update_done.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_hashing(&self, message: String) {
        self.hash_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(message);
    }

    pub(crate) fn fail_updating(&self, message: String) {
        self.update_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(message);
    }

    /// Plain copy of every field, for rendering or serialization
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state(),
            total_images: self.total_images(),
            dupe_images: self.dupe_images(),
            cached_images: self.cached_images(),
            new_images: self.new_images(),
            hash_progress: self.hash_progress(),
            max_hash_progress: self.max_hash_progress(),
            update_progress: self.update_progress(),
            max_update_progress: self.max_update_progress(),
            analyze_ms: duration_ms(self.duration(Timing::Analyze)),
            hash_ms: duration_ms(self.duration(Timing::Hash)),
            filter_ms: duration_ms(self.duration(Timing::Filter)),
            update_ms: duration_ms(self.duration(Timing::Update)),
            total_ms: duration_ms(self.duration(Timing::Total)),
            hash_done: self.is_hash_done(),
            update_done: self.is_update_done(),
            hash_error: self.hash_error(),
            update_error: self.update_error(),
        }
    }

    fn timing_slot(&self, timing: Timing) -> &AtomicU64 {
        match timing {
            Timing::Analyze => &self.analyze_nanos,
            Timing::Hash => &self.hash_nanos,
            Timing::Filter => &self.filter_nanos,
            Timing::Update => &self.update_nanos,
            Timing::Total => &self.total_nanos,
        }
    }
}

impl ProgressObserver for ProcessStatus {
    fn on_progress(&self, kind: ProgressKind) {
        match kind {
            ProgressKind::Hashed(cache_status) => {
                if cache_status.is_cached() {
                    self.cached_images.fetch_add(1, Ordering::SeqCst);
                }
                self.hash_progress.fetch_add(1, Ordering::SeqCst);
            }
            ProgressKind::Updated => {
                self.update_progress.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Point-in-time copy of a [`ProcessStatus`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: ProcessState,
    pub total_images: usize,
    pub dupe_images: usize,
    pub cached_images: usize,
    pub new_images: usize,
    pub hash_progress: usize,
    pub max_hash_progress: usize,
    pub update_progress: usize,
    pub max_update_progress: usize,
    pub analyze_ms: u64,
    pub hash_ms: u64,
    pub filter_ms: u64,
    pub update_ms: u64,
    pub total_ms: u64,
    pub hash_done: bool,
    pub update_done: bool,
    pub hash_error: Option<String>,
    pub update_error: Option<String>,
}
