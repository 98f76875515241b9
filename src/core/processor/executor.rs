//! Image processor implementation.

use super::operations::{review_name, target_path, FileOperation};
use super::ProcessState;
use crate::core::hasher::{HashAccumulator, HashOutcome, HashResultSet, HasherConfig};
use crate::core::opener::{FolderOpener, SystemOpener};
use crate::core::pool::{WorkerPool, MIN_QUEUE_CAPACITY, MIN_THREADS};
use crate::core::reconciler::{reconcile, ReconciliationResult};
use crate::core::scanner::ImageMap;
use crate::core::status::{ProcessStatus, ProgressKind, ProgressObserver, Timing};
use crate::error::{HashimgError, ProcessError, Result};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::mem;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Prefix marking images that were already renamed
pub const DEFAULT_PREFIX: &str = "0x@";

/// Hex characters kept from each digest
pub const DEFAULT_HASH_LENGTH: usize = 32;

/// Folder (inside the working directory) that holds duplicates under review
pub const DEFAULT_REVIEW_DIR: &str = "__dupes";

/// Configuration for a processing run
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Directory whose images are processed
    pub working_dir: PathBuf,
    /// Prefix of renamed images
    pub prefix: String,
    /// Hex characters kept from each digest
    pub hash_length: usize,
    /// Name of the review folder inside `working_dir`
    pub review_dir_name: String,
    /// Reveal the review folder once duplicates are moved into it
    pub open_review_dir: bool,
    /// Worker threads per phase (None = one per CPU)
    pub threads: Option<usize>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            prefix: DEFAULT_PREFIX.to_string(),
            hash_length: DEFAULT_HASH_LENGTH,
            review_dir_name: DEFAULT_REVIEW_DIR.to_string(),
            open_review_dir: true,
            threads: None,
        }
    }
}

/// Builder for [`ImageProcessor`]
pub struct ImageProcessorBuilder {
    config: ProcessorConfig,
    images: ImageMap,
    status: Option<Arc<ProcessStatus>>,
    opener: Option<Box<dyn FolderOpener>>,
}

impl ImageProcessorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            images: ImageMap::new(),
            status: None,
            opener: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.working_dir = dir.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    pub fn hash_length(mut self, length: usize) -> Self {
        self.config.hash_length = length;
        self
    }

    pub fn review_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.review_dir_name = name.into();
        self
    }

    pub fn open_review_dir(mut self, open: bool) -> Self {
        self.config.open_review_dir = open;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = Some(threads);
        self
    }

    /// Images to process, as produced by the scanner
    pub fn images(mut self, images: ImageMap) -> Self {
        self.images = images;
        self
    }

    /// Share a status with an observer on another thread
    pub fn status(mut self, status: Arc<ProcessStatus>) -> Self {
        self.status = Some(status);
        self
    }

    /// Override how the review folder is revealed
    pub fn opener(mut self, opener: Box<dyn FolderOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn build(self) -> ImageProcessor {
        ImageProcessor {
            config: self.config,
            images: self.images,
            status: self.status.unwrap_or_default(),
            opener: self.opener.unwrap_or_else(|| Box::new(SystemOpener)),
            state: ProcessState::Idle,
            reconciliation: None,
            has_duplicates: false,
            review_keepers: Vec::new(),
        }
    }
}

impl Default for ImageProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A keeper parked in the review folder
#[derive(Debug)]
struct ReviewKeeper {
    hash: String,
    review_path: PathBuf,
    target: PathBuf,
}

/// Hashes, reconciles and updates the images of one directory
pub struct ImageProcessor {
    config: ProcessorConfig,
    images: ImageMap,
    status: Arc<ProcessStatus>,
    opener: Box<dyn FolderOpener>,
    state: ProcessState,
    reconciliation: Option<ReconciliationResult>,
    has_duplicates: bool,
    review_keepers: Vec<ReviewKeeper>,
}

impl ImageProcessor {
    /// Create a new processor builder
    pub fn builder() -> ImageProcessorBuilder {
        ImageProcessorBuilder::new()
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Live counters for this run
    pub fn status(&self) -> &Arc<ProcessStatus> {
        &self.status
    }

    /// Whether reconciliation found any duplicate group
    pub fn has_duplicates(&self) -> bool {
        self.has_duplicates
    }

    pub fn review_dir(&self) -> PathBuf {
        self.config.working_dir.join(&self.config.review_dir_name)
    }

    /// Hash and reconcile, then delete duplicates and rename survivors
    pub fn process_all(&mut self, use_buffer_hint: bool) -> Result<()> {
        self.process_images(use_buffer_hint)?;
        self.update_images()
    }

    /// Hash every image and reconcile the results.
    ///
    /// The first file that fails to hash aborts the run before anything on
    /// disk is touched.
    pub fn process_images(&mut self, use_buffer_hint: bool) -> Result<()> {
        self.require("process images", ProcessState::Idle)?;

        let started = Instant::now();
        let result = self.hash_and_filter(use_buffer_hint);
        self.status.record(Timing::Total, started.elapsed());

        match result {
            Ok(reconciliation) => {
                info!(
                    survivors = reconciliation.survivors.len(),
                    duplicate_groups = reconciliation.duplicate_groups.len(),
                    "reconciled hashes"
                );
                self.has_duplicates = reconciliation.has_duplicates();
                self.reconciliation = Some(reconciliation);
                self.status.finish_hashing();
                self.transition(ProcessState::Filtered);
                Ok(())
            }
            Err(err) => {
                self.status.fail_hashing(err.to_string());
                self.transition(ProcessState::Failed);
                Err(err)
            }
        }
    }

    /// Like [`process_images`](Self::process_images), then move every
    /// duplicate group into the review folder.
    ///
    /// Keepers are remembered so [`restore_from_review`](Self::restore_from_review)
    /// can bring them back. Without duplicates the processor stays ready for
    /// a plain update.
    pub fn process_images_for_review(&mut self, use_buffer_hint: bool) -> Result<()> {
        self.process_images(use_buffer_hint)?;

        if !self.has_duplicates {
            debug!("no duplicates to review");
            return Ok(());
        }

        let started = Instant::now();
        let result = self.move_duplicates_to_review();
        self.status.record(Timing::Total, started.elapsed());

        match result {
            Ok(()) => {
                self.transition(ProcessState::AwaitingReview);
                self.reveal_review_dir();
                Ok(())
            }
            Err(err) => {
                self.status.fail_updating(err.to_string());
                self.transition(ProcessState::Failed);
                Err(err)
            }
        }
    }

    /// Move the keepers back under their canonical names and delete the
    /// review folder with everything still in it.
    pub fn restore_from_review(&mut self) -> Result<()> {
        self.require("restore from review", ProcessState::AwaitingReview)?;

        let started = Instant::now();
        let result = self.restore_keepers();
        self.status.record(Timing::Total, started.elapsed());

        match result {
            Ok(()) => {
                self.transition(ProcessState::Reviewed);
                Ok(())
            }
            Err(err) => {
                self.status.fail_updating(err.to_string());
                self.transition(ProcessState::Failed);
                Err(err)
            }
        }
    }

    /// Apply the reconciliation to disk.
    ///
    /// Every queued operation runs even if some fail; the first failure is
    /// returned once the pool has drained. Nothing is rolled back.
    pub fn update_images(&mut self) -> Result<()> {
        if !self.state.can_update() {
            return Err(self.invalid_state("update images"));
        }
        let reviewed = self.state == ProcessState::Reviewed;
        let Some(reconciliation) = self.reconciliation.take() else {
            return Err(self.invalid_state("update images"));
        };

        self.transition(ProcessState::Updating);
        let started = Instant::now();

        let operations = if reviewed {
            self.plan_renames(reconciliation.survivors)
        } else {
            self.plan_direct_update(reconciliation)
        };
        self.status.begin_updating(operations.len());

        let result = self.run_file_operations(operations);

        let elapsed = started.elapsed();
        self.status.record(Timing::Update, elapsed);
        self.status.record(Timing::Total, elapsed);
        self.status.finish_updating();

        match result {
            Ok(()) => {
                info!(
                    dupes = self.status.dupe_images(),
                    renamed = self.status.new_images(),
                    "updated images"
                );
                self.transition(ProcessState::Done);
                Ok(())
            }
            Err(err) => {
                self.status.fail_updating(err.to_string());
                self.transition(ProcessState::Failed);
                Err(err)
            }
        }
    }

    fn hash_and_filter(&mut self, use_buffer_hint: bool) -> Result<ReconciliationResult> {
        if self.images.is_empty() {
            return Err(ProcessError::NoImages.into());
        }

        self.status.begin_hashing(self.images.len());
        self.transition(ProcessState::Hashing);

        let buffer_size = if use_buffer_hint {
            self.mean_file_size()?
        } else {
            0
        };

        let mut results = self.hash_images(buffer_size)?;

        // A missing hash could make a duplicate look unique
        if let Some(error) = results.take_first_error() {
            return Err(error.into());
        }

        self.transition(ProcessState::Filtering);
        let started = Instant::now();
        let reconciliation = reconcile(results);
        self.status.record(Timing::Filter, started.elapsed());

        Ok(reconciliation)
    }

    /// Mean size of every entry in the working directory
    fn mean_file_size(&self) -> Result<u64> {
        let started = Instant::now();
        let dir = &self.config.working_dir;
        let analyze_error = |source: io::Error| ProcessError::Analyze {
            path: dir.clone(),
            source,
        };

        let mut total = 0u64;
        let mut count = 0u64;
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| analyze_error(err.into()))?;
            let metadata = entry.metadata().map_err(|err| analyze_error(err.into()))?;
            total += metadata.len();
            count += 1;
        }

        self.status.record(Timing::Analyze, started.elapsed());

        let mean = if count == 0 { 0 } else { total / count };
        debug!(mean, entries = count, "analyzed file sizes");
        Ok(mean)
    }

    fn hash_images(&self, buffer_size: u64) -> Result<HashResultSet> {
        let started = Instant::now();

        let sink = Arc::new(HashAccumulator::new());
        let observer: Arc<dyn ProgressObserver> = self.status.clone();
        let hasher = HasherConfig::new()
            .prefix(self.config.prefix.as_str())
            .length(self.config.hash_length)
            .threads(self.thread_count())
            .queue_size(self.images.len().max(MIN_QUEUE_CAPACITY))
            .buffer_size(buffer_size)
            .sink(Arc::clone(&sink))
            .observer(observer)
            .build()?;

        for (file_name, cache_status) in &self.images {
            let path = self.config.working_dir.join(file_name);
            hasher.submit(file_name.clone(), *cache_status, path);
        }
        hasher.wait();

        self.status.record(Timing::Hash, started.elapsed());
        Ok(sink.take())
    }

    /// Deletes every non-keeper that is not cached, then renames survivors
    fn plan_direct_update(&self, reconciliation: ReconciliationResult) -> Vec<FileOperation> {
        let ReconciliationResult {
            mut survivors,
            duplicate_groups,
        } = reconciliation;

        let mut operations = Vec::new();
        for (hash, group) in duplicate_groups {
            for outcome in group {
                if outcome.novel {
                    survivors.insert(hash.clone(), outcome);
                } else if !outcome.cached {
                    operations.push(FileOperation::Delete(outcome.path));
                }
            }
        }

        let dupes = operations.len();
        operations.extend(self.plan_renames(survivors));

        self.status.set_dupe_images(dupes);
        self.status.set_new_images(operations.len() - dupes);
        operations
    }

    /// Renames for survivors that are new and not yet at their canonical name
    fn plan_renames(&self, survivors: HashMap<String, HashOutcome>) -> Vec<FileOperation> {
        survivors
            .into_values()
            .filter(|outcome| !outcome.cached)
            .filter_map(|outcome| {
                let to = target_path(&self.config.prefix, &outcome.hash, &outcome.path);
                if outcome.path == to {
                    None
                } else {
                    Some(FileOperation::Rename {
                        from: outcome.path,
                        to,
                    })
                }
            })
            .collect()
    }

    fn run_file_operations(&self, operations: Vec<FileOperation>) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }

        let pool = WorkerPool::new(
            self.thread_count(),
            operations.len().max(MIN_QUEUE_CAPACITY),
        )?;
        let errors: Arc<Mutex<Vec<ProcessError>>> = Arc::default();

        for operation in operations {
            let errors = Arc::clone(&errors);
            let status = Arc::clone(&self.status);
            pool.submit(move || {
                if let Err(error) = operation.apply() {
                    warn!(%error, "file update failed");
                    errors
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(error);
                }
                status.on_progress(ProgressKind::Updated);
            });
        }
        pool.wait();

        let errors = mem::take(&mut *errors.lock().unwrap_or_else(PoisonError::into_inner));
        match errors.into_iter().next() {
            Some(first) => Err(first.into()),
            None => Ok(()),
        }
    }

    fn move_duplicates_to_review(&mut self) -> Result<()> {
        let review_dir = self.review_dir();
        fs::create_dir_all(&review_dir).map_err(|source| ProcessError::Review {
            path: review_dir.clone(),
            source,
        })?;

        let Some(reconciliation) = self.reconciliation.as_mut() else {
            return Err(ProcessError::InvalidState {
                operation: "move duplicates to review",
                state: self.state,
            }
            .into());
        };

        // A folder left by an aborted run may already hold these names
        for (hash, group) in &reconciliation.duplicate_groups {
            for (index, outcome) in group.iter().enumerate() {
                let review_path = review_dir.join(review_name(hash, index + 1, &outcome.path));
                if review_path.exists() {
                    return Err(ProcessError::Review {
                        path: review_path,
                        source: io::Error::new(
                            io::ErrorKind::AlreadyExists,
                            "review folder already holds this file",
                        ),
                    }
                    .into());
                }
            }
        }

        let mut dupes = 0;
        for (hash, group) in mem::take(&mut reconciliation.duplicate_groups) {
            for (index, mut outcome) in group.into_iter().enumerate() {
                let review_path = review_dir.join(review_name(&hash, index + 1, &outcome.path));
                fs::rename(&outcome.path, &review_path).map_err(|source| {
                    ProcessError::Review {
                        path: outcome.path.clone(),
                        source,
                    }
                })?;

                if outcome.novel {
                    let target = target_path(&self.config.prefix, &hash, &outcome.path);
                    self.review_keepers.push(ReviewKeeper {
                        hash: hash.clone(),
                        review_path: review_path.clone(),
                        target,
                    });
                    outcome.path = review_path;
                    reconciliation.survivors.insert(hash.clone(), outcome);
                } else {
                    dupes += 1;
                }
            }
        }

        let new_images = reconciliation
            .survivors
            .values()
            .filter(|outcome| !outcome.cached)
            .count();
        self.status.set_dupe_images(dupes);
        self.status.set_new_images(new_images);

        info!(
            dir = %review_dir.display(),
            dupes,
            keepers = self.review_keepers.len(),
            "moved duplicates to review"
        );
        Ok(())
    }

    fn restore_keepers(&mut self) -> Result<()> {
        for keeper in mem::take(&mut self.review_keepers) {
            fs::rename(&keeper.review_path, &keeper.target).map_err(|source| {
                ProcessError::Restore {
                    path: keeper.review_path.clone(),
                    source,
                }
            })?;

            if let Some(outcome) = self
                .reconciliation
                .as_mut()
                .and_then(|r| r.survivors.get_mut(&keeper.hash))
            {
                outcome.path = keeper.target;
            }
        }

        let review_dir = self.review_dir();
        fs::remove_dir_all(&review_dir).map_err(|source| ProcessError::Restore {
            path: review_dir.clone(),
            source,
        })?;

        info!(dir = %review_dir.display(), "restored keepers and removed review folder");
        Ok(())
    }

    fn reveal_review_dir(&self) {
        if !self.config.open_review_dir {
            return;
        }
        let dir = self.review_dir();
        if let Err(error) = self.opener.open(&dir) {
            warn!(dir = %dir.display(), %error, "could not open review folder");
        }
    }

    fn thread_count(&self) -> usize {
        self.config.threads.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(MIN_THREADS)
                .max(MIN_THREADS)
        })
    }

    fn require(&self, operation: &'static str, expected: ProcessState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &'static str) -> HashimgError {
        ProcessError::InvalidState {
            operation,
            state: self.state,
        }
        .into()
    }

    fn transition(&mut self, state: ProcessState) {
        debug!(from = %self.state, to = %state, "processor state changed");
        self.state = state;
        self.status.set_state(state);
    }
}
