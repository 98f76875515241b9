//! # Processor Module
//!
//! Drives a full deduplication run over one working directory.
//!
//! ## Phases
//! 1. **Hash** - Hash every image on a worker pool (optionally sizing the
//!    read buffer from the mean file size first)
//! 2. **Filter** - Reconcile hashes into survivors and duplicate groups
//! 3. **Update** - Delete duplicates and rename survivors, again on a pool
//!
//! ## Review Mode
//! Instead of deleting straight away, duplicates (keepers included) can be
//! moved into a review folder for the user to inspect. Restoring brings the
//! keepers back under their canonical names and discards the folder; the
//! update phase then only renames.
//!
//! ## Example
//! ```rust,ignore
//! let mut processor = ImageProcessor::builder()
//!     .working_dir(dir)
//!     .images(map_images(&dir, "0x@")?)
//!     .build();
//!
//! processor.process_all(true)?;
//! println!("{} duplicates removed", processor.status().dupe_images());
//! ```

mod executor;
mod operations;
mod state;

pub use executor::{
    ImageProcessor, ImageProcessorBuilder, ProcessorConfig, DEFAULT_HASH_LENGTH, DEFAULT_PREFIX,
    DEFAULT_REVIEW_DIR,
};
pub use operations::canonical_name;
pub use state::ProcessState;
