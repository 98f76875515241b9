//! # hashimg CLI
//!
//! Command-line interface for the image deduplicator.
//!
//! ## Usage
//! ```bash
//! hashimg ~/Pictures/wallpapers
//! hashimg ~/Pictures/wallpapers --review --length 24
//! ```

mod cli;

use hashimg::Result;

fn main() -> Result<()> {
    hashimg::init_tracing();
    cli::run()
}
