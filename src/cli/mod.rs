//! # CLI Module
//!
//! Command-line front end for hashimg.
//!
//! ## Usage
//! ```bash
//! # Delete duplicates in the current directory and rename the rest
//! hashimg
//!
//! # Park duplicates in a review folder first
//! hashimg ~/Pictures --review
//!
//! # Shorter names, JSON summary
//! hashimg ~/Pictures --length 12 --output json
//! ```

use clap::{Parser, ValueEnum};
use console::{style, Term};
use hashimg::core::processor::{
    ImageProcessor, DEFAULT_HASH_LENGTH, DEFAULT_PREFIX, DEFAULT_REVIEW_DIR,
};
use hashimg::core::status::StatusSnapshot;
use hashimg::core::{map_images, ProcessStatus};
use hashimg::error::{HashimgError, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Deduplicate a folder of images and rename the rest by content hash
#[derive(Parser, Debug)]
#[command(name = "hashimg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to process
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Prefix of renamed images
    #[arg(short, long, default_value = DEFAULT_PREFIX)]
    prefix: String,

    /// Hex characters kept from each hash (10-64)
    #[arg(short, long, default_value_t = DEFAULT_HASH_LENGTH)]
    length: usize,

    /// Move duplicates to a review folder before deleting them
    #[arg(short, long)]
    review: bool,

    /// Name of the review folder
    #[arg(long, default_value = DEFAULT_REVIEW_DIR)]
    review_dir: String,

    /// Do not open the review folder in the file browser
    #[arg(long)]
    no_open: bool,

    /// Size read buffers from the mean file size
    #[arg(short, long)]
    buffer: bool,

    /// Skip the review confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Worker threads per phase (default: one per CPU)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Output format
    #[arg(short, long, default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// Status snapshot as JSON for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let term = Term::stderr();
    let pretty = cli.output == OutputFormat::Pretty;

    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("hashimg").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let images = match map_images(&cli.dir, &cli.prefix) {
        Ok(images) => images,
        Err(err) => {
            let err = HashimgError::from(err);
            if err.is_no_images() {
                term.write_line(&format!(
                    "  {} No images found in {}",
                    style("○").dim(),
                    cli.dir.display()
                ))
                .ok();
                return Ok(());
            }
            return Err(err);
        }
    };

    let status = Arc::new(ProcessStatus::new());
    let mut builder = ImageProcessor::builder()
        .working_dir(&cli.dir)
        .prefix(cli.prefix.as_str())
        .hash_length(cli.length)
        .review_dir_name(cli.review_dir.as_str())
        .open_review_dir(!cli.no_open)
        .images(images)
        .status(Arc::clone(&status));
    if let Some(threads) = cli.threads {
        builder = builder.threads(threads);
    }
    let processor = builder.build();

    let progress = ProgressView::new(pretty);
    let buffer = cli.buffer;

    let processor = if cli.review {
        let (mut processor, result) = run_in_background(processor, &status, &progress, move |p| {
            p.process_images_for_review(buffer)
        });
        result?;

        if processor.state().can_update() {
            processor
        } else {
            if !cli.yes {
                confirm_review(&term, &processor)?;
            }
            processor.restore_from_review()?;
            processor
        }
    } else {
        let (processor, result) =
            run_in_background(processor, &status, &progress, move |p| p.process_images(buffer));
        result?;
        processor
    };

    let (_processor, result) =
        run_in_background(processor, &status, &progress, ImageProcessor::update_images);
    drop(progress);
    result?;

    let snapshot = status.snapshot();
    match cli.output {
        OutputFormat::Pretty => print_pretty_summary(&term, &snapshot),
        OutputFormat::Json => print_json_summary(&snapshot)?,
    }

    Ok(())
}

/// Runs one phase on a worker thread while the foreground polls `status`
fn run_in_background<F>(
    mut processor: ImageProcessor,
    status: &ProcessStatus,
    progress: &ProgressView,
    phase: F,
) -> (ImageProcessor, Result<()>)
where
    F: FnOnce(&mut ImageProcessor) -> Result<()> + Send + 'static,
{
    let handle = thread::spawn(move || {
        let result = phase(&mut processor);
        (processor, result)
    });

    while !handle.is_finished() {
        progress.refresh(status);
        thread::sleep(POLL_INTERVAL);
    }
    progress.refresh(status);

    match handle.join() {
        Ok(outcome) => outcome,
        Err(payload) => panic::resume_unwind(payload),
    }
}

fn confirm_review(term: &Term, processor: &ImageProcessor) -> Result<()> {
    term.write_line(&format!(
        "  {} duplicates moved to {}",
        style(processor.status().dupe_images()).cyan(),
        style(processor.review_dir().display()).bold()
    ))
    .ok();
    term.write_line(&format!(
        "  {}",
        style("Press Enter to keep the originals and discard the rest").yellow()
    ))
    .ok();

    term.read_line()
        .map(|_| ())
        .map_err(|err| HashimgError::Output(format!("Failed to read confirmation: {err}")))
}

/// Hash and update bars driven from a polled [`ProcessStatus`]
struct ProgressView {
    _multi: MultiProgress,
    hash: ProgressBar,
    update: ProgressBar,
}

impl ProgressView {
    fn new(visible: bool) -> Self {
        let multi = MultiProgress::with_draw_target(if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        });

        let bar_style = ProgressStyle::with_template(
            "{spinner:.green} {prefix:>8} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");

        let hash = multi.add(ProgressBar::new(0).with_style(bar_style.clone()));
        hash.set_prefix("hashing");
        let update = multi.add(ProgressBar::new(0).with_style(bar_style));
        update.set_prefix("updating");

        Self {
            _multi: multi,
            hash,
            update,
        }
    }

    fn refresh(&self, status: &ProcessStatus) {
        self.hash.set_length(status.max_hash_progress() as u64);
        self.hash.set_position(status.hash_progress() as u64);
        if status.is_hash_done() && !self.hash.is_finished() {
            self.hash
                .finish_with_message(format!("{} cached", status.cached_images()));
        }

        self.update.set_length(status.max_update_progress() as u64);
        self.update.set_position(status.update_progress() as u64);
        if status.is_update_done() && !self.update.is_finished() {
            self.update.finish();
        }
    }

    fn finish(&self) {
        self.hash.finish_and_clear();
        self.update.finish_and_clear();
    }
}

impl Drop for ProgressView {
    // An early `?` in `run` must not leave half-drawn bars behind
    fn drop(&mut self) {
        self.finish();
    }
}

fn print_pretty_summary(term: &Term, snapshot: &StatusSnapshot) {
    term.write_line("").ok();
    term.write_line(&format!("{} Done", style("✓").green().bold())).ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} images hashed in {}",
        style(snapshot.total_images).cyan(),
        format_millis(snapshot.hash_ms)
    ))
    .ok();
    term.write_line(&format!(
        "  {} already named by hash",
        style(snapshot.cached_images).dim()
    ))
    .ok();
    term.write_line(&format!(
        "  {} duplicates removed",
        style(snapshot.dupe_images).yellow()
    ))
    .ok();
    term.write_line(&format!(
        "  {} images renamed in {}",
        style(snapshot.new_images).cyan(),
        format_millis(snapshot.update_ms)
    ))
    .ok();

    if snapshot.analyze_ms > 0 {
        term.write_line(&format!(
            "  {} spent sizing buffers",
            style(format_millis(snapshot.analyze_ms)).dim()
        ))
        .ok();
    }

    term.write_line("").ok();
    term.write_line(&format!(
        "{}",
        style(format!("Total time: {}", format_millis(snapshot.total_ms))).dim()
    ))
    .ok();
}

fn print_json_summary(snapshot: &StatusSnapshot) -> Result<()> {
    let output = serde_json::to_string_pretty(snapshot)
        .map_err(|err| HashimgError::Output(err.to_string()))?;
    println!("{output}");
    Ok(())
}

fn format_millis(millis: u64) -> String {
    if millis >= 1000 {
        format!("{:.1}s", millis as f64 / 1000.0)
    } else {
        format!("{millis}ms")
    }
}
