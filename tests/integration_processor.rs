//! Integration tests for the image processor.
//!
//! These tests run whole passes over real directories:
//! - Direct updates (delete duplicates, rename survivors)
//! - Review mode (relocate, restore, rename)
//! - Re-running over already processed folders

use assert_fs::prelude::*;
use assert_fs::TempDir;
use hashimg::core::processor::{ProcessState, DEFAULT_PREFIX, DEFAULT_REVIEW_DIR};
use hashimg::core::{map_images, ImageProcessor, ProcessStatus};
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

fn sha256(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn write_files(temp: &TempDir, files: &[(&str, &str)]) {
    for (name, content) in files {
        temp.child(name).write_str(content).unwrap();
    }
}

/// Sorted file names in `dir`
fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn sorted(names: &[&str]) -> Vec<String> {
    let mut names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
    names.sort();
    names
}

fn processor(dir: &Path, hash_length: usize) -> ImageProcessor {
    ImageProcessor::builder()
        .working_dir(dir)
        .images(map_images(dir, DEFAULT_PREFIX).unwrap())
        .hash_length(hash_length)
        .open_review_dir(false)
        .build()
}

fn process_all(dir: &Path, hash_length: usize) -> ImageProcessor {
    let mut processor = processor(dir, hash_length);
    processor.process_all(false).unwrap();
    processor
}

fn assert_update_complete(processor: &ImageProcessor) {
    let status = processor.status();
    assert_eq!(status.update_progress(), status.max_update_progress());
    assert_eq!(status.hash_progress(), status.max_hash_progress());
    assert_eq!(processor.state(), ProcessState::Done);
}

#[test]
fn identical_pair_keeps_one_renamed_copy() {
    let temp = TempDir::new().unwrap();
    write_files(&temp, &[("a.png", "hello"), ("b.png", "hello")]);

    let processor = process_all(temp.path(), 10);

    assert_eq!(listing(temp.path()), vec!["0x@2cf24dba5f.png"]);
    temp.child("0x@2cf24dba5f.png").assert("hello");
    assert_eq!(processor.status().dupe_images(), 1);
    assert_eq!(processor.status().new_images(), 1);
    assert_update_complete(&processor);
}

#[test]
fn new_copy_of_cached_image_is_deleted() {
    let temp = TempDir::new().unwrap();
    let hash = &sha256("hello")[..10];
    let cached = format!("0x@{hash}.png");
    // Cached content is never read, so it need not match its name
    write_files(&temp, &[(cached.as_str(), "stale bytes"), ("x.jpg", "hello")]);

    let processor = process_all(temp.path(), 10);

    assert_eq!(listing(temp.path()), vec![cached.clone()]);
    temp.child(&cached).assert("stale bytes");
    assert_eq!(processor.status().dupe_images(), 1);
    assert_eq!(processor.status().new_images(), 0);
    assert_eq!(processor.status().cached_images(), 1);
}

#[test]
fn empty_image_map_touches_nothing() {
    let temp = TempDir::new().unwrap();
    write_files(&temp, &[("notes.txt", "hello")]);

    let mut processor = ImageProcessor::builder()
        .working_dir(temp.path())
        .open_review_dir(false)
        .build();

    let err = processor.process_all(false).unwrap_err();
    assert!(err.is_no_images());
    assert_eq!(listing(temp.path()), vec!["notes.txt"]);

    let err = map_images(temp.path(), DEFAULT_PREFIX).unwrap_err();
    assert!(hashimg::HashimgError::from(err).is_no_images());
}

#[test]
fn distinct_files_are_all_renamed() {
    let temp = TempDir::new().unwrap();
    let files: Vec<(String, String)> = (0..10)
        .map(|i| (format!("img{i}.jpg"), format!("content {i}")))
        .collect();
    for (name, content) in &files {
        temp.child(name).write_str(content).unwrap();
    }

    let processor = process_all(temp.path(), 16);

    let mut expected: Vec<String> = files
        .iter()
        .map(|(_, content)| format!("0x@{}.jpg", &sha256(content)[..16]))
        .collect();
    expected.sort();
    assert_eq!(listing(temp.path()), expected);
    assert_eq!(processor.status().dupe_images(), 0);
    assert_eq!(processor.status().new_images(), 10);
    assert_update_complete(&processor);
}

#[test]
fn review_keeps_one_restored_copy() {
    let temp = TempDir::new().unwrap();
    write_files(
        &temp,
        &[("a.png", "hello"), ("b.png", "hello"), ("c.png", "hello")],
    );
    let review = temp.child(DEFAULT_REVIEW_DIR);

    let mut processor = processor(temp.path(), 10);
    processor.process_images_for_review(false).unwrap();

    assert_eq!(processor.state(), ProcessState::AwaitingReview);
    review.assert(predicate::path::is_dir());
    assert_eq!(
        listing(review.path()),
        vec!["2cf24dba5f_1.png", "2cf24dba5f_2.png", "2cf24dba5f_3.png"]
    );
    assert_eq!(listing(temp.path()), vec![DEFAULT_REVIEW_DIR]);
    assert_eq!(processor.status().dupe_images(), 2);
    assert_eq!(processor.status().new_images(), 1);

    processor.restore_from_review().unwrap();
    assert_eq!(processor.state(), ProcessState::Reviewed);
    review.assert(predicate::path::missing());

    processor.update_images().unwrap();
    assert_eq!(listing(temp.path()), vec!["0x@2cf24dba5f.png"]);
    temp.child("0x@2cf24dba5f.png").assert("hello");
    assert_update_complete(&processor);
}

#[test]
fn extensions_are_lowercased() {
    let temp = TempDir::new().unwrap();
    write_files(&temp, &[("test1.PNG", "test1"), ("test2.JPG", "test2")]);

    let processor = process_all(temp.path(), 32);

    assert_eq!(
        listing(temp.path()),
        sorted(&[
            "0x@1b4f0e9851971998e732078544c96b36.png",
            "0x@60303ae22b998861bce3b28f33eec1be.jpg",
        ])
    );
    assert_eq!(processor.status().max_update_progress(), 2);
    assert_update_complete(&processor);
}

#[test]
fn images_already_named_by_hash_are_left_alone() {
    let temp = TempDir::new().unwrap();
    write_files(
        &temp,
        &[
            ("0x@1b4f0e9851971998e732078544c96b36.png", "test1"),
            ("test2.png", "test2"),
            ("test3.png", "test3"),
            ("test4.bmp", "test4"),
        ],
    );

    let processor = process_all(temp.path(), 32);

    assert_eq!(
        listing(temp.path()),
        sorted(&[
            "0x@1b4f0e9851971998e732078544c96b36.png",
            "0x@60303ae22b998861bce3b28f33eec1be.png",
            "0x@fd61a03af4f77d870fc21e05e7e80678.png",
            "0x@a4e624d686e03ed2767c0abd85c14426.bmp",
        ])
    );
    assert_eq!(processor.status().dupe_images(), 0);
    assert_eq!(processor.status().update_progress(), 3);
    assert_update_complete(&processor);
}

#[test]
fn duplicate_images_are_deleted() {
    let temp = TempDir::new().unwrap();
    write_files(
        &temp,
        &[
            ("test1.png", "test1"),
            ("test2.png", "test1"),
            ("test3.png", "test1"),
            ("test4.bmp", "test4"),
            ("test5.bmp", "test4"),
            ("test6.png", "test1"),
            ("test7.bmp", "test4"),
            ("test8.bmp", "test4"),
        ],
    );

    let processor = process_all(temp.path(), 32);

    assert_eq!(
        listing(temp.path()),
        sorted(&[
            "0x@1b4f0e9851971998e732078544c96b36.png",
            "0x@a4e624d686e03ed2767c0abd85c14426.bmp",
        ])
    );
    assert_eq!(processor.status().dupe_images(), 6);
    assert_eq!(processor.status().update_progress(), 8);
    assert_update_complete(&processor);
}

#[test]
fn handles_a_large_mixed_folder() {
    let temp = TempDir::new().unwrap();
    write_files(
        &temp,
        &[
            ("test1.bmp", "test3"),
            ("test2.png", "test2"),
            ("0x@fd61a03af4f77d870fc21e05e7e80678.png", "test3"),
            ("test4.bmp", "test4"),
            ("test5.png", "test2"),
            ("test6.bmp", "test3"),
            ("test7.bmp", "test7"),
            ("test8.bmp", "test8"),
            ("test9.bmp", "test9"),
            ("bad_file1.txt", "bad_file1"),
            ("test10.png", "test2"),
            ("test11.bmp", "test11"),
            ("test12.bmp", "test12"),
            ("test13.bmp", "test3"),
            ("bad_file2.exe", "bad_file2"),
            ("test14.bmp", "test14"),
            ("test15.bmp", "test15"),
            ("bad_file3.c", "bad_file3"),
        ],
    );

    let processor = process_all(temp.path(), 32);

    assert_eq!(
        listing(temp.path()),
        sorted(&[
            "0x@fd61a03af4f77d870fc21e05e7e80678.png",
            "0x@60303ae22b998861bce3b28f33eec1be.png",
            "0x@a4e624d686e03ed2767c0abd85c14426.bmp",
            "0x@bd7c911264aae15b66d4291b6850829a.bmp",
            "0x@1f9bfeb15fee8a10c4d0711c7eb0c083.bmp",
            "0x@b4451034d3b6590060ce9484a28b88dd.bmp",
            "0x@744ea9ec6fa0a83e9764b4e323d5be6b.bmp",
            "0x@a98ec5c5044800c88e862f007b98d898.bmp",
            "0x@40cca5cc13abf91c7d5a72c0aea9bcbe.bmp",
            "0x@ebb39b342baead7aa52c0bcd6c0d4ba0.bmp",
            "bad_file1.txt",
            "bad_file2.exe",
            "bad_file3.c",
        ])
    );
    let status = processor.status();
    assert_eq!(status.total_images(), 15);
    assert_eq!(status.cached_images(), 1);
    assert_eq!(status.dupe_images(), 5);
    assert_eq!(status.update_progress(), 14);
    assert_update_complete(&processor);
}

#[test]
fn second_run_changes_nothing() {
    let temp = TempDir::new().unwrap();
    write_files(
        &temp,
        &[
            ("a.jpg", "one"),
            ("b.JPG", "one"),
            ("c.png", "two"),
            ("d.gif", "three"),
        ],
    );

    process_all(temp.path(), 12);
    let first = listing(temp.path());
    assert_eq!(first.len(), 3);

    let second = process_all(temp.path(), 12);
    assert_eq!(listing(temp.path()), first);

    let status = second.status();
    assert_eq!(status.cached_images(), 3);
    assert_eq!(status.dupe_images(), 0);
    assert_eq!(status.new_images(), 0);
    assert_eq!(status.max_update_progress(), 0);
    assert!(!second.has_duplicates());
}

#[test]
fn cached_duplicates_survive_review() {
    let temp = TempDir::new().unwrap();
    let hash = sha256("0");
    let cached = format!("0x@{hash}.jpg");
    write_files(&temp, &[(cached.as_str(), "0"), ("t0.jpg", "0")]);

    let mut processor = processor(temp.path(), 64);
    processor.process_images_for_review(false).unwrap();

    let review = temp.child(DEFAULT_REVIEW_DIR);
    assert_eq!(
        listing(review.path()),
        sorted(&[
            format!("{hash}_1.jpg").as_str(),
            format!("{hash}_2.jpg").as_str(),
        ])
    );
    assert_eq!(processor.status().dupe_images(), 1);
    assert_eq!(processor.status().new_images(), 0);

    processor.restore_from_review().unwrap();
    processor.update_images().unwrap();

    assert_eq!(listing(temp.path()), vec![cached.clone()]);
    temp.child(&cached).assert("0");
    assert_eq!(processor.status().max_update_progress(), 0);
}

#[test]
fn review_mixes_cached_and_new_groups() {
    let temp = TempDir::new().unwrap();
    let cached: Vec<String> = ["0", "1", "2"]
        .iter()
        .map(|content| format!("0x@{}.jpg", sha256(content)))
        .collect();
    let mut files: Vec<(String, &str)> = cached
        .iter()
        .cloned()
        .zip(["0", "1", "2"])
        .collect();
    let new_contents = [
        "0", "0", "0", "0", "1", "1", "1", "2", "2", "2", "2", "3", "3", "3",
    ];
    for (i, content) in new_contents.into_iter().enumerate() {
        files.push((format!("t{}.jpg", i + 1), content));
    }
    for (name, content) in &files {
        temp.child(name).write_str(content).unwrap();
    }

    let mut processor = processor(temp.path(), 64);
    processor.process_images_for_review(false).unwrap();

    assert_eq!(listing(temp.child(DEFAULT_REVIEW_DIR).path()).len(), 17);
    assert_eq!(processor.status().dupe_images(), 13);
    assert_eq!(processor.status().new_images(), 1);

    processor.restore_from_review().unwrap();
    processor.update_images().unwrap();

    let mut expected = cached.clone();
    expected.push(format!("0x@{}.jpg", sha256("3")));
    expected.sort();
    assert_eq!(listing(temp.path()), expected);
    assert_update_complete(&processor);
}

#[test]
fn review_leaves_unique_files_for_the_update() {
    let temp = TempDir::new().unwrap();
    let cached = format!("0x@{}.jpg", sha256("0"));
    let cached_dupe = format!("0x@{}.jpg", sha256("3"));
    write_files(
        &temp,
        &[
            (cached.as_str(), "0"),
            ("t5.jpg", "5"),
            ("t6.jpg", "6"),
            (cached_dupe.as_str(), "3"),
            ("t0.jpg", "3"),
            ("t1.jpg", "3"),
            ("t2.jpg", "4"),
            ("t3.jpg", "4"),
        ],
    );

    let mut processor = processor(temp.path(), 64);
    processor.process_images_for_review(false).unwrap();

    assert_eq!(
        listing(temp.path()),
        sorted(&[cached.as_str(), "t5.jpg", "t6.jpg", DEFAULT_REVIEW_DIR])
    );
    assert_eq!(processor.status().dupe_images(), 3);
    assert_eq!(processor.status().new_images(), 3);

    processor.restore_from_review().unwrap();
    processor.update_images().unwrap();

    let four = format!("0x@{}.jpg", sha256("4"));
    let five = format!("0x@{}.jpg", sha256("5"));
    let six = format!("0x@{}.jpg", sha256("6"));
    assert_eq!(
        listing(temp.path()),
        sorted(&[
            cached.as_str(),
            cached_dupe.as_str(),
            four.as_str(),
            five.as_str(),
            six.as_str(),
        ])
    );
    // The restored keeper is already at its final name
    assert_eq!(processor.status().max_update_progress(), 2);
    assert_update_complete(&processor);
}

#[test]
fn update_is_rejected_while_awaiting_review() {
    let temp = TempDir::new().unwrap();
    write_files(&temp, &[("a.png", "hello"), ("b.png", "hello")]);

    let mut processor = processor(temp.path(), 10);
    processor.process_images_for_review(false).unwrap();

    assert!(processor.update_images().is_err());
    assert_eq!(processor.state(), ProcessState::AwaitingReview);
    temp.child(DEFAULT_REVIEW_DIR)
        .child("2cf24dba5f_1.png")
        .assert(predicate::path::exists());
}

#[test]
fn hashes_match_with_and_without_buffer_hint() {
    let plain = TempDir::new().unwrap();
    let buffered = TempDir::new().unwrap();
    let large = "x".repeat(64 * 1024);
    for temp in [&plain, &buffered] {
        write_files(temp, &[("big.png", large.as_str()), ("small.png", "hello")]);
    }

    process_all(plain.path(), 20);
    let mut processor = processor(buffered.path(), 20);
    processor.process_all(true).unwrap();

    assert_eq!(listing(plain.path()), listing(buffered.path()));
    buffered
        .child(format!("0x@{}.png", &sha256(&large)[..20]))
        .assert(predicate::path::is_file());
}

/// 400 images over 150 distinct contents: 250 duplicates
fn write_many(temp: &TempDir) {
    for i in 0..400 {
        temp.child(format!("img_{i:03}.png"))
            .write_str(&format!("image-{}", i % 150))
            .unwrap();
    }
}

/// Poll `status` until `stop` is set, counting every snapshot where a
/// counter went backwards or passed its maximum.
fn watch_progress(status: Arc<ProcessStatus>, stop: Arc<AtomicBool>) -> JoinHandle<usize> {
    thread::spawn(move || {
        let mut violations = 0;
        let (mut last_hash, mut last_update) = (0, 0);

        loop {
            let finished = stop.load(Ordering::SeqCst);
            let snapshot = status.snapshot();

            if snapshot.hash_progress < last_hash
                || snapshot.hash_progress > snapshot.max_hash_progress
            {
                violations += 1;
            }
            if snapshot.update_progress < last_update
                || snapshot.update_progress > snapshot.max_update_progress
            {
                violations += 1;
            }
            last_hash = snapshot.hash_progress;
            last_update = snapshot.update_progress;

            if finished {
                return violations;
            }
            thread::yield_now();
        }
    })
}

fn watched_processor(dir: &Path, status: &Arc<ProcessStatus>) -> ImageProcessor {
    ImageProcessor::builder()
        .working_dir(dir)
        .images(map_images(dir, DEFAULT_PREFIX).unwrap())
        .hash_length(10)
        .open_review_dir(false)
        .status(Arc::clone(status))
        .build()
}

#[test]
fn progress_never_decreases_or_overshoots() {
    let temp = TempDir::new().unwrap();
    write_many(&temp);
    let status = Arc::new(ProcessStatus::new());
    let stop = Arc::new(AtomicBool::new(false));
    let poller = watch_progress(Arc::clone(&status), Arc::clone(&stop));

    let mut processor = watched_processor(temp.path(), &status);
    processor.process_all(true).unwrap();
    stop.store(true, Ordering::SeqCst);

    assert_eq!(poller.join().unwrap(), 0);
    assert_eq!(status.dupe_images(), 250);
    assert_eq!(status.new_images(), 150);
    assert_eq!(status.max_update_progress(), 400);
    assert_eq!(listing(temp.path()).len(), 150);
    assert_update_complete(&processor);
}

#[test]
fn review_progress_never_decreases_or_overshoots() {
    let temp = TempDir::new().unwrap();
    write_many(&temp);
    let status = Arc::new(ProcessStatus::new());
    let stop = Arc::new(AtomicBool::new(false));
    let poller = watch_progress(Arc::clone(&status), Arc::clone(&stop));

    let mut processor = watched_processor(temp.path(), &status);
    processor.process_images_for_review(true).unwrap();
    assert_eq!(processor.state(), ProcessState::AwaitingReview);
    processor.restore_from_review().unwrap();
    processor.update_images().unwrap();
    stop.store(true, Ordering::SeqCst);

    assert_eq!(poller.join().unwrap(), 0);
    assert_eq!(status.dupe_images(), 250);
    assert_eq!(status.new_images(), 150);
    assert_eq!(listing(temp.path()).len(), 151);
    temp.child(DEFAULT_REVIEW_DIR)
        .assert(predicate::path::is_dir());
    assert_eq!(listing(&temp.path().join(DEFAULT_REVIEW_DIR)).len(), 250);
    assert_update_complete(&processor);
}
