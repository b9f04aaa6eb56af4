//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code waits on I/O, channels or cancellation, never
//! on a timer.
//! **Exception**: output pacing in `conductor/core/src/pacing.rs`, which the
//! pipeline races against cancellation.

use std::path::Path;

use architectural_enforcement::{
    assert_clean, rust_files, scan, workspace_root, PACING_FILE, SOURCE_DIRS,
};

#[test]
fn test_sources_are_found() {
    let root = workspace_root();
    for dir in SOURCE_DIRS {
        assert!(!rust_files(&root, dir).is_empty(), "no sources under {dir}");
    }
    assert!(root.join(PACING_FILE).is_file());
}

#[test]
fn test_no_sleep_outside_pacer() {
    let root = workspace_root();
    let violations = scan(&root, SOURCE_DIRS, |file, line| {
        file != Path::new(PACING_FILE) && line.contains("sleep(")
    });
    assert_clean("sleep only in the pacer", &violations);
}
