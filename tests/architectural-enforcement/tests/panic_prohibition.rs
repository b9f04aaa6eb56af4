//! Integration Test: Panic Prohibition
//!
//! **Policy**: Production code propagates errors with `?` or handles them;
//! `unwrap()` and `expect()` are for tests only.

use architectural_enforcement::{assert_clean, production_lines, scan, workspace_root, SOURCE_DIRS};

#[test]
fn test_no_panicking_error_handling() {
    let root = workspace_root();
    let violations = scan(&root, SOURCE_DIRS, |_, line| {
        line.contains(".unwrap()") || line.contains(".expect(")
    });
    assert_clean("no unwrap/expect in production code", &violations);
}

#[test]
fn test_production_lines_stop_at_test_module() {
    let source = "fn a() {}\n// note\n#[cfg(test)]\nmod tests { fn b() { x.unwrap(); } }\n";
    assert_eq!(production_lines(source), vec![(1, "fn a() {}")]);
}
