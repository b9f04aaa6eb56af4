//! Integration Test: Core Layering
//!
//! **Policy**: `quill-core` carries the pipeline and protocol only. The HTTP
//! server lives in the daemon, response streaming in the client.

use std::fs;

use architectural_enforcement::{assert_clean, scan, workspace_root};

#[test]
fn test_core_has_no_server_framework() {
    let root = workspace_root();
    let violations = scan(&root, &["conductor/core/src"], |_, line| {
        line.contains("axum::") || line.contains("tower_http::")
    });
    assert_clean("core free of axum", &violations);
}

#[test]
fn test_core_reqwest_features_match_usage() {
    let root = workspace_root();
    let manifest = fs::read_to_string(root.join("conductor/core/Cargo.toml")).unwrap();
    let reqwest = manifest
        .lines()
        .find(|line| line.starts_with("reqwest"))
        .expect("core depends on reqwest");

    let streams = scan(&root, &["conductor/core/src"], |_, line| {
        line.contains("bytes_stream")
    });
    if streams.is_empty() {
        assert!(
            !reqwest.contains("\"stream\""),
            "core enables reqwest's stream feature without reading response streams: {reqwest}"
        );
    }
}
