//! Architectural Enforcement Integration Tests
//!
//! This package contains tests that enforce architectural principles across
//! the workspace:
//! - Time only passes through the pacer (no stray sleeps)
//! - The core crate stays free of the HTTP server framework
//! - Production code propagates errors instead of panicking on them
//!
//! Only code before a file's first `#[cfg(test)]` counts as production code.
//! The rules themselves live under `tests/`; this library holds the shared
//! source scanning.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Crate source directories checked by these rules
pub const SOURCE_DIRS: &[&str] = &["conductor/core/src", "conductor/daemon/src", "client/src"];

/// The one file allowed to suspend on a timer
pub const PACING_FILE: &str = "conductor/core/src/pacing.rs";

/// A rule violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File relative to the workspace root
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file.display(), self.line, self.text)
    }
}

/// Workspace root (two levels above this package)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// All `.rs` files under `dir`, relative to `root`
#[must_use]
pub fn rust_files(root: &Path, dir: &str) -> Vec<PathBuf> {
    WalkDir::new(root.join(dir))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect()
}

/// Production lines of a source file: everything before `#[cfg(test)]`,
/// comments excluded
#[must_use]
pub fn production_lines(source: &str) -> Vec<(usize, &str)> {
    source
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(i, line)| (i + 1, line))
        .collect()
}

/// Scan production code of `dirs` for lines matching `pred`
#[must_use]
pub fn scan(root: &Path, dirs: &[&str], pred: impl Fn(&Path, &str) -> bool) -> Vec<Violation> {
    let mut violations = Vec::new();
    for dir in dirs {
        for file in rust_files(root, dir) {
            let Ok(source) = fs::read_to_string(root.join(&file)) else {
                continue;
            };
            for (line, text) in production_lines(&source) {
                if pred(&file, text) {
                    violations.push(Violation {
                        file: file.clone(),
                        line,
                        text: text.trim().to_string(),
                    });
                }
            }
        }
    }
    violations
}

/// Print violations of `rule` and fail the calling test if there are any
///
/// # Panics
///
/// Panics when `violations` is non-empty.
pub fn assert_clean(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ Rule violated: {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!(
        "\nFound {} violation(s) of \"{rule}\".\nFix these before merging!",
        violations.len()
    );
}
