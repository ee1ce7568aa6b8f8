//! Architectural Enforcement Integration Tests
//!
//! Workspace policy checks that run as ordinary tests:
//! - No sleep() calls in production code (holds and dwell times are
//!   state-machine timers)
//! - The core crate stays headless (no terminal, stdio or window access)

use std::path::{Path, PathBuf};

/// Workspace root, two levels above this package
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Rust sources under `dir`, relative to the workspace root
#[must_use]
pub fn rust_sources(dir: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(dir);
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Lines of `content` that are production code
///
/// Everything from the first `#[cfg(test)]` onwards is treated as test code,
/// and line comments are stripped.
pub fn production_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(|(idx, line)| (idx + 1, line.split("//").next().unwrap_or(line)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let source = "fn a() {}\n// tokio::time::sleep(x)\n#[cfg(test)]\nmod tests {}\n";
        let lines: Vec<_> = production_lines(source).collect();
        assert_eq!(lines, vec![(1, "fn a() {}"), (2, "")]);
    }

    #[test]
    fn test_workspace_sources_found() {
        assert!(!rust_sources("face/core/src").is_empty());
    }
}
