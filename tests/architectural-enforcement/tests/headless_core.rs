//! Integration Test: Headless Core
//!
//! **Policy**: `face-core` renders nothing and reads nothing from the
//! terminal. Frames leave through `PresentationSink`, stimuli arrive
//! through the runtime mailbox; stdio and UI crates belong to the daemon.

use std::fs;

use architectural_enforcement::{production_lines, rust_sources, workspace_root};

const FORBIDDEN_CRATES: &[&str] = &["ratatui", "crossterm", "minifb", "winit"];
const FORBIDDEN_CALLS: &[&str] = &["println!(", "eprintln!(", "std::io::stdin", "io::stdout"];

#[test]
fn test_core_manifest_has_no_ui_dependencies() {
    let manifest = fs::read_to_string(workspace_root().join("face/core/Cargo.toml"))
        .expect("face-core manifest must exist");

    for name in FORBIDDEN_CRATES {
        assert!(
            !manifest.lines().any(|l| l.trim_start().starts_with(name)),
            "face-core must not depend on {name}"
        );
    }
}

#[test]
fn test_core_sources_do_not_touch_stdio() {
    let mut violations = Vec::new();

    for path in rust_sources("face/core/src") {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        for (line_number, code) in production_lines(&content) {
            if let Some(call) = FORBIDDEN_CALLS.iter().find(|c| code.contains(*c)) {
                violations.push(format!("{}:{} - {call}", path.display(), line_number));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "face-core production code uses stdio:\n  {}",
        violations.join("\n  ")
    );
}
