//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the face crates MUST NOT call sleep
//! methods. Boot, hold and dwell times are timer state checked on each
//! scheduler tick; the tick itself is a `tokio::time::interval`.
//! **Exceptions**: test code (`#[cfg(test)]` modules and `tests/` dirs)

use std::fs;

use architectural_enforcement::{production_lines, rust_sources};

const PRODUCTION_DIRS: &[&str] = &["face/core/src", "face/daemon/src"];

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for path in rust_sources(dir) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for (line_number, code) in production_lines(&content) {
                if code.contains("::sleep(") || code.contains(".sleep(") {
                    violations.push(format!("{}:{} - {}", path.display(), line_number, code.trim()));
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse timer state checked on tick, or tokio::time::interval()");

        panic!("Found {} sleep violation(s) in production code", violations.len());
    }
}

#[test]
fn test_sources_were_scanned() {
    for dir in PRODUCTION_DIRS {
        assert!(!rust_sources(dir).is_empty(), "no sources under {dir}");
    }
}
