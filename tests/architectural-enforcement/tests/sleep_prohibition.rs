//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Reveal pacing MUST go through `RevealTimers` so every pending
//! word can be cancelled when a turn ends. Nothing else may sleep.
//! **Exceptions**: the timer task itself (`widget/core/src/timers.rs`) and frame
//! rate limiting in the TUI event loop (`tui/src/app.rs`). Test code is exempt.

use std::path::Path;

use architectural_enforcement::{find_in_production, Violation};

const ALLOWED: &[&str] = &["widget/core/src/timers.rs", "tui/src/app.rs"];

fn is_sleep(code: &str) -> bool {
    code.contains("::sleep(") || code.contains(".sleep(")
}

fn sleep_violations() -> Vec<Violation> {
    ["widget/core/src", "widget/proxy/src", "tui/src"]
        .into_iter()
        .flat_map(|dir| find_in_production(dir, is_sleep))
        .filter(|v| !ALLOWED.iter().any(|allowed| v.path == Path::new(allowed)))
        .collect()
}

#[test]
fn test_no_sleep_outside_reveal_timers() {
    let violations = sleep_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - RevealTimers in widget/core/src/timers.rs");
        eprintln!("  - Frame rate limiting in tui/src/app.rs");
        eprintln!("  - Test code");

        panic!("\nFound {} sleep violation(s) in production code.", violations.len());
    }
}

#[test]
fn test_reveal_timers_are_scanned() {
    // Guards against the scan silently finding no files
    let found = find_in_production("widget/core/src", is_sleep);
    assert!(
        found
            .iter()
            .any(|v| v.path == Path::new("widget/core/src/timers.rs")),
        "expected the timer task's sleep to be found, got {found:?}"
    );
}
