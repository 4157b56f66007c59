//! Integration Test: Core Independence
//!
//! **Policy**: `navian-core` is rendering-agnostic. It MUST NOT depend on a
//! terminal toolkit or an HTTP server framework; those belong to the `tui`
//! and `proxy` crates.

use std::fs;

use architectural_enforcement::{find_in_production, workspace_root};

const FORBIDDEN: &[&str] = &["ratatui", "crossterm", "axum", "tower-http", "tower_http"];

#[test]
fn test_core_manifest_has_no_surface_dependencies() {
    let manifest = fs::read_to_string(workspace_root().join("widget/core/Cargo.toml"))
        .expect("widget/core/Cargo.toml should exist");

    let offending: Vec<_> = manifest
        .lines()
        .map(str::trim)
        .filter(|line| {
            FORBIDDEN
                .iter()
                .any(|dep| line.starts_with(&format!("{dep} ")) || line.starts_with(&format!("{dep}=")))
        })
        .collect();

    assert!(
        offending.is_empty(),
        "navian-core must stay surface-agnostic, found: {offending:?}"
    );
}

#[test]
fn test_core_sources_do_not_import_surfaces() {
    let violations = find_in_production("widget/core/src", |code| {
        FORBIDDEN
            .iter()
            .any(|dep| code.contains(&format!("{}::", dep.replace('-', "_"))))
    });

    for violation in &violations {
        eprintln!("  ❌ {violation}");
    }
    assert!(violations.is_empty(), "navian-core imports a surface crate");
}

#[test]
fn test_proxy_does_not_reach_into_tui() {
    let manifest = fs::read_to_string(workspace_root().join("widget/proxy/Cargo.toml"))
        .expect("widget/proxy/Cargo.toml should exist");
    assert!(!manifest.contains("navian-tui"));
    assert!(!manifest.contains("ratatui"));
}
