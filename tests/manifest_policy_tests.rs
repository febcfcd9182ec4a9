#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Manifest policy tests for Lobby Session Client.
//!
//! These tests verify that Cargo.toml, the fuzz manifest, and the README
//! conform to project policy. If any test fails, the manifest has drifted
//! from the agreed-upon standards.
//!
//! All checks are synchronous filesystem reads; no network access or async
//! runtime needed.

use std::path::PathBuf;

/// Returns the project root directory (where Cargo.toml lives).
fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Reads a file relative to the project root and returns its contents.
fn read_project_file(relative_path: &str) -> String {
    let path = project_root().join(relative_path);
    std::fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to read '{}': {}. This file is required by project policy.",
            path.display(),
            e
        )
    })
}

fn project_file_exists(relative_path: &str) -> bool {
    project_root().join(relative_path).is_file()
}

fn msrv() -> String {
    read_project_file("Cargo.toml")
        .lines()
        .find(|line| line.starts_with("rust-version"))
        .and_then(|line| line.split('"').nth(1))
        .map(str::to_string)
        .expect("Cargo.toml must declare a quoted rust-version")
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: panic_policy
// ─────────────────────────────────────────────────────────────────────────────

mod panic_policy {
    use super::*;

    const REQUIRED_DENY_LINTS: &[&str] = &[
        "unwrap_used",
        "expect_used",
        "panic",
        "todo",
        "unimplemented",
        "indexing_slicing",
    ];

    #[test]
    fn cargo_toml_has_all_panic_free_lints() {
        let cargo = read_project_file("Cargo.toml");

        for lint in REQUIRED_DENY_LINTS {
            let pattern = format!("{lint} = \"deny\"");
            assert!(
                cargo.contains(&pattern),
                "Cargo.toml is missing `{pattern}` in [lints.clippy]. \
                 All panic-prone lints must be set to deny level to enforce \
                 the project's panic-free policy in library code."
            );
        }
    }

    #[test]
    fn cargo_toml_has_lints_clippy_section() {
        let cargo = read_project_file("Cargo.toml");
        assert!(
            cargo.contains("[lints.clippy]"),
            "Cargo.toml is missing [lints.clippy] section."
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: feature_policy
// ─────────────────────────────────────────────────────────────────────────────

mod feature_policy {
    use super::*;

    #[test]
    fn http_remote_is_default_and_optional() {
        let cargo = read_project_file("Cargo.toml");
        assert!(
            cargo.contains("default = [\"transport-http\"]"),
            "The HTTP remote must be enabled by default."
        );
        assert!(
            cargo.contains("transport-http = [\"dep:reqwest\"]"),
            "transport-http must gate reqwest through `dep:` syntax."
        );
        let reqwest = cargo
            .lines()
            .find(|line| line.starts_with("reqwest"))
            .expect("reqwest must be declared");
        assert!(
            reqwest.contains("optional = true"),
            "reqwest must stay optional so custom remotes do not pull in an HTTP stack."
        );
    }

    #[test]
    fn reqwest_avoids_native_tls() {
        let cargo = read_project_file("Cargo.toml");
        let reqwest = cargo
            .lines()
            .find(|line| line.starts_with("reqwest"))
            .expect("reqwest must be declared");
        assert!(reqwest.contains("default-features = false"));
        assert!(reqwest.contains("rustls-tls"));
    }

    #[test]
    fn paused_clock_is_available_to_tests() {
        let cargo = read_project_file("Cargo.toml");
        let dev = cargo
            .split("[dev-dependencies]")
            .nth(1)
            .expect("Cargo.toml must have [dev-dependencies]");
        let tokio = dev
            .lines()
            .find(|line| line.starts_with("tokio "))
            .expect("tokio must be a dev-dependency");
        assert!(
            tokio.contains("test-util"),
            "Polling tests run on a paused clock and need tokio's test-util feature."
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: layout_policy
// ─────────────────────────────────────────────────────────────────────────────

mod layout_policy {
    use super::*;

    #[test]
    fn declared_examples_exist() {
        let cargo = read_project_file("Cargo.toml");
        let paths: Vec<&str> = cargo
            .lines()
            .filter(|line| line.starts_with("path = \"demos/"))
            .filter_map(|line| line.split('"').nth(1))
            .collect();
        assert!(!paths.is_empty(), "Cargo.toml declares no examples");
        for path in paths {
            assert!(project_file_exists(path), "example {path} is missing");
        }
    }

    #[test]
    fn fuzz_manifest_targets_this_crate() {
        let fuzz = read_project_file("fuzz/Cargo.toml");
        assert!(fuzz.contains("[dependencies.lobby-session-client]"));
        assert!(fuzz.contains("path = \"..\""));
        for line in fuzz.lines().filter(|l| l.starts_with("path = \"fuzz_targets/")) {
            let target = line.split('"').nth(1).unwrap();
            assert!(
                project_file_exists(&format!("fuzz/{target}")),
                "fuzz target {target} is missing"
            );
        }
    }

    #[test]
    fn readme_states_msrv() {
        let version = msrv();
        let readme = read_project_file("README.md");
        assert!(
            readme.contains(&version),
            "README.md does not reference the MSRV '{version}' from Cargo.toml."
        );
    }
}
