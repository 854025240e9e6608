//! CLI smoke tests for the spectra-downloader binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture_path(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .display()
        .to_string()
}

fn binary() -> Command {
    Command::cargo_bin("spectra-downloader").expect("Binary should build")
}

#[test]
fn test_inspect_prints_table_summary() {
    binary()
        .args(["inspect", &fixture_path("ssap.xml")])
        .assert()
        .success()
        .stdout(predicate::str::contains("Query status:"))
        .stdout(predicate::str::contains("Rows:"))
        .stdout(predicate::str::contains("ssa:Access.Reference"))
        .stdout(predicate::str::contains("available"));
}

#[test]
fn test_inspect_missing_file_fails() {
    binary()
        .args(["inspect", "does-not-exist.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_download_rejects_invalid_row_selection() {
    // Row validation happens before any network request is made.
    binary()
        .args(["download", &fixture_path("ssap.xml"), "--rows", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn test_download_rejects_malformed_parameter() {
    binary()
        .args([
            "download",
            &fixture_path("ssap.xml"),
            "--param",
            "no-equals-sign",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}
