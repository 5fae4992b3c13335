//! Dry-run tests: preview everything, write nothing

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

fn noxup_cmd() -> Command {
    Command::cargo_bin("noxup").expect("noxup binary")
}

#[test]
fn test_dry_run_writes_no_files_and_exits_zero() {
    let sandbox = common::TestInstall::new();
    let target = sandbox.path.join("nox-test");

    noxup_cmd()
        .current_dir(&sandbox.path)
        .args([
            "dry-run",
            "--install-dir",
            target.to_str().expect("utf-8 path"),
            "--modules",
            "core",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN]"));

    // The whole point: nothing was written to disk
    assert!(!target.exists());
}

#[test]
fn test_dry_run_previews_artifact_paths() {
    let sandbox = common::TestInstall::new();
    let target = sandbox.path.join("nox-test");

    noxup_cmd()
        .current_dir(&sandbox.path)
        .args([
            "dry-run",
            "-d",
            target.to_str().expect("utf-8 path"),
            "--modules",
            "core",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("config/noxsuite.json"))
        .stdout(predicate::str::contains("docker-compose.noxsuite.yml"))
        .stdout(predicate::str::contains("no files written"));
}

#[test]
fn test_dry_run_reports_dependency_queue_without_installing() {
    let sandbox = common::TestInstall::new();
    let target = sandbox.path.join("nox-test");

    // Whether or not docker exists on the test host, the dry run must
    // mention every required dependency and never attempt an install.
    noxup_cmd()
        .current_dir(&sandbox.path)
        .args(["dry-run", "-d", target.to_str().expect("utf-8 path")])
        .assert()
        .success()
        .stdout(predicate::str::contains("docker"))
        .stdout(predicate::str::contains("git"));

    assert!(!target.exists());
}
