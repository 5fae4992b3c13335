//! Audit discovery and marker-file rules

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;

fn noxup_cmd() -> Command {
    Command::cargo_bin("noxup").expect("noxup binary")
}

#[test]
fn test_audit_rejects_directory_without_markers() {
    let sandbox = common::TestInstall::new();

    noxup_cmd()
        .current_dir(&sandbox.path)
        .args([
            "audit-heal",
            "--target",
            sandbox.path.to_str().expect("utf-8 path"),
            "-y",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a NoxSuite installation"));
}

#[test]
fn test_audit_rejects_directory_with_single_marker() {
    let sandbox = common::TestInstall::new();
    sandbox.write_file("noxsuite.json", "{}");

    noxup_cmd()
        .current_dir(&sandbox.path)
        .args([
            "audit-heal",
            "--target",
            sandbox.path.to_str().expect("utf-8 path"),
            "-y",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a NoxSuite installation"));
}

#[test]
fn test_audit_accepts_directory_with_two_markers() {
    let sandbox = common::TestInstall::new();
    // Two bare markers qualify the directory even though the install
    // itself is broken; the audit must then run and report.
    sandbox.write_file("noxsuite.json", "{}");
    sandbox.write_file("INSTALLATION_SUMMARY.json", "{}");

    noxup_cmd()
        .current_dir(&sandbox.path)
        .args([
            "audit-heal",
            "--target",
            sandbox.path.to_str().expect("utf-8 path"),
            "-y",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Audit"));

    assert!(sandbox.file_exists("AUDIT_REPORT.json"));
    assert!(sandbox.file_exists("AUDIT_REPORT.md"));
}

#[test]
#[serial] // overrides HOME, which discovery scans
fn test_audit_without_installations_fails_cleanly() {
    let sandbox = common::TestInstall::new();
    let empty_home = sandbox.path.join("home");
    std::fs::create_dir_all(&empty_home).expect("create home");

    noxup_cmd()
        .current_dir(&sandbox.path)
        .env("HOME", &empty_home)
        .env("USERPROFILE", &empty_home)
        .args(["audit-heal", "-y"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No NoxSuite installations found"));
}

#[test]
#[serial] // overrides HOME, which discovery scans
fn test_audit_discovers_installation_under_home() {
    let sandbox = common::TestInstall::new();
    let home = sandbox.path.join("home");
    let install = home.join("noxsuite");
    std::fs::create_dir_all(&install).expect("create install dir");

    let fixture = common::TestInstall::new();
    fixture.fabricate_installation();
    copy_tree(&fixture.path, &install);

    noxup_cmd()
        .current_dir(&sandbox.path)
        .env("HOME", &home)
        .env("USERPROFILE", &home)
        .args(["audit-heal", "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Auditing installation:"));

    assert!(install.join("AUDIT_REPORT.json").exists());
}

fn copy_tree(src: &std::path::Path, dst: &std::path::Path) {
    for entry in walkdir(src) {
        let rel = entry.strip_prefix(src).expect("tree prefix");
        let target = dst.join(rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&target).expect("create dir");
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).expect("create parent");
            }
            std::fs::copy(&entry, &target).expect("copy file");
        }
    }
}

fn walkdir(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut paths = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).expect("read dir").flatten() {
            let path = entry.path();
            paths.push(path.clone());
            if path.is_dir() {
                stack.push(path);
            }
        }
    }
    paths
}
