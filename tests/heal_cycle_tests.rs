//! End-to-end audit-heal cycles over a broken installation

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

fn noxup_cmd() -> Command {
    Command::cargo_bin("noxup").expect("noxup binary")
}

fn audit_target(sandbox: &common::TestInstall) -> assert_cmd::assert::Assert {
    noxup_cmd()
        .current_dir(&sandbox.path)
        .args([
            "audit-heal",
            "--target",
            sandbox.path.to_str().expect("utf-8 path"),
            "-y",
        ])
        .assert()
}

#[test]
fn test_removed_env_file_is_healed() {
    let sandbox = common::TestInstall::new();
    sandbox.fabricate_installation();
    sandbox.remove_file(".env");

    audit_target(&sandbox)
        .success()
        .stdout(predicate::str::contains("configuration_files"))
        .stdout(predicate::str::contains("Healing:"));

    // The environment file is back and the report records the repair
    assert!(sandbox.file_exists(".env"));

    let report: serde_json::Value =
        serde_json::from_str(strip_bom(&sandbox.read_file("AUDIT_REPORT.json")))
            .expect("audit report JSON");

    let pre_heal_checks: Vec<&str> = report["detailed_failures"]
        .as_array()
        .expect("failures array")
        .iter()
        .filter_map(|f| f["check"].as_str())
        .collect();
    assert!(pre_heal_checks.contains(&"configuration_files"));

    assert!(report["healing"]["healed_count"].as_u64().expect("healed count") >= 1);

    // Re-validation no longer flags the repaired check
    if let Some(revalidation) = report["revalidation"].as_object() {
        let post: Vec<&str> = revalidation["failures"]
            .as_array()
            .expect("revalidation failures")
            .iter()
            .filter_map(|f| f["check"].as_str())
            .collect();
        assert!(!post.contains(&"configuration_files"));
    }
}

#[test]
fn test_corrupted_manifest_is_regenerated() {
    let sandbox = common::TestInstall::new();
    sandbox.fabricate_installation();
    sandbox.write_file("config/noxsuite.json", "{ corrupted beyond parsing");

    audit_target(&sandbox).success();

    // The regenerated manifest parses again
    let manifest: serde_json::Value =
        serde_json::from_str(strip_bom(&sandbox.read_file("config/noxsuite.json")))
            .expect("regenerated manifest parses");
    assert!(manifest.get("installation").is_some());
}

#[test]
fn test_healing_twice_is_idempotent() {
    let sandbox = common::TestInstall::new();
    sandbox.fabricate_installation();
    sandbox.remove_file(".env");

    audit_target(&sandbox).success();
    let first_env = sandbox.read_file(".env");
    let first_report: serde_json::Value =
        serde_json::from_str(strip_bom(&sandbox.read_file("AUDIT_REPORT.json")))
            .expect("first report");

    // Second audit over the healed install: nothing left to heal
    audit_target(&sandbox).success();
    let second_report: serde_json::Value =
        serde_json::from_str(strip_bom(&sandbox.read_file("AUDIT_REPORT.json")))
            .expect("second report");

    assert!(first_report["healing"]["healed_count"].as_u64().expect("count") >= 1);
    let second_failures: Vec<&str> = second_report["detailed_failures"]
        .as_array()
        .expect("failures array")
        .iter()
        .filter_map(|f| f["check"].as_str())
        .collect();
    assert!(!second_failures.contains(&"configuration_files"));

    // The healed env survived the second pass untouched
    assert_eq!(first_env, sandbox.read_file(".env"));
}

#[cfg(unix)]
#[test]
fn test_stripped_exec_bits_are_restored() {
    use std::os::unix::fs::PermissionsExt;

    let sandbox = common::TestInstall::new();
    sandbox.fabricate_installation();
    let script = sandbox.path.join("scripts/start-noxsuite.sh");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644))
        .expect("strip exec bits");

    audit_target(&sandbox).success();

    let mode = std::fs::metadata(&script).expect("script metadata").permissions().mode();
    assert_ne!(mode & 0o111, 0, "execute bits restored");
}

fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}
