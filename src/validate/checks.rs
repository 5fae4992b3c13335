//! The validation check battery
//!
//! Every check is a pure read of installation state. A check reports at
//! most one failure; presence of an artifact is owned by one check so a
//! single missing file does not cascade into a wall of duplicates
//! (syntax checks pass on absent files, presence checks flag them).

use std::path::{Path, PathBuf};

use serde_json::json;

use crate::atomic::{is_executable, strip_bom};
use crate::config::{COMPOSE_PATH, ENV_PATH, MANIFEST_PATH};
use crate::error::Result;
use crate::generate::compose::ComposeFile;
use crate::generate::scripts::script_paths;
use crate::generate::REQUIRED_ENV_KEYS;
use crate::probe::OsFamily;

use super::{CheckContext, CheckId, Severity, ValidationFailure};

/// Directories every installation must carry
const REQUIRED_DIRS: &[&str] = &["config", "docker", "scripts", "data/logs"];

/// Free-space floor below which a warning is raised, in gigabytes
const MIN_FREE_DISK_GB: u64 = 5;

/// Longest install path considered safe on Windows
const MAX_WINDOWS_PATH: usize = 240;

/// Windows reserved device names, disallowed as path components
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Dispatch a single check. `Ok(None)` means the check passed.
pub fn run(id: CheckId, ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    match id {
        CheckId::DirectoryStructure => directory_structure(ctx),
        CheckId::ConfigurationFiles => configuration_files(ctx),
        CheckId::ConfigSyntax => config_syntax(ctx),
        CheckId::FilePermissions => file_permissions(ctx),
        CheckId::EncodingConsistency => encoding_consistency(ctx),
        CheckId::PathCompatibility => path_compatibility(ctx),
        CheckId::ComposeStructure => compose_structure(ctx),
        CheckId::EnvCompleteness => env_completeness(ctx),
        CheckId::ScriptIntegrity => script_integrity(ctx),
        CheckId::DatabaseConfig => sub_config(ctx, id, "config/database.json", "engine"),
        CheckId::NetworkConfig => sub_config(ctx, id, "config/network.json", "ports"),
        CheckId::LoggingConfig => sub_config(ctx, id, "config/logging.json", "level"),
        CheckId::AiConfig => sub_config(ctx, id, "config/ai.json", "models"),
        CheckId::ServiceDependencies => service_dependencies(ctx),
        CheckId::DiskSpace => disk_space(ctx),
        CheckId::PlatformCompatibility => platform_compatibility(ctx),
    }
}

fn directory_structure(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let missing: Vec<String> = REQUIRED_DIRS
        .iter()
        .filter(|rel| !ctx.cfg.install_dir.join(rel).is_dir())
        .map(|rel| rel.to_string())
        .collect();

    if missing.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        ValidationFailure::new(
            CheckId::DirectoryStructure,
            Severity::Error,
            format!("{} required directories are missing", missing.len()),
        )
        .with_suggestion("Recreate the missing directories")
        .with_context("missing_paths", json!(missing)),
    ))
}

/// Artifacts whose presence this check owns
fn required_files(ctx: &CheckContext) -> Vec<PathBuf> {
    let (start, _) = script_paths(ctx.profile.os);
    vec![
        PathBuf::from(MANIFEST_PATH),
        PathBuf::from(ENV_PATH),
        PathBuf::from(COMPOSE_PATH),
        start,
    ]
}

fn configuration_files(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let missing: Vec<String> = required_files(ctx)
        .into_iter()
        .filter(|rel| !ctx.cfg.install_dir.join(rel).is_file())
        .map(|rel| rel.display().to_string())
        .collect();

    if missing.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        ValidationFailure::new(
            CheckId::ConfigurationFiles,
            Severity::Error,
            format!("{} configuration artifacts are missing", missing.len()),
        )
        .with_suggestion("Regenerate the missing configuration artifacts")
        .with_context("missing_configs", json!(missing)),
    ))
}

fn config_syntax(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let path = ctx.cfg.install_dir.join(MANIFEST_PATH);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        // Presence is owned by configuration_files
        return Ok(None);
    };

    match serde_json::from_str::<serde_json::Value>(strip_bom(&raw)) {
        Ok(_) => Ok(None),
        Err(e) => Ok(Some(
            ValidationFailure::new(
                CheckId::ConfigSyntax,
                Severity::Error,
                "main manifest is not valid JSON",
            )
            .with_suggestion("Regenerate the manifest from the current configuration")
            .with_context("parse_error", json!(e.to_string())),
        )),
    }
}

fn file_permissions(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    if !ctx.profile.os.is_windows() {
        let (start, stop) = script_paths(ctx.profile.os);
        let broken: Vec<String> = [start, stop]
            .into_iter()
            .map(|rel| ctx.cfg.install_dir.join(rel))
            .filter(|p| p.is_file() && !is_executable(p))
            .map(|p| p.display().to_string())
            .collect();

        if !broken.is_empty() {
            return Ok(Some(
                ValidationFailure::new(
                    CheckId::FilePermissions,
                    Severity::Warning,
                    format!("{} scripts are missing the execute bit", broken.len()),
                )
                .with_suggestion("Re-apply execute permissions to the generated scripts")
                .with_context("files", json!(broken)),
            ));
        }
    }
    Ok(None)
}

fn encoding_consistency(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let candidates = [
        PathBuf::from(ENV_PATH),
        PathBuf::from(MANIFEST_PATH),
        PathBuf::from("config/database.json"),
        PathBuf::from("config/network.json"),
        PathBuf::from("config/logging.json"),
    ];

    let mut invalid = Vec::new();
    for rel in candidates {
        let path = ctx.cfg.install_dir.join(&rel);
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        if String::from_utf8(bytes).is_err() {
            invalid.push(rel.display().to_string());
        }
    }

    if invalid.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        ValidationFailure::new(
            CheckId::EncodingConsistency,
            Severity::Warning,
            format!("{} files are not valid UTF-8", invalid.len()),
        )
        .with_suggestion("Rewrite the affected files with the correct encoding")
        .with_context("files", json!(invalid)),
    ))
}

fn path_compatibility(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let path = &ctx.cfg.install_dir;
    let display = path.display().to_string();
    let mut problems = Vec::new();

    if display.contains(' ') {
        problems.push("install path contains spaces".to_string());
    }
    if ctx.profile.os.is_windows() && display.len() > MAX_WINDOWS_PATH {
        problems.push(format!(
            "install path length {} exceeds the safe Windows limit",
            display.len()
        ));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy().to_uppercase();
        let stem = name.split('.').next().unwrap_or(&name);
        if RESERVED_NAMES.contains(&stem) {
            problems.push(format!("'{name}' is a reserved device name on Windows"));
        }
    }

    if problems.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        ValidationFailure::new(
            CheckId::PathCompatibility,
            Severity::Warning,
            problems.join("; "),
        )
        .with_suggestion("Move the installation to a short, space-free path")
        .with_context("path", json!(display)),
    ))
}

fn compose_structure(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let path = ctx.cfg.install_dir.join(COMPOSE_PATH);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return Ok(None);
    };

    let fail = |detail: String| {
        Some(
            ValidationFailure::new(
                CheckId::ComposeStructure,
                Severity::Error,
                "service orchestration file is structurally invalid",
            )
            .with_suggestion("Regenerate the orchestration file")
            .with_context("detail", json!(detail)),
        )
    };

    let compose: ComposeFile = match serde_yaml::from_str(strip_bom(&raw)) {
        Ok(c) => c,
        Err(e) => return Ok(fail(e.to_string())),
    };

    if compose.services.is_empty() {
        return Ok(fail("no services defined".to_string()));
    }
    for (name, service) in &compose.services {
        if service.image.is_none() && service.build.is_none() {
            return Ok(fail(format!("service '{name}' has neither image nor build")));
        }
    }
    Ok(None)
}

fn env_completeness(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let path = ctx.cfg.install_dir.join(ENV_PATH);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return Ok(None);
    };
    let raw = strip_bom(&raw);

    let defined: Vec<&str> = raw
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .filter_map(|l| l.split('=').next())
        .map(str::trim)
        .collect();

    let missing: Vec<String> = REQUIRED_ENV_KEYS
        .iter()
        .filter(|key| !defined.contains(*key))
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        ValidationFailure::new(
            CheckId::EnvCompleteness,
            Severity::Error,
            format!("{} required environment variables are missing", missing.len()),
        )
        .with_suggestion("Regenerate the environment file")
        .with_context("missing_keys", json!(missing)),
    ))
}

fn script_integrity(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let (start, _) = script_paths(ctx.profile.os);
    let path = ctx.cfg.install_dir.join(&start);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return Ok(None);
    };

    let mut problems = Vec::new();
    if ctx.profile.os.is_windows() {
        if !raw.trim_start().starts_with("@echo off") {
            problems.push("startup script is not a batch file".to_string());
        }
    } else if !raw.starts_with("#!") {
        problems.push("startup script is missing its shebang".to_string());
    }
    if !raw.contains("docker compose") && !raw.contains("docker-compose") {
        problems.push("startup script does not start the service stack".to_string());
    }

    if problems.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        ValidationFailure::new(CheckId::ScriptIntegrity, Severity::Error, problems.join("; "))
            .with_suggestion("Regenerate the startup and shutdown scripts")
            .with_context("script", json!(start.display().to_string())),
    ))
}

fn sub_config(
    ctx: &CheckContext,
    id: CheckId,
    rel_path: &str,
    required_key: &str,
) -> Result<Option<ValidationFailure>> {
    let path = ctx.cfg.install_dir.join(rel_path);

    let fail = |message: String| {
        Some(
            ValidationFailure::new(id, Severity::Error, message)
                .with_suggestion(format!("Regenerate {rel_path}"))
                .with_context("file", json!(rel_path)),
        )
    };

    let Ok(raw) = std::fs::read_to_string(&path) else {
        return Ok(fail(format!("{rel_path} is missing")));
    };
    let value: serde_json::Value = match serde_json::from_str(strip_bom(&raw)) {
        Ok(v) => v,
        Err(_) => return Ok(fail(format!("{rel_path} is not valid JSON"))),
    };
    if value.get(required_key).is_none() {
        return Ok(fail(format!("{rel_path} lacks required key '{required_key}'")));
    }
    Ok(None)
}

fn service_dependencies(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let mut needed = vec!["docker"];
    if ctx.cfg.features.mobile_enabled {
        needed.push("node");
    }

    let missing: Vec<String> = needed
        .into_iter()
        .filter(|tool| !ctx.profile.tool_available(tool))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        ValidationFailure::new(
            CheckId::ServiceDependencies,
            Severity::Error,
            format!("required tools are unavailable: {}", missing.join(", ")),
        )
        .with_suggestion("Install the missing tools and re-run the audit")
        .with_context("missing_tools", json!(missing)),
    ))
}

fn disk_space(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let Some(available_gb) = available_space_gb(&ctx.cfg.install_dir) else {
        // Detection failure is not an installation failure
        return Ok(None);
    };

    if available_gb >= MIN_FREE_DISK_GB {
        return Ok(None);
    }
    Ok(Some(
        ValidationFailure::new(
            CheckId::DiskSpace,
            Severity::Warning,
            format!("only {available_gb} GB free on the installation volume"),
        )
        .with_suggestion("Free up disk space or move the installation to a larger volume")
        .with_context("available_gb", json!(available_gb)),
    ))
}

/// Free space on the disk holding `path`, by longest mount-point match.
fn available_space_gb(path: &Path) -> Option<u64> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| d.available_space() / (1024 * 1024 * 1024))
}

fn platform_compatibility(ctx: &CheckContext) -> Result<Option<ValidationFailure>> {
    let mut problems = Vec::new();

    match ctx.profile.os {
        OsFamily::Unknown => {
            problems.push("unrecognized operating system family".to_string());
        }
        OsFamily::Windows => {
            if !ctx.profile.encoding.console_utf8 {
                problems.push(
                    "console encoding is not UTF-8; generated output may render incorrectly"
                        .to_string(),
                );
            }
        }
        OsFamily::Linux => {
            if !Path::new("/run/systemd/system").exists() {
                problems.push(
                    "systemd is not available; service management must be manual".to_string(),
                );
            }
        }
        OsFamily::Macos => {}
    }

    if problems.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        ValidationFailure::new(
            CheckId::PlatformCompatibility,
            Severity::Warning,
            problems.join("; "),
        )
        .with_suggestion("Review the platform requirements in the documentation"),
    ))
}
