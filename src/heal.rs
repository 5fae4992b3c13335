//! Self-healing of validation failures
//!
//! Each auto-fixable check maps to one remediation strategy through a
//! static, exhaustively matched table: recreate missing directories,
//! regenerate corrupted or missing artifacts, re-apply execute bits,
//! rewrite mis-encoded files. Remediation attempts are isolated — one
//! failure's error never prevents attempts on the others — and healing
//! never re-validates internally; the caller runs a fresh validation
//! pass afterwards. Running heal twice in a row converges: the second
//! pass finds the same artifacts already regenerated.

use serde::Serialize;
use tracing::{info, warn};

use crate::atomic::make_executable;
use crate::config::InstallConfig;
use crate::generate::{self, scripts::script_paths};
use crate::probe::{OsFamily, SystemProfile};
use crate::validate::{CheckId, ValidationFailure};

/// Outcome of one remediation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealOutcome {
    Healed,
    Failed,
    NoAutoFix,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealingAttempt {
    pub check: CheckId,
    pub outcome: HealOutcome,
    pub detail: String,
    /// Manual steps for failures without an automatic fix
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub manual_suggestions: Vec<String>,
}

/// Aggregate result of one healing cycle. Transient: folded into the
/// audit report and discarded.
#[derive(Debug, Clone, Serialize)]
pub struct HealingResult {
    pub attempts: Vec<HealingAttempt>,
    pub healed_count: usize,
    pub failed_count: usize,
}

impl HealingResult {
    pub fn attempted_any(&self) -> bool {
        !self.attempts.is_empty()
    }
}

/// Attempt remediation for every failure in the list.
pub fn heal(
    cfg: &InstallConfig,
    profile: &SystemProfile,
    failures: &[ValidationFailure],
) -> HealingResult {
    let mut attempts = Vec::new();
    let mut healed_count = 0;
    let mut failed_count = 0;

    for failure in failures {
        let attempt = if failure.auto_fix_available {
            match apply_fix(failure.check, cfg, profile) {
                Ok(detail) => {
                    info!(check = failure.check.name(), "healed");
                    healed_count += 1;
                    HealingAttempt {
                        check: failure.check,
                        outcome: HealOutcome::Healed,
                        detail,
                        manual_suggestions: Vec::new(),
                    }
                }
                Err(e) => {
                    warn!(check = failure.check.name(), error = %e, "healing failed");
                    failed_count += 1;
                    HealingAttempt {
                        check: failure.check,
                        outcome: HealOutcome::Failed,
                        detail: e.to_string(),
                        manual_suggestions: Vec::new(),
                    }
                }
            }
        } else {
            HealingAttempt {
                check: failure.check,
                outcome: HealOutcome::NoAutoFix,
                detail: "manual intervention required".to_string(),
                manual_suggestions: manual_fix_suggestions(failure.check, profile.os),
            }
        };
        attempts.push(attempt);
    }

    HealingResult {
        attempts,
        healed_count,
        failed_count,
    }
}

/// The static check-to-remediation table. Exhaustive over `CheckId`, so
/// adding a check without deciding its remediation fails to compile.
fn apply_fix(
    check: CheckId,
    cfg: &InstallConfig,
    profile: &SystemProfile,
) -> crate::error::Result<String> {
    match check {
        CheckId::DirectoryStructure => {
            let created = generate::run_generator("directories", cfg, profile)?;
            Ok(format!("recreated {} directories", created.len()))
        }
        CheckId::ConfigurationFiles => {
            // Regenerate the whole primary artifact set; atomic writes
            // make re-creating a file that survived harmless.
            generate::run_generator("directories", cfg, profile)?;
            generate::run_generator("manifest", cfg, profile)?;
            generate::run_generator("environment", cfg, profile)?;
            generate::run_generator("compose", cfg, profile)?;
            generate::run_generator("scripts", cfg, profile)?;
            Ok("regenerated primary configuration artifacts".to_string())
        }
        CheckId::ConfigSyntax => {
            generate::run_generator("manifest", cfg, profile)?;
            Ok("regenerated the main manifest".to_string())
        }
        CheckId::FilePermissions => {
            let (start, stop) = script_paths(profile.os);
            let mut fixed = 0;
            for rel in [start, stop] {
                let path = cfg.install_dir.join(rel);
                if path.is_file() {
                    make_executable(&path)?;
                    fixed += 1;
                }
            }
            Ok(format!("re-applied execute bits on {fixed} scripts"))
        }
        CheckId::EncodingConsistency => {
            // Rewriting through the atomic writer restores the platform
            // encoding policy for every text artifact.
            generate::run_generator("manifest", cfg, profile)?;
            generate::run_generator("environment", cfg, profile)?;
            Ok("rewrote text artifacts with the platform encoding".to_string())
        }
        CheckId::ComposeStructure => {
            generate::run_generator("compose", cfg, profile)?;
            Ok("regenerated the orchestration file".to_string())
        }
        CheckId::EnvCompleteness => {
            generate::run_generator("environment", cfg, profile)?;
            Ok("regenerated the environment file".to_string())
        }
        CheckId::ScriptIntegrity => {
            generate::run_generator("scripts", cfg, profile)?;
            Ok("regenerated startup and shutdown scripts".to_string())
        }
        CheckId::DatabaseConfig => {
            generate::run_generator("database_config", cfg, profile)?;
            Ok("regenerated config/database.json".to_string())
        }
        CheckId::NetworkConfig => {
            generate::run_generator("network_config", cfg, profile)?;
            Ok("regenerated config/network.json".to_string())
        }
        CheckId::LoggingConfig => {
            generate::run_generator("logging_config", cfg, profile)?;
            Ok("regenerated config/logging.json".to_string())
        }
        CheckId::AiConfig => {
            generate::run_generator("ai_config", cfg, profile)?;
            Ok("regenerated config/ai.json".to_string())
        }
        // Closed set: everything below has no automatic fix and is
        // routed to manual suggestions by the caller.
        CheckId::PathCompatibility
        | CheckId::ServiceDependencies
        | CheckId::DiskSpace
        | CheckId::PlatformCompatibility => Ok("no automatic fix".to_string()),
    }
}

/// Platform-specific manual remediation steps for non-fixable failures.
pub fn manual_fix_suggestions(check: CheckId, os: OsFamily) -> Vec<String> {
    let mut suggestions: Vec<String> = match check {
        CheckId::ServiceDependencies => vec![
            "Install Docker from https://docs.docker.com/get-docker".to_string(),
            "Install Node.js from https://nodejs.org if mobile features are enabled".to_string(),
            "Restart your terminal after installation so PATH changes apply".to_string(),
        ],
        CheckId::PathCompatibility => vec![
            "Move the installation to a path without spaces".to_string(),
            "Use a short path to stay under platform path-length limits".to_string(),
            "Avoid reserved Windows device names (CON, PRN, AUX, NUL, COM1..)".to_string(),
        ],
        CheckId::DiskSpace => vec![
            "Free up disk space on the installation volume".to_string(),
            "Remove unused container images: docker system prune -a".to_string(),
            "Consider installing to a volume with more space".to_string(),
        ],
        CheckId::PlatformCompatibility => match os {
            OsFamily::Windows => vec![
                "Ensure Windows 10/11 with WSL2 support for Docker Desktop".to_string(),
                "Enable the Hyper-V and Windows Subsystem for Linux features".to_string(),
            ],
            OsFamily::Linux => vec![
                "Ensure systemd is available for service management".to_string(),
                "Add your user to the docker group: sudo usermod -aG docker $USER".to_string(),
            ],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    if suggestions.is_empty() {
        suggestions.push("Review the installation log for detailed diagnostics".to_string());
    }
    suggestions
}
