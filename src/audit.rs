//! Audit and recovery of pre-existing installations
//!
//! The controller walks a fixed state machine:
//! `Idle -> Discover -> Select -> LoadConfig -> Audit -> [Heal ->
//! ReAudit] -> Report -> Done`. Discovery scans OS-conventional install
//! locations plus the working directory for marker files; a directory
//! qualifies as a managed installation when at least two markers are
//! present. The terminal state always emits a structured report, even
//! when issues remain.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use console::style;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::{InstallConfig, InstallMode, Manifest};
use crate::error::{NoxupError, Result};
use crate::heal::{self, HealingResult};
use crate::probe::{OsFamily, SystemProfile};
use crate::report::{self, AuditRunData};
use crate::validate::{self, Severity, ValidationResult};
use crate::wizard::Prompter;

/// Marker files whose presence identifies a managed installation
pub const MARKER_FILES: &[&str] = &[
    "noxsuite.json",
    "INSTALLATION_SUMMARY.json",
    "config/noxsuite.json",
    "docker/docker-compose.noxsuite.yml",
];

/// Markers required before a directory qualifies
pub const MIN_MARKERS: usize = 2;

/// Stages of one audit run, recorded for the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    Idle,
    Discover,
    Select,
    LoadConfig,
    Audit,
    Heal,
    ReAudit,
    Report,
    Done,
}

/// Whether a directory contains a managed installation
pub fn is_installation(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    let markers = MARKER_FILES
        .iter()
        .filter(|marker| path.join(marker).is_file())
        .count();
    markers >= MIN_MARKERS
}

/// OS-conventional install roots checked during discovery
fn conventional_roots(os: OsFamily) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join("NoxSuite"));
        roots.push(home.join("noxsuite"));
        if os.is_windows() {
            roots.push(home.join("Documents").join("NoxSuite"));
        }
    }
    if os.is_windows() {
        roots.push(PathBuf::from("C:\\Program Files\\NoxSuite"));
        roots.push(PathBuf::from("C:\\NoxSuite"));
    } else {
        roots.push(PathBuf::from("/opt/noxsuite"));
        roots.push(PathBuf::from("/usr/local/noxsuite"));
        roots.push(PathBuf::from("/var/lib/noxsuite"));
    }
    roots
}

/// Scan for existing installations: the conventional roots, the current
/// working directory, and one level below the home directory.
pub fn discover(os: OsFamily) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();

    let mut candidates = conventional_roots(os);
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }

    for candidate in candidates {
        if is_installation(&candidate) {
            found.insert(normalize(&candidate));
        }
    }

    // Shallow sweep of home for installs in non-conventional places
    if let Some(home) = dirs::home_dir() {
        for entry in WalkDir::new(&home)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_dir())
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        {
            if is_installation(entry.path()) {
                found.insert(normalize(entry.path()));
            }
        }
    }

    found.into_iter().collect()
}

fn normalize(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Summary of one completed audit run
pub struct AuditSummary {
    pub target: PathBuf,
    pub healthy: bool,
    pub healed: usize,
    pub stage_reached: AuditStage,
}

/// Top-level audit-heal controller
pub struct AuditRecoveryController<'a> {
    profile: &'a SystemProfile,
    prompter: &'a mut dyn Prompter,
    stage: AuditStage,
}

impl<'a> AuditRecoveryController<'a> {
    pub fn new(profile: &'a SystemProfile, prompter: &'a mut dyn Prompter) -> Self {
        Self {
            profile,
            prompter,
            stage: AuditStage::Idle,
        }
    }

    /// Run the full audit state machine. `target_override` skips
    /// discovery-wide selection and audits one directory directly.
    pub fn run(&mut self, target_override: Option<PathBuf>) -> Result<AuditSummary> {
        self.stage = AuditStage::Discover;
        let discovered = match &target_override {
            Some(target) => {
                if !is_installation(target) {
                    return Err(NoxupError::NotAnInstallation {
                        path: target.display().to_string(),
                    });
                }
                vec![normalize(target)]
            }
            None => {
                let found = discover(self.profile.os);
                if found.is_empty() {
                    return Err(NoxupError::NoInstallationsFound);
                }
                found
            }
        };
        info!(count = discovered.len(), "installations discovered");

        self.stage = AuditStage::Select;
        let target = self.select_target(&discovered)?;
        println!(
            "{} {}",
            style("Auditing installation:").bold(),
            target.display()
        );

        self.stage = AuditStage::LoadConfig;
        let cfg = self.load_config(&target);

        self.stage = AuditStage::Audit;
        let audit = validate::validate_all(&cfg, self.profile);
        self.print_audit_summary(&audit);

        let mut healing: Option<HealingResult> = None;
        let mut reaudit: Option<ValidationResult> = None;

        if !audit.all_passed {
            let fixable = audit.failures.iter().filter(|f| f.auto_fix_available).count();
            if fixable > 0
                && self.prompter.confirm(
                    &format!("Attempt automatic healing of {fixable} detected issue(s)?"),
                    true,
                )?
            {
                self.stage = AuditStage::Heal;
                let result = heal::heal(&cfg, self.profile, &audit.failures);
                println!(
                    "{} healed {}, failed {}",
                    style("Healing:").bold(),
                    result.healed_count,
                    result.failed_count
                );

                if result.healed_count > 0 {
                    self.stage = AuditStage::ReAudit;
                    let second = validate::validate_all(&cfg, self.profile);
                    self.print_audit_summary(&second);
                    reaudit = Some(second);
                }
                healing = Some(result);
            } else {
                info!("automatic healing skipped");
            }
        }

        self.stage = AuditStage::Report;
        let session_id = report::new_session_id();
        let (json_path, md_path) = report::write_audit_reports(&AuditRunData {
            session_id: &session_id,
            target: &target,
            discovered: &discovered,
            profile: self.profile,
            audit: &audit,
            healing: healing.as_ref(),
            reaudit: reaudit.as_ref(),
        })?;
        println!(
            "{} {} and {}",
            style("Audit reports saved:").bold(),
            json_path.display(),
            md_path.display()
        );

        self.stage = AuditStage::Done;
        let final_validation = reaudit.as_ref().unwrap_or(&audit);
        Ok(AuditSummary {
            target,
            healthy: final_validation.all_passed,
            healed: healing.as_ref().map(|h| h.healed_count).unwrap_or(0),
            stage_reached: self.stage,
        })
    }

    /// No-op with one candidate, interactive disambiguation otherwise.
    fn select_target(&mut self, discovered: &[PathBuf]) -> Result<PathBuf> {
        if discovered.len() == 1 {
            return Ok(discovered[0].clone());
        }
        let options: Vec<String> = discovered
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let index = self
            .prompter
            .select("Multiple installations found, pick one to audit", &options)?;
        discovered
            .get(index)
            .cloned()
            .ok_or(NoxupError::Cancelled)
    }

    /// Reconstruct configuration from the best on-disk record, falling
    /// back to defaults aimed at the discovered directory.
    fn load_config(&self, target: &Path) -> InstallConfig {
        match Manifest::load(target) {
            Some((manifest, source)) => {
                info!(record = %source.display(), "configuration reconstructed");
                manifest.to_config(target, InstallMode::AuditHeal)
            }
            None => {
                warn!("no readable installation record, using defaults");
                InstallConfig::with_defaults(target.to_path_buf(), InstallMode::AuditHeal)
            }
        }
    }

    fn print_audit_summary(&self, result: &ValidationResult) {
        if result.all_passed {
            println!(
                "{} all {} checks passed",
                style("Audit:").bold().green(),
                result.total
            );
            return;
        }
        println!(
            "{} {}/{} checks passed",
            style("Audit:").bold().yellow(),
            result.passed,
            result.total
        );
        for failure in &result.failures {
            let tag = match failure.severity {
                Severity::Error => style("error").red(),
                Severity::Warning => style("warning").yellow(),
                Severity::Info => style("info").dim(),
            };
            println!("  [{}] {}: {}", tag, failure.check.name(), failure.message);
        }
    }
}
