//! Installation session orchestration
//!
//! Composes the stages of one run: probe, configuration, pre-flight,
//! dependency resolution, artifact generation, validation and — in the
//! self-healing modes — repair plus re-validation. Stages run in order
//! because each stage's output is the next one's precondition.
//! Critical failures abort with an itemized summary; non-critical ones
//! accumulate into the final report.

use std::path::PathBuf;
use std::time::Duration;

use console::style;
use tracing::{info, warn};

use crate::config::{InstallConfig, InstallMode};
use crate::deps::{DependencyResolver, RequiredTool, ResolveReport};
use crate::error::{NoxupError, Result};
use crate::generate;
use crate::heal;
use crate::probe::{self, SystemProfile};
use crate::report::{self, InstallRunData};
use crate::validate;
use crate::wizard::{self, Prompter};

/// Timeout for the offline-install reachability probe
const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// CLI-level adjustments applied on top of mode defaults
#[derive(Debug, Default, Clone)]
pub struct SessionOverrides {
    pub install_dir: Option<PathBuf>,
    pub modules: Option<Vec<String>>,
    pub no_ai: bool,
    pub enable_voice: bool,
    pub enable_mobile: bool,
    pub dev_mode: bool,
    pub no_auto_start: bool,
    pub force_reinstall: bool,
    pub no_backup: bool,
}

/// Run one install-family session (guided, fast, dry-run, safe,
/// recovery). Audit-heal runs through `crate::audit` instead.
pub fn run(
    mode: InstallMode,
    overrides: &SessionOverrides,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let session_id = report::new_session_id();
    info!(session = %session_id, mode = mode.as_str(), "session started");

    // Stage 1: probe the host. Never fails.
    let profile = SystemProfile::detect();
    print_profile_line(&profile);

    warn_if_offline();

    // Stage 2: configuration
    let mut cfg = build_config(mode, overrides, prompter)?;
    info!(
        dir = %cfg.install_dir.display(),
        modules = ?cfg.modules,
        "configuration ready"
    );

    // Dry runs preview the plan and touch nothing on disk.
    if mode.is_dry_run() {
        return dry_run(&cfg, &profile, prompter);
    }

    // Stage 3: pre-flight. A non-writable target aborts here, before
    // any generator can fail halfway through.
    cfg.install_dir = wizard::preflight_install_dir(&cfg, &profile)?;

    if crate::audit::is_installation(&cfg.install_dir) && !cfg.force_reinstall {
        let overwrite = prompter.confirm(
            &format!(
                "Existing installation detected at {}, continue and overwrite?",
                cfg.install_dir.display()
            ),
            true,
        )?;
        if !overwrite {
            return Err(NoxupError::Cancelled);
        }
    }

    if cfg.backup_existing {
        backup_existing_records(&cfg);
    }

    // Stage 4: dependencies
    let mut resolver = DependencyResolver::new(&profile);
    let required = RequiredTool::for_config(&cfg);
    let dependencies = resolver.resolve(&required, prompter, false)?;

    // Stage 5: artifact generation
    let generation = generate::generate_all(&cfg, &profile)?;
    if !generation.failures.is_empty() {
        warn!(
            failed = generation.failures.len(),
            "generation finished with partial failures above the threshold"
        );
    }

    // Stage 6: validation
    let validation = validate::validate_all(&cfg, &profile);

    // Stage 7: healing, only in the self-healing modes
    let (healing, revalidation) = if !validation.all_passed && mode.auto_heals() {
        info!("attempting automatic healing of failed validations");
        let healing = heal::heal(&cfg, &profile, &validation.failures);
        let revalidation = validate::validate_all(&cfg, &profile);
        (Some(healing), Some(revalidation))
    } else {
        (None, None)
    };

    // Stage 8: reports are written even when validation failed
    let written = report::write_install_reports(&InstallRunData {
        session_id: &session_id,
        cfg: &cfg,
        profile: &profile,
        dependencies: Some(&dependencies),
        generation: Some(&generation),
        validation: Some(&validation),
        healing: healing.as_ref(),
        revalidation: revalidation.as_ref(),
    })?;
    for path in &written {
        info!(report = %path.display(), "report written");
    }

    let final_validation = revalidation.as_ref().unwrap_or(&validation);
    print_completion(&cfg, final_validation);

    let remaining_errors = final_validation.error_count();
    if remaining_errors > 0 {
        return Err(NoxupError::ValidationFailed {
            failed: remaining_errors,
        });
    }
    Ok(())
}

fn build_config(
    mode: InstallMode,
    overrides: &SessionOverrides,
    prompter: &mut dyn Prompter,
) -> Result<InstallConfig> {
    let mut cfg = if mode == InstallMode::Guided {
        wizard::guided_config(prompter)?
    } else {
        let dir = overrides
            .install_dir
            .clone()
            .unwrap_or_else(InstallConfig::default_install_dir);
        InstallConfig::with_defaults(dir, mode)
    };

    if let Some(dir) = &overrides.install_dir {
        cfg.install_dir = dir.clone();
    }
    if let Some(modules) = &overrides.modules {
        cfg.set_modules(modules.clone());
    }
    if overrides.no_ai {
        cfg.features.ai_enabled = false;
    }
    if overrides.enable_voice {
        cfg.features.voice_enabled = true;
    }
    if overrides.enable_mobile {
        cfg.features.mobile_enabled = true;
    }
    if overrides.dev_mode {
        cfg.features.dev_mode = true;
    }
    if overrides.no_auto_start {
        cfg.features.auto_start = false;
    }
    cfg.force_reinstall = overrides.force_reinstall;
    cfg.backup_existing = !overrides.no_backup;
    Ok(cfg)
}

/// Preview a run without writing anything: dependency queue, artifact
/// paths and the report all go to the log only.
fn dry_run(
    cfg: &InstallConfig,
    profile: &SystemProfile,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    println!(
        "{} nothing will be written to disk",
        style("[DRY RUN]").bold().cyan()
    );

    let mut resolver = DependencyResolver::new(profile);
    let required = RequiredTool::for_config(cfg);
    let dependencies: ResolveReport = resolver.resolve(&required, prompter, true)?;
    for entry in &dependencies.entries {
        println!(
            "{} dependency {}: {}",
            style("[DRY RUN]").cyan(),
            entry.name,
            serde_json::to_string(&entry.status).unwrap_or_default()
        );
    }

    println!(
        "{} would create under {}:",
        style("[DRY RUN]").cyan(),
        cfg.install_dir.display()
    );
    for path in generate::preview(cfg, profile) {
        println!("{}   {}", style("[DRY RUN]").cyan(), path);
    }

    println!(
        "{} session complete, no files written",
        style("[DRY RUN]").bold().cyan()
    );
    Ok(())
}

/// Copy the existing records aside before a re-install overwrites them.
fn backup_existing_records(cfg: &InstallConfig) {
    let candidates = crate::config::Manifest::record_candidates(&cfg.install_dir);
    let existing: Vec<_> = candidates.iter().filter(|p| p.is_file()).collect();
    if existing.is_empty() {
        return;
    }

    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let backup_dir = cfg.install_dir.join("backups").join(stamp.to_string());
    if let Err(e) = std::fs::create_dir_all(&backup_dir) {
        warn!(error = %e, "could not create backup directory, skipping backup");
        return;
    }

    for path in existing {
        let Some(name) = path.file_name() else { continue };
        match std::fs::copy(path, backup_dir.join(name)) {
            Ok(_) => info!(file = %path.display(), "backed up existing record"),
            Err(e) => warn!(file = %path.display(), error = %e, "backup failed"),
        }
    }
}

fn warn_if_offline() {
    let reachability = probe::check_reachability(REACHABILITY_TIMEOUT);
    if reachability.iter().all(|(_, ok)| !ok) {
        warn!("no configured endpoint is reachable; installs needing downloads may fail");
        println!(
            "{} network appears unreachable, continuing offline",
            style("warning:").yellow().bold()
        );
    }
}

fn print_profile_line(profile: &SystemProfile) {
    println!(
        "{} {} {} | {} GB RAM | {} cores | {} package manager(s)",
        style("Detected:").bold(),
        profile.os.as_str(),
        profile.arch,
        profile.memory_gb,
        profile.cpu_cores,
        profile.package_managers.len()
    );
}

fn print_completion(cfg: &InstallConfig, validation: &validate::ValidationResult) {
    if validation.all_passed {
        println!(
            "{} NoxSuite installed at {}",
            style("Success:").green().bold(),
            cfg.install_dir.display()
        );
        println!("  Web UI:   http://localhost:3000");
        println!("  API docs: http://localhost:8000/api/docs");
        if cfg.features.ai_enabled {
            println!("  Langflow: http://localhost:7860");
        }
    } else {
        println!(
            "{} installation finished with {} unresolved issue(s); see {}",
            style("Attention:").yellow().bold(),
            validation.failures.len(),
            report::INSTALL_REPORT_MD
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::ScriptedPrompter;
    use tempfile::TempDir;

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("nox-dry");
        let overrides = SessionOverrides {
            install_dir: Some(target.clone()),
            modules: Some(vec!["core".to_string()]),
            ..SessionOverrides::default()
        };
        let mut prompter = ScriptedPrompter::default();

        run(InstallMode::DryRun, &overrides, &mut prompter).unwrap();

        assert!(!target.exists(), "dry run must not create the install dir");
    }

    #[test]
    fn test_build_config_applies_overrides() {
        let overrides = SessionOverrides {
            install_dir: Some(PathBuf::from("/tmp/nox-o")),
            modules: Some(vec!["core".to_string(), "core".to_string()]),
            no_ai: true,
            dev_mode: true,
            no_auto_start: true,
            no_backup: true,
            ..SessionOverrides::default()
        };
        let mut prompter = ScriptedPrompter::default();

        let cfg = build_config(InstallMode::Fast, &overrides, &mut prompter).unwrap();
        assert_eq!(cfg.install_dir, PathBuf::from("/tmp/nox-o"));
        assert_eq!(cfg.modules, vec!["core"]);
        assert!(!cfg.features.ai_enabled);
        assert!(cfg.features.dev_mode);
        assert!(!cfg.features.auto_start);
        assert!(!cfg.backup_existing);
    }

    #[test]
    fn test_backup_copies_existing_records() {
        let temp = TempDir::new().unwrap();
        let cfg = InstallConfig::with_defaults(temp.path().to_path_buf(), InstallMode::Fast);
        std::fs::write(temp.path().join("noxsuite.json"), "{}").unwrap();

        backup_existing_records(&cfg);

        let backups = temp.path().join("backups");
        let copied = walkdir::WalkDir::new(&backups)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .count();
        assert_eq!(copied, 1);
    }

    #[test]
    fn test_backup_noop_without_records() {
        let temp = TempDir::new().unwrap();
        let cfg = InstallConfig::with_defaults(temp.path().to_path_buf(), InstallMode::Fast);

        backup_existing_records(&cfg);

        assert!(!temp.path().join("backups").exists());
    }
}
