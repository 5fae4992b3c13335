//! Noxup - self-healing NoxSuite installer
//!
//! A cross-platform installation engine: probes the host, resolves
//! missing dependencies through the platform's package managers,
//! generates configuration artifacts atomically, validates the result
//! and repairs what it can without user intervention.

use clap::Parser;

mod atomic;
mod audit;
mod cli;
mod config;
mod deps;
mod error;
mod exec;
mod generate;
mod heal;
mod logging;
mod probe;
mod report;
mod session;
mod validate;
mod wizard;

use cli::{Cli, Command, InstallArgs};
use config::InstallMode;
use error::{NoxupError, Result};
use session::SessionOverrides;
use wizard::{AssumeDefaults, Prompter, TerminalPrompter};

fn overrides_from(cli: &Cli, args: &InstallArgs) -> SessionOverrides {
    SessionOverrides {
        install_dir: cli.install_dir.clone(),
        modules: if args.modules.is_empty() {
            None
        } else {
            Some(args.modules.clone())
        },
        no_ai: args.no_ai,
        enable_voice: args.enable_voice,
        enable_mobile: args.enable_mobile,
        dev_mode: args.dev_mode,
        no_auto_start: args.no_auto_start,
        force_reinstall: args.force,
        no_backup: args.no_backup,
    }
}

/// Interactive prompts only where the mode is interactive and the user
/// has not passed `--yes`.
fn prompter_for(mode: InstallMode, assume_yes: bool) -> Box<dyn Prompter> {
    let interactive = matches!(mode, InstallMode::Guided | InstallMode::AuditHeal);
    if interactive && !assume_yes {
        Box::new(TerminalPrompter)
    } else {
        Box::new(AssumeDefaults)
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Version => {
            println!("noxup {}", config::INSTALLER_VERSION);
            Ok(())
        }
        Command::AuditHeal(args) => {
            let profile = probe::SystemProfile::detect();
            let mut prompter = prompter_for(InstallMode::AuditHeal, cli.yes);
            let mut controller =
                audit::AuditRecoveryController::new(&profile, prompter.as_mut());
            let target = args.target.clone().or_else(|| cli.install_dir.clone());
            let summary = controller.run(target)?;
            tracing::debug!(stage = ?summary.stage_reached, "audit run finished");
            if summary.healthy {
                println!("Installation healthy: {}", summary.target.display());
            } else {
                println!(
                    "Issues remain for {} ({} healed automatically)",
                    summary.target.display(),
                    summary.healed
                );
            }
            Ok(())
        }
        Command::Guided(args)
        | Command::Fast(args)
        | Command::DryRun(args)
        | Command::Safe(args)
        | Command::Recovery(args) => {
            // mode() is Some for every install-family command
            let mode = cli.command.mode().unwrap_or(InstallMode::Fast);
            let overrides = overrides_from(&cli, args);
            let mut prompter = prompter_for(mode, cli.yes);
            session::run(mode, &overrides, prompter.as_mut())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match dispatch(cli) {
        Ok(()) => {}
        Err(NoxupError::Cancelled) => {
            eprintln!("Cancelled");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
