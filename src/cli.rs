//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::InstallMode;

/// Noxup - self-healing NoxSuite installer
///
/// Detects the host, resolves dependencies, generates configuration and
/// validates (or repairs) the result.
#[derive(Parser, Debug)]
#[command(
    name = "noxup",
    author,
    version,
    color = clap::ColorChoice::Always,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Self-healing cross-platform installer for the NoxSuite stack",
    long_about = "Noxup installs, validates and repairs NoxSuite deployments. It probes the host, \
                  resolves missing tools through the platform's package managers, generates the \
                  configuration artifacts atomically, and can audit and heal an existing \
                  installation without user intervention.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  noxup guided\n    \
                  noxup fast --install-dir ~/noxsuite\n    \
                  noxup dry-run --install-dir /tmp/nox-test --modules core\n    \
                  noxup recovery\n    \
                  noxup audit-heal\n\n\
                  \x1b[1m\x1b[32mDocumentation:\x1b[0m\n    \
                  https://github.com/noxsuite/noxup"
)]
pub struct Cli {
    /// Target installation directory (defaults to ~/noxsuite)
    #[arg(long, short = 'd', global = true)]
    pub install_dir: Option<PathBuf>,

    /// Answer every prompt with its default
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive installation with prompts for every choice
    Guided(InstallArgs),

    /// Non-interactive installation with sensible defaults
    Fast(InstallArgs),

    /// Preview the installation without writing anything
    DryRun(InstallArgs),

    /// Install, then automatically heal validation failures
    Safe(InstallArgs),

    /// Re-run generation and healing over a broken installation
    Recovery(InstallArgs),

    /// Audit an existing installation and repair what can be repaired
    AuditHeal(AuditHealArgs),

    /// Show version information
    Version,
}

impl Command {
    pub fn mode(&self) -> Option<InstallMode> {
        match self {
            Self::Guided(_) => Some(InstallMode::Guided),
            Self::Fast(_) => Some(InstallMode::Fast),
            Self::DryRun(_) => Some(InstallMode::DryRun),
            Self::Safe(_) => Some(InstallMode::Safe),
            Self::Recovery(_) => Some(InstallMode::Recovery),
            Self::AuditHeal(_) => Some(InstallMode::AuditHeal),
            Self::Version => None,
        }
    }
}

/// Arguments shared by the install-family commands
#[derive(Parser, Debug, Default)]
#[command(after_help = "EXAMPLES:\n  \
                  Default install:\n    noxup fast\n\n\
                  Specific directory and modules:\n    noxup fast -d /opt/noxsuite --modules noxpanel noxguard\n\n\
                  Without AI services:\n    noxup fast --no-ai\n\n\
                  Preview only:\n    noxup dry-run -d /tmp/nox-test --modules core")]
pub struct InstallArgs {
    /// Modules to install (defaults to noxpanel noxguard)
    #[arg(long, value_name = "MODULE", num_args = 1..)]
    pub modules: Vec<String>,

    /// Disable the AI services (Langflow, Ollama)
    #[arg(long)]
    pub no_ai: bool,

    /// Enable voice features
    #[arg(long)]
    pub enable_voice: bool,

    /// Enable mobile companion support (pulls in Node.js)
    #[arg(long)]
    pub enable_mobile: bool,

    /// Development mode: debug logging, source mounts
    #[arg(long)]
    pub dev_mode: bool,

    /// Do not open the web interface after startup
    #[arg(long)]
    pub no_auto_start: bool,

    /// Reinstall even over an existing healthy installation
    #[arg(long)]
    pub force: bool,

    /// Skip backing up existing records before overwriting
    #[arg(long)]
    pub no_backup: bool,
}

/// Arguments for the audit-heal command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Discover and audit:\n    noxup audit-heal\n\n\
                  Audit one directory:\n    noxup audit-heal --target /opt/noxsuite\n\n\
                  Non-interactive healing:\n    noxup audit-heal --target /opt/noxsuite -y")]
pub struct AuditHealArgs {
    /// Audit this directory instead of scanning for installations
    #[arg(long, value_name = "DIR")]
    pub target: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_fast_with_options() {
        let cli = Cli::try_parse_from([
            "noxup",
            "fast",
            "--install-dir",
            "/opt/noxsuite",
            "--modules",
            "noxpanel",
            "noxguard",
            "--no-ai",
        ])
        .unwrap();
        assert_eq!(cli.install_dir, Some(PathBuf::from("/opt/noxsuite")));
        match cli.command {
            Command::Fast(args) => {
                assert_eq!(args.modules, vec!["noxpanel", "noxguard"]);
                assert!(args.no_ai);
                assert!(!args.dev_mode);
            }
            _ => panic!("Expected Fast command"),
        }
    }

    #[test]
    fn test_cli_parsing_dry_run() {
        let cli = Cli::try_parse_from([
            "noxup",
            "dry-run",
            "-d",
            "/tmp/nox-test",
            "--modules",
            "core",
        ])
        .unwrap();
        assert_eq!(cli.command.mode(), Some(InstallMode::DryRun));
        assert_eq!(cli.install_dir, Some(PathBuf::from("/tmp/nox-test")));
    }

    #[test]
    fn test_cli_parsing_audit_heal_target() {
        let cli =
            Cli::try_parse_from(["noxup", "audit-heal", "--target", "/opt/noxsuite", "-y"])
                .unwrap();
        assert!(cli.yes);
        match cli.command {
            Command::AuditHeal(args) => {
                assert_eq!(args.target, Some(PathBuf::from("/opt/noxsuite")));
            }
            _ => panic!("Expected AuditHeal command"),
        }
    }

    #[test]
    fn test_cli_parsing_guided_default() {
        let cli = Cli::try_parse_from(["noxup", "guided"]).unwrap();
        assert_eq!(cli.command.mode(), Some(InstallMode::Guided));
        assert!(!cli.yes);
    }

    #[test]
    fn test_cli_parsing_version() {
        let cli = Cli::try_parse_from(["noxup", "version"]).unwrap();
        assert!(matches!(cli.command, Command::Version));
        assert_eq!(cli.command.mode(), None);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["noxup", "fast", "-v", "-y"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.yes);
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["noxup", "turbo"]).is_err());
    }
}
