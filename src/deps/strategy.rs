//! Ordered installation strategies
//!
//! Each strategy wraps one way of getting a tool onto the host. The
//! resolver walks the chain in order and stops at the first verified
//! success, collecting the errors of every failed attempt along the
//! way. The chain is built from the detected package managers:
//! OS-native managers first, then universal fallbacks, then the
//! manual-download and containerized stubs.

use tracing::debug;

use crate::exec::{self, CmdStatus, INSTALL_TIMEOUT};
use crate::probe::{OsFamily, PackageManager, SystemProfile};

/// Result of one installation attempt
#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    /// The installer reported success; the caller still re-verifies
    Installed,
    /// The attempt ran and failed, with diagnostics
    Failed(String),
    /// This strategy cannot handle the given dependency
    Unsupported,
}

/// A single way of installing a dependency
pub trait InstallStrategy {
    fn label(&self) -> &'static str;

    /// Whether this strategy can even attempt the given dependency
    fn supports(&self, _dep: &str) -> bool {
        true
    }

    fn install(&self, dep: &str) -> StrategyOutcome;
}

/// Build the ordered strategy chain for a detected profile.
pub fn ordered_strategies(profile: &SystemProfile) -> Vec<Box<dyn InstallStrategy>> {
    let mut chain: Vec<Box<dyn InstallStrategy>> = Vec::new();
    let detected = &profile.package_managers;
    let elevated = profile.permissions.elevated;

    match profile.os {
        OsFamily::Windows => {
            for pm in [
                PackageManager::Winget,
                PackageManager::Choco,
                PackageManager::Scoop,
            ] {
                if detected.contains(&pm) {
                    chain.push(Box::new(PackageManagerInstall::new(pm, elevated)));
                }
            }
        }
        OsFamily::Linux => {
            // One native manager is enough; the first detected wins
            if let Some(pm) = PackageManager::native_for(OsFamily::Linux)
                .iter()
                .find(|pm| detected.contains(pm))
            {
                chain.push(Box::new(PackageManagerInstall::new(*pm, elevated)));
            }
            if detected.contains(&PackageManager::Snap) {
                chain.push(Box::new(PackageManagerInstall::new(
                    PackageManager::Snap,
                    elevated,
                )));
            }
        }
        OsFamily::Macos => {
            for pm in [PackageManager::Brew, PackageManager::Port] {
                if detected.contains(&pm) {
                    chain.push(Box::new(PackageManagerInstall::new(pm, elevated)));
                }
            }
        }
        OsFamily::Unknown => {}
    }

    chain.push(Box::new(ManualDownload));
    chain.push(Box::new(Containerized));
    chain
}

/// Installs through a detected package manager
pub struct PackageManagerInstall {
    manager: PackageManager,
    elevated: bool,
}

impl PackageManagerInstall {
    pub fn new(manager: PackageManager, elevated: bool) -> Self {
        Self { manager, elevated }
    }

    /// Distribution package name for a dependency under this manager
    fn package_name(&self, dep: &str) -> String {
        let mapped = match (self.manager, dep) {
            (PackageManager::Winget, "docker") => "Docker.DockerDesktop",
            (PackageManager::Winget, "git") => "Git.Git",
            (PackageManager::Winget, "node") => "OpenJS.NodeJS",
            (PackageManager::Choco, "docker") => "docker-desktop",
            (PackageManager::Choco, "node") => "nodejs",
            (PackageManager::AptGet | PackageManager::Apt, "docker") => "docker.io",
            (PackageManager::AptGet | PackageManager::Apt, "node") => "nodejs",
            (
                PackageManager::Yum
                | PackageManager::Dnf
                | PackageManager::Pacman
                | PackageManager::Zypper,
                "node",
            ) => "nodejs",
            _ => dep,
        };
        mapped.to_string()
    }

    /// Whether invocations must be wrapped in sudo on this platform
    fn needs_sudo(&self) -> bool {
        !self.elevated
            && matches!(
                self.manager,
                PackageManager::AptGet
                    | PackageManager::Apt
                    | PackageManager::Yum
                    | PackageManager::Dnf
                    | PackageManager::Pacman
                    | PackageManager::Zypper
                    | PackageManager::Snap
            )
    }

    fn install_args(&self, package: &str) -> Vec<String> {
        let args: Vec<&str> = match self.manager {
            PackageManager::Winget => vec![
                "install",
                package,
                "--accept-package-agreements",
                "--accept-source-agreements",
            ],
            PackageManager::Choco => vec!["install", package, "-y"],
            PackageManager::Scoop => vec!["install", package],
            PackageManager::AptGet | PackageManager::Apt => vec!["install", "-y", package],
            PackageManager::Yum | PackageManager::Dnf | PackageManager::Zypper => {
                vec!["install", "-y", package]
            }
            PackageManager::Pacman => vec!["-S", "--noconfirm", package],
            PackageManager::Brew => {
                if package == "docker" {
                    vec!["install", "--cask", "docker"]
                } else {
                    vec!["install", package]
                }
            }
            PackageManager::Port => vec!["install", package],
            PackageManager::Snap => vec!["install", package],
            PackageManager::Pip | PackageManager::Conda => vec!["install", package],
        };
        args.into_iter().map(str::to_string).collect()
    }

    fn run(&self, args: &[String]) -> StrategyOutcome {
        let (program, full_args): (&str, Vec<&str>) = if self.needs_sudo() {
            let mut v = vec![self.manager.command()];
            v.extend(args.iter().map(String::as_str));
            ("sudo", v)
        } else {
            (
                self.manager.command(),
                args.iter().map(String::as_str).collect(),
            )
        };

        let out = exec::run_command(program, &full_args, INSTALL_TIMEOUT);
        match out.status {
            CmdStatus::Success => StrategyOutcome::Installed,
            CmdStatus::TimedOut => {
                StrategyOutcome::Failed(format!("{} timed out", self.manager.command()))
            }
            _ => {
                let detail = if out.stderr.trim().is_empty() {
                    out.status.as_str().to_string()
                } else {
                    out.stderr.trim().lines().last().unwrap_or("").to_string()
                };
                StrategyOutcome::Failed(detail)
            }
        }
    }
}

impl InstallStrategy for PackageManagerInstall {
    fn label(&self) -> &'static str {
        self.manager.command()
    }

    fn supports(&self, dep: &str) -> bool {
        // Language-ecosystem managers cannot provide system tools
        !matches!(self.manager, PackageManager::Pip | PackageManager::Conda)
            || !matches!(dep, "docker" | "git" | "node")
    }

    fn install(&self, dep: &str) -> StrategyOutcome {
        let package = self.package_name(dep);

        // Debian-family installs need a fresh package index first
        if matches!(self.manager, PackageManager::AptGet | PackageManager::Apt) {
            let update: Vec<String> = vec!["update".to_string()];
            if let StrategyOutcome::Failed(reason) = self.run(&update) {
                debug!(manager = self.manager.command(), %reason, "package index update failed");
            }
        }

        self.run(&self.install_args(&package))
    }
}

/// Manual download-and-install fallback. Kept in the chain so every
/// attempt is accounted for, but downloads are not wired up yet.
pub struct ManualDownload;

impl InstallStrategy for ManualDownload {
    fn label(&self) -> &'static str {
        "manual-download"
    }

    fn install(&self, dep: &str) -> StrategyOutcome {
        debug!(tool = dep, "manual download strategy has no recipe for this tool");
        StrategyOutcome::Unsupported
    }
}

/// Containerized fallback: run the tool out of a container instead of
/// installing it on the host. Requires a container runtime, which is
/// usually the thing being installed, so this remains a stub.
pub struct Containerized;

impl InstallStrategy for Containerized {
    fn label(&self) -> &'static str {
        "containerized"
    }

    fn install(&self, dep: &str) -> StrategyOutcome {
        debug!(tool = dep, "containerized strategy not available for this tool");
        StrategyOutcome::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with(os: OsFamily, managers: Vec<PackageManager>) -> SystemProfile {
        let mut profile = SystemProfile::detect();
        profile.os = os;
        profile.package_managers = managers;
        profile
    }

    #[test]
    fn test_chain_ends_with_stub_strategies() {
        let profile = profile_with(OsFamily::Linux, vec![]);
        let chain = ordered_strategies(&profile);
        let labels: Vec<_> = chain.iter().map(|s| s.label()).collect();
        assert_eq!(
            &labels[labels.len() - 2..],
            &["manual-download", "containerized"]
        );
    }

    #[test]
    fn test_linux_uses_first_native_manager_only() {
        let profile = profile_with(
            OsFamily::Linux,
            vec![PackageManager::AptGet, PackageManager::Dnf],
        );
        let chain = ordered_strategies(&profile);
        let labels: Vec<_> = chain.iter().map(|s| s.label()).collect();
        assert!(labels.contains(&"apt-get"));
        assert!(!labels.contains(&"dnf"));
    }

    #[test]
    fn test_windows_tries_all_detected_managers() {
        let profile = profile_with(
            OsFamily::Windows,
            vec![
                PackageManager::Winget,
                PackageManager::Choco,
                PackageManager::Scoop,
            ],
        );
        let chain = ordered_strategies(&profile);
        let labels: Vec<_> = chain.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["winget", "choco", "scoop", "manual-download", "containerized"]);
    }

    #[test]
    fn test_package_name_mappings() {
        let apt = PackageManagerInstall::new(PackageManager::AptGet, true);
        assert_eq!(apt.package_name("docker"), "docker.io");
        assert_eq!(apt.package_name("git"), "git");

        let winget = PackageManagerInstall::new(PackageManager::Winget, true);
        assert_eq!(winget.package_name("docker"), "Docker.DockerDesktop");

        let brew = PackageManagerInstall::new(PackageManager::Brew, true);
        assert_eq!(brew.install_args("docker"), vec!["install", "--cask", "docker"]);
    }

    #[test]
    fn test_sudo_only_when_not_elevated() {
        let as_root = PackageManagerInstall::new(PackageManager::AptGet, true);
        assert!(!as_root.needs_sudo());

        let as_user = PackageManagerInstall::new(PackageManager::AptGet, false);
        assert!(as_user.needs_sudo());

        // Windows managers never use sudo
        let winget = PackageManagerInstall::new(PackageManager::Winget, false);
        assert!(!winget.needs_sudo());
    }

    #[test]
    fn test_stubs_report_unsupported() {
        assert!(matches!(
            ManualDownload.install("docker"),
            StrategyOutcome::Unsupported
        ));
        assert!(matches!(
            Containerized.install("docker"),
            StrategyOutcome::Unsupported
        ));
    }

    #[test]
    fn test_pip_does_not_support_system_tools() {
        let pip = PackageManagerInstall::new(PackageManager::Pip, false);
        assert!(!pip.supports("docker"));
        assert!(pip.supports("some-python-tool"));
    }
}
