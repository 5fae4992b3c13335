//! Dependency checking and installation
//!
//! Each required tool is probed directly (PATH lookup + version
//! command), compared against a minimum-version table component-wise,
//! and — when missing or outdated — queued for installation through an
//! ordered chain of platform strategies. After every attempted install
//! the tool is re-probed; the installer's exit code alone never counts
//! as success. Retries are capped per dependency and scoped to one
//! resolver instance.

pub mod strategy;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::InstallConfig;
use crate::error::{NoxupError, Result};
use crate::exec::{self, PROBE_TIMEOUT};
use crate::probe::SystemProfile;
use crate::wizard::Prompter;

use strategy::{InstallStrategy, StrategyOutcome};

/// Retry cap per dependency, scoped to one resolver instance
pub const MAX_RETRIES: u32 = 3;

/// A dotted version, compared component-wise and never lexicographically.
/// Shorter versions are zero-padded, so `1.0` equals `1.0.0`.
#[derive(Debug, Clone, Serialize)]
pub struct Version(Vec<u64>);

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Version {}

impl Version {
    /// Parse a dotted version, taking the leading digits of each
    /// component so suffixes like `-alpine` do not break parsing.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = Vec::new();
        for component in s.trim().trim_start_matches('v').split('.') {
            let digits: String = component.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                break;
            }
            parts.push(digits.parse().ok()?);
        }
        if parts.is_empty() { None } else { Some(Self(parts)) }
    }

    /// Extract the first dotted version run from arbitrary command
    /// output, e.g. `"Docker version 24.0.7, build afdd53b"`.
    pub fn extract(output: &str) -> Option<Self> {
        output
            .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
            .filter(|token| token.contains('.'))
            .find_map(Self::parse)
            .filter(|v| v.0.len() >= 2)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                std::cmp::Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        std::cmp::Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Minimum versions for the tools Noxup manages
pub fn required_version(tool: &str) -> Option<Version> {
    let raw = match tool {
        "docker" => "20.0.0",
        "git" => "2.20.0",
        "node" => "16.0.0",
        "npm" => "8.0.0",
        "python" => "3.8.0",
        _ => return None,
    };
    Version::parse(raw)
}

/// One tool the session needs before generation may begin
#[derive(Debug, Clone)]
pub struct RequiredTool {
    pub name: String,
    pub min_version: Option<Version>,
}

impl RequiredTool {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            min_version: required_version(name),
        }
    }

    /// Tool set for a configuration: docker and git always, node when
    /// mobile features or a react-based module are selected.
    pub fn for_config(cfg: &InstallConfig) -> Vec<Self> {
        let mut tools = vec![Self::named("docker"), Self::named("git")];
        let wants_node = cfg.features.mobile_enabled
            || cfg.modules.iter().any(|m| m.contains("react"));
        if wants_node {
            tools.push(Self::named("node"));
        }
        tools
    }
}

/// Per-check result, created fresh for every dependency pass
#[derive(Debug, Clone)]
pub struct DependencySpec {
    pub name: String,
    pub min_version: Option<Version>,
    pub resolved: Option<Version>,
    pub path: Option<PathBuf>,
    pub available: bool,
}

impl DependencySpec {
    /// Whether the probed state satisfies the requirement. A tool whose
    /// version could not be determined is given the benefit of the
    /// doubt; only a parsed, lower version counts as outdated.
    pub fn satisfied(&self) -> bool {
        if !self.available {
            return false;
        }
        match (&self.min_version, &self.resolved) {
            (Some(min), Some(found)) => found >= min,
            _ => true,
        }
    }
}

/// Probe one tool: PATH lookup plus a direct version command.
pub fn probe_dependency(tool: &RequiredTool) -> DependencySpec {
    let path = exec::which(&tool.name);
    let mut resolved = None;

    if path.is_some() {
        let out = exec::run_command(&tool.name, &["--version"], PROBE_TIMEOUT);
        if out.succeeded() {
            resolved = Version::extract(&out.stdout).or_else(|| Version::extract(&out.stderr));
        }
    }

    DependencySpec {
        name: tool.name.clone(),
        min_version: tool.min_version.clone(),
        resolved,
        available: path.is_some(),
        path,
    }
}

/// How one dependency ended up after the resolve pass
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DependencyStatus {
    Satisfied { version: Option<String> },
    Queued { reason: String },
    Installed { method: String, attempts: u32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: DependencyStatus,
}

/// Aggregate result of one resolve pass
#[derive(Debug, Clone, Serialize)]
pub struct ResolveReport {
    pub all_satisfied: bool,
    pub entries: Vec<DependencyOutcome>,
}

/// Resolver for one session. Retry counters live here and die with the
/// instance; they are never process-global.
pub struct DependencyResolver {
    strategies: Vec<Box<dyn InstallStrategy>>,
    retries: HashMap<String, u32>,
}

impl DependencyResolver {
    pub fn new(profile: &SystemProfile) -> Self {
        Self {
            strategies: strategy::ordered_strategies(profile),
            retries: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with_strategies(strategies: Vec<Box<dyn InstallStrategy>>) -> Self {
        Self {
            strategies,
            retries: HashMap::new(),
        }
    }

    /// Check all required tools, then install whatever is missing or
    /// outdated after user confirmation. A dependency whose retry cap
    /// is exhausted aborts the whole pass.
    pub fn resolve(
        &mut self,
        required: &[RequiredTool],
        prompter: &mut dyn Prompter,
        dry_run: bool,
    ) -> Result<ResolveReport> {
        let mut entries = Vec::new();
        let mut pending: Vec<(RequiredTool, String)> = Vec::new();

        for tool in required {
            let spec = probe_dependency(tool);
            if spec.satisfied() {
                debug!(
                    tool = %spec.name,
                    version = ?spec.resolved,
                    path = ?spec.path,
                    "dependency satisfied"
                );
                entries.push(DependencyOutcome {
                    name: spec.name.clone(),
                    status: DependencyStatus::Satisfied {
                        version: spec.resolved.as_ref().map(|v| v.to_string()),
                    },
                });
            } else {
                let reason = if spec.available {
                    format!(
                        "version {} below required {}",
                        spec.resolved
                            .as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "unknown".into()),
                        spec.min_version
                            .as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "unknown".into()),
                    )
                } else {
                    "not found".to_string()
                };
                pending.push((tool.clone(), reason));
            }
        }

        if pending.is_empty() {
            return Ok(ResolveReport {
                all_satisfied: true,
                entries,
            });
        }

        info!("missing or outdated dependencies:");
        for (tool, reason) in &pending {
            info!("  - {}: {}", tool.name, reason);
        }

        if dry_run {
            for (tool, reason) in pending {
                entries.push(DependencyOutcome {
                    name: tool.name,
                    status: DependencyStatus::Queued { reason },
                });
            }
            return Ok(ResolveReport {
                all_satisfied: false,
                entries,
            });
        }

        if !prompter.confirm("Install missing dependencies automatically?", true)? {
            return Err(NoxupError::InstallationDeclined);
        }

        let bar = ProgressBar::new(pending.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        for (tool, _) in pending {
            bar.set_message(tool.name.clone());
            let (method, attempts) = self.install_single(&tool)?;
            entries.push(DependencyOutcome {
                name: tool.name.clone(),
                status: DependencyStatus::Installed { method, attempts },
            });
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok(ResolveReport {
            all_satisfied: true,
            entries,
        })
    }

    /// Try the strategy chain for one dependency, re-probing after each
    /// claimed success, up to the retry cap.
    fn install_single(&mut self, tool: &RequiredTool) -> Result<(String, u32)> {
        if self.retries.get(&tool.name).copied().unwrap_or(0) >= MAX_RETRIES {
            return Err(NoxupError::RetriesExhausted {
                name: tool.name.clone(),
            });
        }

        loop {
            let attempt = {
                let counter = self.retries.entry(tool.name.clone()).or_insert(0);
                *counter += 1;
                *counter
            };

            for strat in &self.strategies {
                if !strat.supports(&tool.name) {
                    continue;
                }
                debug!(
                    tool = %tool.name,
                    method = strat.label(),
                    attempt,
                    "trying installation method"
                );
                match strat.install(&tool.name) {
                    StrategyOutcome::Installed => {
                        // Trust the re-probe, not the installer's exit code
                        let spec = probe_dependency(tool);
                        if spec.satisfied() {
                            info!(
                                tool = %tool.name,
                                method = strat.label(),
                                "dependency installed and verified"
                            );
                            return Ok((strat.label().to_string(), attempt));
                        }
                        warn!(
                            tool = %tool.name,
                            method = strat.label(),
                            "installer reported success but verification failed"
                        );
                    }
                    StrategyOutcome::Failed(reason) => {
                        debug!(
                            tool = %tool.name,
                            method = strat.label(),
                            %reason,
                            "installation method failed"
                        );
                    }
                    StrategyOutcome::Unsupported => {}
                }
            }

            if attempt == MAX_RETRIES {
                return Err(NoxupError::DependencyInstallFailed {
                    name: tool.name.clone(),
                    attempts: attempt,
                });
            }
        }
    }
}
