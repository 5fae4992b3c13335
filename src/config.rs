//! Install configuration and on-disk installation records
//!
//! `InstallConfig` is owned by the active session: built by the wizard
//! in guided mode, from fixed defaults otherwise, or reconstructed from
//! disk by audit mode. The on-disk `Manifest` is the durable trace of a
//! completed run and must stay forward compatible: unknown fields are
//! ignored and missing fields are defaulted, because newer and older
//! versions of the tool read each other's records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::atomic::strip_bom;
use crate::probe::SystemProfile;

/// Schema version written into every manifest
pub const MANIFEST_VERSION: &str = "2.0.0";

/// Installer version recorded in manifests and reports
pub const INSTALLER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Primary manifest, relative to the install directory
pub const MANIFEST_PATH: &str = "config/noxsuite.json";

/// Run summary, relative to the install directory
pub const SUMMARY_PATH: &str = "INSTALLATION_SUMMARY.json";

/// Service orchestration file, relative to the install directory
pub const COMPOSE_PATH: &str = "docker/docker-compose.noxsuite.yml";

/// Environment file, relative to the install directory
pub const ENV_PATH: &str = ".env";

/// Modules installed when the user does not choose otherwise
pub const DEFAULT_MODULES: &[&str] = &["noxpanel", "noxguard"];

/// The supported run modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallMode {
    Guided,
    Fast,
    DryRun,
    Safe,
    Recovery,
    AuditHeal,
}

impl InstallMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guided => "guided",
            Self::Fast => "fast",
            Self::DryRun => "dry-run",
            Self::Safe => "safe",
            Self::Recovery => "recovery",
            Self::AuditHeal => "audit-heal",
        }
    }

    /// Dry runs preview everything and write nothing
    pub fn is_dry_run(self) -> bool {
        self == Self::DryRun
    }

    /// Modes that attempt healing automatically after validation
    pub fn auto_heals(self) -> bool {
        matches!(self, Self::Safe | Self::Recovery)
    }
}

/// Optional feature toggles, serialized under their record names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub ai_enabled: bool,
    pub voice_enabled: bool,
    pub mobile_enabled: bool,
    pub dev_mode: bool,
    pub auto_start: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            ai_enabled: true,
            voice_enabled: false,
            mobile_enabled: false,
            dev_mode: false,
            auto_start: true,
        }
    }
}

/// Configuration for one installation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    pub install_dir: PathBuf,
    pub modules: Vec<String>,
    pub features: FeatureFlags,
    pub mode: InstallMode,
    pub force_reinstall: bool,
    pub backup_existing: bool,
}

impl InstallConfig {
    /// Non-interactive defaults for the given directory and mode
    pub fn with_defaults(install_dir: PathBuf, mode: InstallMode) -> Self {
        Self {
            install_dir,
            modules: DEFAULT_MODULES.iter().map(|m| m.to_string()).collect(),
            features: FeatureFlags::default(),
            mode,
            force_reinstall: false,
            backup_existing: true,
        }
    }

    /// Default install location when none is given: `~/noxsuite`,
    /// falling back to a path under the current directory.
    pub fn default_install_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join("noxsuite"))
            .unwrap_or_else(|| PathBuf::from("noxsuite"))
    }

    /// Ordered, deduplicated module list
    pub fn set_modules(&mut self, modules: Vec<String>) {
        let mut seen = std::collections::BTreeSet::new();
        self.modules = modules
            .into_iter()
            .filter(|m| !m.trim().is_empty())
            .filter(|m| seen.insert(m.clone()))
            .collect();
    }
}

/// One module entry in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleEntry {
    pub enabled: bool,
    pub version: String,
}

impl Default for ModuleEntry {
    fn default() -> Self {
        Self {
            enabled: true,
            version: MANIFEST_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallationBlock {
    pub directory: String,
    pub installed_at: String,
    pub installer_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSnapshot {
    pub os_type: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub memory_gb: u64,
}

/// The durable on-disk record of an installation.
///
/// Reading tolerates schema drift in both directions: every field
/// defaults when missing and unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub version: String,
    pub installation: InstallationBlock,
    pub modules: BTreeMap<String, ModuleEntry>,
    pub features: FeatureFlags,
    pub system: SystemSnapshot,
}

impl Manifest {
    /// Build a fresh manifest for the current run
    pub fn build(cfg: &InstallConfig, profile: &SystemProfile) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            installation: InstallationBlock {
                directory: cfg.install_dir.display().to_string(),
                installed_at: chrono::Utc::now().to_rfc3339(),
                installer_version: INSTALLER_VERSION.to_string(),
            },
            modules: cfg
                .modules
                .iter()
                .map(|m| (m.clone(), ModuleEntry::default()))
                .collect(),
            features: cfg.features.clone(),
            system: SystemSnapshot {
                os_type: profile.os.as_str().to_string(),
                architecture: profile.arch.clone(),
                cpu_cores: profile.cpu_cores,
                memory_gb: profile.memory_gb,
            },
        }
    }

    /// Record files consulted when reconstructing configuration, most
    /// authoritative first.
    pub fn record_candidates(install_dir: &Path) -> [PathBuf; 3] {
        [
            install_dir.join(MANIFEST_PATH),
            install_dir.join("noxsuite.json"),
            install_dir.join(SUMMARY_PATH),
        ]
    }

    /// Load the most authoritative record available under a directory.
    ///
    /// Returns `None` when no record parses; partial records load with
    /// defaults for whatever is missing.
    pub fn load(install_dir: &Path) -> Option<(Manifest, PathBuf)> {
        for candidate in Self::record_candidates(install_dir) {
            let Ok(raw) = std::fs::read_to_string(&candidate) else {
                continue;
            };
            match serde_json::from_str::<Manifest>(strip_bom(&raw)) {
                Ok(manifest) => return Some((manifest, candidate)),
                Err(e) => {
                    tracing::warn!(
                        path = %candidate.display(),
                        error = %e,
                        "skipping unreadable installation record"
                    );
                }
            }
        }
        None
    }

    /// Reconstruct an `InstallConfig` from this record, defaulting
    /// gracefully when fields are absent.
    pub fn to_config(&self, install_dir: &Path, mode: InstallMode) -> InstallConfig {
        let modules: Vec<String> = if self.modules.is_empty() {
            DEFAULT_MODULES.iter().map(|m| m.to_string()).collect()
        } else {
            self.modules
                .iter()
                .filter(|(_, entry)| entry.enabled)
                .map(|(name, _)| name.clone())
                .collect()
        };

        InstallConfig {
            install_dir: install_dir.to_path_buf(),
            modules,
            features: self.features.clone(),
            mode,
            force_reinstall: false,
            backup_existing: true,
        }
    }

    pub fn to_json_pretty(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mode_roundtrip_names() {
        assert_eq!(InstallMode::AuditHeal.as_str(), "audit-heal");
        assert!(InstallMode::DryRun.is_dry_run());
        assert!(InstallMode::Safe.auto_heals());
        assert!(InstallMode::Recovery.auto_heals());
        assert!(!InstallMode::Fast.auto_heals());
    }

    #[test]
    fn test_set_modules_dedupes_and_keeps_order() {
        let mut cfg = InstallConfig::with_defaults(PathBuf::from("/tmp/x"), InstallMode::Fast);
        cfg.set_modules(vec![
            "core".to_string(),
            "noxpanel".to_string(),
            "core".to_string(),
            "".to_string(),
        ]);
        assert_eq!(cfg.modules, vec!["core", "noxpanel"]);
    }

    #[test]
    fn test_manifest_ignores_unknown_fields() {
        let raw = r#"{
            "version": "9.9.9",
            "installation": {"directory": "/opt/nox", "future_field": 42},
            "brand_new_top_level": {"nested": true}
        }"#;
        let manifest: Manifest = serde_json::from_str(raw).unwrap();
        assert_eq!(manifest.version, "9.9.9");
        assert_eq!(manifest.installation.directory, "/opt/nox");
        // Missing sections default rather than fail
        assert!(manifest.modules.is_empty());
        assert!(manifest.features.ai_enabled);
    }

    #[test]
    fn test_manifest_defaults_missing_fields() {
        let manifest: Manifest = serde_json::from_str("{}").unwrap();
        assert!(manifest.version.is_empty());
        assert!(manifest.system.os_type.is_empty());
    }

    #[test]
    fn test_load_prefers_config_manifest_over_summary() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("config")).unwrap();
        std::fs::write(
            temp.path().join(MANIFEST_PATH),
            r#"{"version": "from-config"}"#,
        )
        .unwrap();
        std::fs::write(
            temp.path().join(SUMMARY_PATH),
            r#"{"version": "from-summary"}"#,
        )
        .unwrap();

        let (manifest, path) = Manifest::load(temp.path()).unwrap();
        assert_eq!(manifest.version, "from-config");
        assert!(path.ends_with(MANIFEST_PATH));
    }

    #[test]
    fn test_load_falls_back_past_corrupt_record() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("config")).unwrap();
        std::fs::write(temp.path().join(MANIFEST_PATH), "{ not json").unwrap();
        std::fs::write(
            temp.path().join(SUMMARY_PATH),
            r#"{"version": "from-summary"}"#,
        )
        .unwrap();

        let (manifest, path) = Manifest::load(temp.path()).unwrap();
        assert_eq!(manifest.version, "from-summary");
        assert!(path.ends_with(SUMMARY_PATH));
    }

    #[test]
    fn test_load_tolerates_bom() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("noxsuite.json"),
            "\u{feff}{\"version\": \"bom\"}",
        )
        .unwrap();

        let (manifest, _) = Manifest::load(temp.path()).unwrap();
        assert_eq!(manifest.version, "bom");
    }

    #[test]
    fn test_to_config_skips_disabled_modules() {
        let raw = r#"{
            "modules": {
                "noxpanel": {"enabled": true, "version": "2.0.0"},
                "legacy": {"enabled": false, "version": "1.0.0"}
            }
        }"#;
        let manifest: Manifest = serde_json::from_str(raw).unwrap();
        let cfg = manifest.to_config(Path::new("/opt/nox"), InstallMode::AuditHeal);
        assert_eq!(cfg.modules, vec!["noxpanel"]);
        assert_eq!(cfg.mode, InstallMode::AuditHeal);
    }

    #[test]
    fn test_to_config_defaults_empty_module_map() {
        let manifest: Manifest = serde_json::from_str("{}").unwrap();
        let cfg = manifest.to_config(Path::new("/opt/nox"), InstallMode::AuditHeal);
        assert_eq!(cfg.modules, DEFAULT_MODULES);
    }
}
