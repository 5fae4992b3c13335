//! Installation validation engine
//!
//! An ordered battery of independent checks runs against a completed or
//! pre-existing installation. Checks are pure reads and never mutate
//! installation state; an internal error or panic in one check is
//! captured and converted into a failure record for that check alone,
//! never aborting the rest of the battery. Failure records are
//! immutable; healing produces a new validation pass instead of
//! mutating them in place.

pub mod checks;

use std::panic::AssertUnwindSafe;

use serde::Serialize;
use tracing::debug;

use crate::config::InstallConfig;
use crate::probe::SystemProfile;

/// How bad one validation failure is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Closed set of validation checks, in battery order.
///
/// The order here is the report order; keep it stable so reports stay
/// reproducible across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckId {
    DirectoryStructure,
    ConfigurationFiles,
    ConfigSyntax,
    FilePermissions,
    EncodingConsistency,
    PathCompatibility,
    ComposeStructure,
    EnvCompleteness,
    ScriptIntegrity,
    DatabaseConfig,
    NetworkConfig,
    LoggingConfig,
    AiConfig,
    ServiceDependencies,
    DiskSpace,
    PlatformCompatibility,
}

impl CheckId {
    pub const ALL: [CheckId; 16] = [
        CheckId::DirectoryStructure,
        CheckId::ConfigurationFiles,
        CheckId::ConfigSyntax,
        CheckId::FilePermissions,
        CheckId::EncodingConsistency,
        CheckId::PathCompatibility,
        CheckId::ComposeStructure,
        CheckId::EnvCompleteness,
        CheckId::ScriptIntegrity,
        CheckId::DatabaseConfig,
        CheckId::NetworkConfig,
        CheckId::LoggingConfig,
        CheckId::AiConfig,
        CheckId::ServiceDependencies,
        CheckId::DiskSpace,
        CheckId::PlatformCompatibility,
    ];

    /// Stable identifier used in reports and logs
    pub fn name(self) -> &'static str {
        match self {
            Self::DirectoryStructure => "directory_structure",
            Self::ConfigurationFiles => "configuration_files",
            Self::ConfigSyntax => "config_syntax",
            Self::FilePermissions => "file_permissions",
            Self::EncodingConsistency => "encoding_consistency",
            Self::PathCompatibility => "path_compatibility",
            Self::ComposeStructure => "compose_structure",
            Self::EnvCompleteness => "env_completeness",
            Self::ScriptIntegrity => "script_integrity",
            Self::DatabaseConfig => "database_config",
            Self::NetworkConfig => "network_config",
            Self::LoggingConfig => "logging_config",
            Self::AiConfig => "ai_config",
            Self::ServiceDependencies => "service_dependencies",
            Self::DiskSpace => "disk_space",
            Self::PlatformCompatibility => "platform_compatibility",
        }
    }

    /// Whether a failure of this check can be repaired automatically
    pub fn auto_fixable(self) -> bool {
        match self {
            Self::DirectoryStructure
            | Self::ConfigurationFiles
            | Self::ConfigSyntax
            | Self::FilePermissions
            | Self::EncodingConsistency
            | Self::ComposeStructure
            | Self::EnvCompleteness
            | Self::ScriptIntegrity
            | Self::DatabaseConfig
            | Self::NetworkConfig
            | Self::LoggingConfig
            | Self::AiConfig => true,
            Self::PathCompatibility
            | Self::ServiceDependencies
            | Self::DiskSpace
            | Self::PlatformCompatibility => false,
        }
    }
}

/// One validation failure. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationFailure {
    pub check: CheckId,
    pub message: String,
    pub severity: Severity,
    pub auto_fix_available: bool,
    pub fix_suggestion: String,
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl ValidationFailure {
    pub fn new(check: CheckId, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            check,
            message: message.into(),
            severity,
            auto_fix_available: check.auto_fixable(),
            fix_suggestion: String::new(),
            context: serde_json::Map::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.fix_suggestion = suggestion.into();
        self
    }

    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }
}

/// Result of one full validation pass
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub all_passed: bool,
    pub total: usize,
    pub passed: usize,
    pub failures: Vec<ValidationFailure>,
    pub platform_issues: Vec<String>,
}

impl ValidationResult {
    pub fn error_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }

    pub fn has_failure(&self, check: CheckId) -> bool {
        self.failures.iter().any(|f| f.check == check)
    }
}

/// Shared read-only input for every check
pub struct CheckContext<'a> {
    pub cfg: &'a InstallConfig,
    pub profile: &'a SystemProfile,
}

/// Run the whole battery in fixed order.
pub fn validate_all(cfg: &InstallConfig, profile: &SystemProfile) -> ValidationResult {
    let ctx = CheckContext { cfg, profile };
    let mut failures = Vec::new();
    let mut total = 0;
    let mut passed = 0;

    for id in CheckId::ALL {
        if id == CheckId::AiConfig && !cfg.features.ai_enabled {
            continue;
        }
        total += 1;

        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| checks::run(id, &ctx)));
        match outcome {
            Ok(Ok(None)) => {
                passed += 1;
                debug!(check = id.name(), "check passed");
            }
            Ok(Ok(Some(failure))) => {
                debug!(check = id.name(), message = %failure.message, "check failed");
                failures.push(failure);
            }
            Ok(Err(e)) => {
                // Internal error inside a check converts to a record
                // for that check only; the battery keeps running.
                failures.push(
                    ValidationFailure::new(
                        id,
                        Severity::Error,
                        format!("check raised an internal error: {e}"),
                    )
                    .with_suggestion("Re-run the audit; report this if it persists"),
                );
            }
            Err(_) => {
                failures.push(
                    ValidationFailure::new(
                        id,
                        Severity::Error,
                        "check panicked unexpectedly",
                    )
                    .with_suggestion("Re-run the audit; report this if it persists"),
                );
            }
        }
    }

    let platform_issues = classify_platform_issues(&failures);

    ValidationResult {
        all_passed: failures.is_empty(),
        total,
        passed,
        failures,
        platform_issues,
    }
}

/// Tag cross-cutting platform themes across all failures for the
/// summary report.
fn classify_platform_issues(failures: &[ValidationFailure]) -> Vec<String> {
    let mut themes = std::collections::BTreeSet::new();

    for failure in failures {
        let message = failure.message.to_lowercase();
        if failure.check == CheckId::EncodingConsistency || message.contains("encoding") {
            themes.insert("encoding".to_string());
        }
        if failure.check == CheckId::PathCompatibility {
            if message.contains("space") {
                themes.insert("path contains spaces".to_string());
            }
            if message.contains("length") || message.contains("long") {
                themes.insert("path length".to_string());
            }
            if message.contains("reserved") {
                themes.insert("reserved file name".to_string());
            }
        }
        if message.contains("systemd") || message.contains("wsl") {
            themes.insert("service management".to_string());
        }
    }

    themes.into_iter().collect()
}
