//! Machine- and human-readable run reports
//!
//! Every run ends with a structured, schema-versioned JSON report and a
//! markdown summary. The installation summary doubles as an on-disk
//! installation record: its top level embeds the manifest fields, so
//! audit mode can reconstruct configuration from it when the primary
//! manifest is gone.

use std::path::{Path, PathBuf};

use serde_json::json;
use uuid::Uuid;

use crate::atomic::{TextPolicy, write_atomic};
use crate::config::{INSTALLER_VERSION, InstallConfig, Manifest, SUMMARY_PATH};
use crate::deps::ResolveReport;
use crate::error::Result;
use crate::generate::GenerateReport;
use crate::heal::HealingResult;
use crate::probe::SystemProfile;
use crate::validate::{Severity, ValidationResult};

/// Version of the report schema, bumped on breaking layout changes
pub const REPORT_SCHEMA: u32 = 1;

/// Human-readable install summary, relative to the install directory
pub const INSTALL_REPORT_MD: &str = "INSTALLATION_REPORT.md";

/// Audit report files, relative to the audited installation
pub const AUDIT_REPORT_JSON: &str = "AUDIT_REPORT.json";
pub const AUDIT_REPORT_MD: &str = "AUDIT_REPORT.md";

/// Identifier tying one run's log lines and reports together
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Everything an install-mode report can carry
pub struct InstallRunData<'a> {
    pub session_id: &'a str,
    pub cfg: &'a InstallConfig,
    pub profile: &'a SystemProfile,
    pub dependencies: Option<&'a ResolveReport>,
    pub generation: Option<&'a GenerateReport>,
    pub validation: Option<&'a ValidationResult>,
    pub healing: Option<&'a HealingResult>,
    pub revalidation: Option<&'a ValidationResult>,
}

impl InstallRunData<'_> {
    fn final_validation(&self) -> Option<&ValidationResult> {
        self.revalidation.or(self.validation)
    }

    fn status(&self) -> &'static str {
        match self.final_validation() {
            Some(v) if v.all_passed => "completed",
            Some(v) if v.error_count() == 0 => "completed_with_warnings",
            Some(_) => "needs_attention",
            None => "completed",
        }
    }
}

/// Write the JSON summary and markdown report for an install-mode run.
pub fn write_install_reports(data: &InstallRunData) -> Result<Vec<PathBuf>> {
    let install_dir = &data.cfg.install_dir;
    let policy = TextPolicy::structured(data.profile.os);

    // The summary embeds the manifest fields at top level so it stays a
    // valid installation record for future audits.
    let mut summary = serde_json::to_value(Manifest::build(data.cfg, data.profile))?;
    summary["schema_version"] = json!(REPORT_SCHEMA);
    summary["report"] = json!({
        "session_id": data.session_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "mode": data.cfg.mode.as_str(),
        "status": data.status(),
        "dependencies": data.dependencies,
        "generation": data.generation,
        "validation": data.validation,
        "healing": data.healing,
        "revalidation": data.revalidation,
    });

    let json_path = install_dir.join(SUMMARY_PATH);
    let mut body = serde_json::to_string_pretty(&summary)?;
    body.push('\n');
    write_atomic(&json_path, &body, policy)?;

    let md_path = install_dir.join(INSTALL_REPORT_MD);
    write_atomic(&md_path, &install_markdown(data), policy)?;

    Ok(vec![json_path, md_path])
}

fn install_markdown(data: &InstallRunData) -> String {
    let mut md = String::new();
    md.push_str("# NoxSuite Installation Report\n\n");
    md.push_str(&format!(
        "**Generated:** {}\n**Mode:** {}\n**Installer:** {}\n**Session:** {}\n\n",
        chrono::Utc::now().to_rfc3339(),
        data.cfg.mode.as_str(),
        INSTALLER_VERSION,
        data.session_id,
    ));
    md.push_str(&format!(
        "**Directory:** {}\n**Modules:** {}\n**Status:** {}\n\n",
        data.cfg.install_dir.display(),
        data.cfg.modules.join(", "),
        data.status(),
    ));

    if let Some(deps) = data.dependencies {
        md.push_str("## Dependencies\n\n");
        for entry in &deps.entries {
            md.push_str(&format!(
                "- `{}`: {}\n",
                entry.name,
                serde_json::to_string(&entry.status).unwrap_or_default()
            ));
        }
        md.push('\n');
    }

    if let Some(generation) = data.generation {
        md.push_str(&format!(
            "## Generation\n\n{}/{} generators succeeded, {} files created\n\n",
            generation.succeeded,
            generation.attempted,
            generation.created.len()
        ));
        for failure in &generation.failures {
            md.push_str(&format!("- failed: {} ({})\n", failure.generator, failure.reason));
        }
    }

    if let Some(validation) = data.final_validation() {
        md.push_str(&validation_markdown(validation));
    }

    if let Some(healing) = data.healing {
        md.push_str(&format!(
            "## Healing\n\nHealed {} issue(s), {} failed\n\n",
            healing.healed_count, healing.failed_count
        ));
    }

    md.push_str("---\n*Report generated by noxup*\n");
    md
}

fn validation_markdown(validation: &ValidationResult) -> String {
    let mut md = String::new();
    md.push_str(&format!(
        "## Validation\n\n**Checks passed:** {}/{}\n\n",
        validation.passed, validation.total
    ));

    if validation.failures.is_empty() {
        md.push_str("All validation checks passed.\n\n");
        return md;
    }

    for (i, failure) in validation.failures.iter().enumerate() {
        let marker = match failure.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        };
        md.push_str(&format!(
            "### {}. [{}] {}\n\n{}\n",
            i + 1,
            marker,
            failure.check.name(),
            failure.message
        ));
        if failure.auto_fix_available {
            md.push_str(&format!("- Auto-fix: {}\n", failure.fix_suggestion));
        } else {
            md.push_str("- Manual intervention required\n");
        }
        md.push('\n');
    }

    if !validation.platform_issues.is_empty() {
        md.push_str("**Platform themes:** ");
        md.push_str(&validation.platform_issues.join(", "));
        md.push_str("\n\n");
    }
    md
}

/// Everything an audit-mode report carries
pub struct AuditRunData<'a> {
    pub session_id: &'a str,
    pub target: &'a Path,
    pub discovered: &'a [PathBuf],
    pub profile: &'a SystemProfile,
    pub audit: &'a ValidationResult,
    pub healing: Option<&'a HealingResult>,
    pub reaudit: Option<&'a ValidationResult>,
}

impl AuditRunData<'_> {
    fn final_validation(&self) -> &ValidationResult {
        self.reaudit.unwrap_or(self.audit)
    }

    fn overall_status(&self) -> &'static str {
        if self.final_validation().all_passed {
            "healthy"
        } else {
            "needs_attention"
        }
    }
}

/// Write the JSON and markdown audit reports. Always called, even after
/// a partially failed audit; there is no silent-abort path.
pub fn write_audit_reports(data: &AuditRunData) -> Result<(PathBuf, PathBuf)> {
    let policy = TextPolicy::structured(data.profile.os);

    let report = json!({
        "schema_version": REPORT_SCHEMA,
        "audit_metadata": {
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "installer_version": INSTALLER_VERSION,
            "session_id": data.session_id,
            "target_installation": data.target.display().to_string(),
            "all_detected_installations": data.discovered
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>(),
            "platform": data.profile.os.as_str(),
            "system_info": data.profile,
        },
        "audit_results": {
            "overall_status": data.overall_status(),
            "total_checks": data.audit.total,
            "passed_checks": data.audit.passed,
            "failed_checks": data.audit.failures.len(),
            "platform_specific_issues": data.audit.platform_issues,
        },
        "detailed_failures": data.audit.failures,
        "healing": data.healing,
        "revalidation": data.reaudit,
        "recommendations": recommendations(data.final_validation()),
    });

    let json_path = data.target.join(AUDIT_REPORT_JSON);
    let mut body = serde_json::to_string_pretty(&report)?;
    body.push('\n');
    write_atomic(&json_path, &body, policy)?;

    let md_path = data.target.join(AUDIT_REPORT_MD);
    write_atomic(&md_path, &audit_markdown(data), policy)?;

    Ok((json_path, md_path))
}

fn audit_markdown(data: &AuditRunData) -> String {
    let mut md = String::new();
    md.push_str("# NoxSuite Installation Audit Report\n\n");
    md.push_str(&format!(
        "**Generated:** {}\n**Installation:** {}\n**Platform:** {}\n**Session:** {}\n\n",
        chrono::Utc::now().to_rfc3339(),
        data.target.display(),
        data.profile.os.as_str(),
        data.session_id,
    ));

    md.push_str("## Overall Status\n\n");
    md.push_str(&format!(
        "**Status:** {}\n**Checks passed:** {}/{}\n\n",
        data.overall_status(),
        data.audit.passed,
        data.audit.total
    ));

    md.push_str(&validation_markdown(data.audit));

    if let Some(healing) = data.healing {
        md.push_str(&format!(
            "## Healing\n\nHealed {} issue(s), {} failed\n\n",
            healing.healed_count, healing.failed_count
        ));
        for attempt in &healing.attempts {
            md.push_str(&format!(
                "- {}: {:?} ({})\n",
                attempt.check.name(),
                attempt.outcome,
                attempt.detail
            ));
            for suggestion in &attempt.manual_suggestions {
                md.push_str(&format!("  - {suggestion}\n"));
            }
        }
        md.push('\n');
    }

    if let Some(reaudit) = data.reaudit {
        md.push_str(&format!(
            "## Re-validation\n\n**Checks passed:** {}/{}\n\n",
            reaudit.passed, reaudit.total
        ));
    }

    md.push_str("## Recommendations\n\n");
    for rec in recommendations(data.final_validation()) {
        md.push_str(&format!("- {rec}\n"));
    }

    md.push_str("\n---\n*Report generated by noxup*\n");
    md
}

/// Actionable recommendations derived from the final validation state.
fn recommendations(validation: &ValidationResult) -> Vec<String> {
    if validation.all_passed {
        return vec![
            "Installation is healthy, no immediate action required".to_string(),
            "Run periodic audits to keep it that way".to_string(),
            "Keep Docker and the other managed tools updated".to_string(),
        ];
    }

    let mut recs = Vec::new();
    let errors = validation.error_count();
    let warnings = validation.failures.len() - errors;

    if errors > 0 {
        recs.push(format!("PRIORITY: address the {errors} error-level issue(s) first"));
    }
    if warnings > 0 {
        recs.push(format!("Review the {warnings} warning(s) for optimal operation"));
    }
    if validation
        .failures
        .iter()
        .any(|f| f.check == crate::validate::CheckId::ServiceDependencies)
    {
        recs.push("Install the missing Docker/Node.js dependencies".to_string());
    }
    if validation.failures.iter().any(|f| f.auto_fix_available) {
        recs.push("Re-run in recovery mode to apply the available automatic fixes".to_string());
    }
    recs.push("Check the installation log for detailed diagnostics".to_string());
    recs
}
