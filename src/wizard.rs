//! Configuration wizard and user confirmation surface
//!
//! All interactive prompts go through the `Prompter` trait so the
//! engine itself runs headlessly: the terminal implementation is backed
//! by `inquire`, non-interactive modes answer with defaults, and tests
//! replay canned answers.

use std::path::PathBuf;

use crate::config::{DEFAULT_MODULES, FeatureFlags, InstallConfig, InstallMode};
use crate::error::{NoxupError, Result};
use crate::probe::SystemProfile;

/// Confirmation and selection surface injected into the engine
pub trait Prompter {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;
    fn select(&mut self, message: &str, options: &[String]) -> Result<usize>;
    fn input(&mut self, message: &str, default: &str) -> Result<String>;
}

/// Interactive prompter for a real terminal
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        Ok(inquire::Confirm::new(message)
            .with_default(default)
            .prompt()?)
    }

    fn select(&mut self, message: &str, options: &[String]) -> Result<usize> {
        let choice = inquire::Select::new(message, options.to_vec()).raw_prompt()?;
        Ok(choice.index)
    }

    fn input(&mut self, message: &str, default: &str) -> Result<String> {
        Ok(inquire::Text::new(message).with_default(default).prompt()?)
    }
}

/// Non-interactive prompter that accepts every default. Used by the
/// fast/dry-run/safe/recovery modes and by `--yes`.
pub struct AssumeDefaults;

impl Prompter for AssumeDefaults {
    fn confirm(&mut self, _message: &str, default: bool) -> Result<bool> {
        Ok(default)
    }

    fn select(&mut self, _message: &str, _options: &[String]) -> Result<usize> {
        Ok(0)
    }

    fn input(&mut self, _message: &str, default: &str) -> Result<String> {
        Ok(default.to_string())
    }
}

/// Test prompter replaying scripted answers
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedPrompter {
    pub confirms: std::collections::VecDeque<bool>,
    pub selections: std::collections::VecDeque<usize>,
    pub inputs: std::collections::VecDeque<String>,
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, _message: &str, default: bool) -> Result<bool> {
        Ok(self.confirms.pop_front().unwrap_or(default))
    }

    fn select(&mut self, _message: &str, _options: &[String]) -> Result<usize> {
        Ok(self.selections.pop_front().unwrap_or(0))
    }

    fn input(&mut self, _message: &str, default: &str) -> Result<String> {
        Ok(self
            .inputs
            .pop_front()
            .unwrap_or_else(|| default.to_string()))
    }
}

/// Build the session configuration for guided mode by prompting for
/// the install directory, module set and feature flags.
pub fn guided_config(prompter: &mut dyn Prompter) -> Result<InstallConfig> {
    let default_dir = InstallConfig::default_install_dir();
    let dir_answer = prompter.input(
        "Install directory",
        &default_dir.display().to_string(),
    )?;
    let install_dir = PathBuf::from(dir_answer.trim());

    let mut modules: Vec<String> = Vec::new();
    for module in DEFAULT_MODULES {
        if prompter.confirm(&format!("Install module '{module}'?"), true)? {
            modules.push(module.to_string());
        }
    }
    if modules.is_empty() {
        // A session with nothing to install has nothing to generate
        return Err(NoxupError::Cancelled);
    }

    let features = FeatureFlags {
        ai_enabled: prompter.confirm("Enable AI services (Langflow, Ollama)?", true)?,
        voice_enabled: prompter.confirm("Enable voice features?", false)?,
        mobile_enabled: prompter.confirm("Enable mobile companion support?", false)?,
        dev_mode: prompter.confirm("Enable development mode?", false)?,
        auto_start: prompter.confirm("Open the web interface after startup?", true)?,
    };

    let mut cfg = InstallConfig {
        install_dir,
        modules: Vec::new(),
        features,
        mode: InstallMode::Guided,
        force_reinstall: false,
        backup_existing: true,
    };
    cfg.set_modules(modules);
    Ok(cfg)
}

/// Pre-flight: the install directory must exist and be writable before
/// any generator runs. Failing here aborts the session early instead of
/// failing mid-generation.
pub fn preflight_install_dir(cfg: &InstallConfig, _profile: &SystemProfile) -> Result<PathBuf> {
    let raw = &cfg.install_dir;
    std::fs::create_dir_all(raw).map_err(|e| NoxupError::InstallDirCreateFailed {
        path: raw.display().to_string(),
        reason: e.to_string(),
    })?;

    // Canonicalize so Windows paths come out without the \\?\ prefix
    let resolved = dunce::canonicalize(raw).unwrap_or_else(|_| raw.clone());

    if !crate::probe::dir_writable(&resolved) {
        return Err(NoxupError::InstallDirNotWritable {
            path: resolved.display().to_string(),
        });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_guided_config_uses_answers() {
        let mut prompter = ScriptedPrompter::default();
        prompter.inputs.push_back("/tmp/nox-wizard".to_string());
        // modules: yes noxpanel, no noxguard
        prompter.confirms.extend([true, false]);
        // features: ai no, voice no, mobile yes, dev yes, auto-start no
        prompter.confirms.extend([false, false, true, true, false]);

        let cfg = guided_config(&mut prompter).unwrap();
        assert_eq!(cfg.install_dir, PathBuf::from("/tmp/nox-wizard"));
        assert_eq!(cfg.modules, vec!["noxpanel"]);
        assert!(!cfg.features.ai_enabled);
        assert!(cfg.features.mobile_enabled);
        assert!(cfg.features.dev_mode);
        assert!(!cfg.features.auto_start);
        assert_eq!(cfg.mode, InstallMode::Guided);
    }

    #[test]
    fn test_guided_config_rejects_empty_module_set() {
        let mut prompter = ScriptedPrompter::default();
        prompter.inputs.push_back("/tmp/nox-wizard".to_string());
        prompter.confirms.extend([false, false]);

        let result = guided_config(&mut prompter);
        assert!(matches!(result, Err(NoxupError::Cancelled)));
    }

    #[test]
    fn test_preflight_creates_missing_directory() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("deep/nested/install");
        let cfg = InstallConfig::with_defaults(target.clone(), InstallMode::Fast);
        let profile = SystemProfile::detect();

        let resolved = preflight_install_dir(&cfg, &profile).unwrap();
        assert!(resolved.exists());
    }

    #[test]
    fn test_assume_defaults_answers_defaults() {
        let mut p = AssumeDefaults;
        assert!(p.confirm("anything", true).unwrap());
        assert!(!p.confirm("anything", false).unwrap());
        assert_eq!(p.select("pick", &["a".to_string()]).unwrap(), 0);
        assert_eq!(p.input("dir", "/tmp/x").unwrap(), "/tmp/x");
    }
}
