//! Error types and handling for Noxup
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for Noxup operations
#[derive(Error, Diagnostic, Debug)]
pub enum NoxupError {
    // Pre-flight errors
    #[error("Install directory is not writable: {path}")]
    #[diagnostic(
        code(noxup::preflight::dir_not_writable),
        help("Choose a directory you have write access to, or re-run with elevated privileges")
    )]
    InstallDirNotWritable { path: String },

    #[error("Failed to create install directory: {path}")]
    #[diagnostic(code(noxup::preflight::dir_create_failed))]
    InstallDirCreateFailed { path: String, reason: String },

    // Dependency errors
    #[error("Dependency '{name}' could not be installed after {attempts} attempts")]
    #[diagnostic(
        code(noxup::deps::install_failed),
        help("Install the tool manually and re-run, or check the log for each failed method")
    )]
    DependencyInstallFailed { name: String, attempts: u32 },

    #[error("Retry limit exceeded for dependency '{name}'")]
    #[diagnostic(code(noxup::deps::retries_exhausted))]
    RetriesExhausted { name: String },

    #[error("Dependency installation declined")]
    #[diagnostic(code(noxup::deps::declined))]
    InstallationDeclined,

    // Generation errors
    #[error("Configuration generation failed: {succeeded}/{attempted} generators succeeded")]
    #[diagnostic(
        code(noxup::generate::below_threshold),
        help("Check the log for each failed generator, then re-run in recovery mode")
    )]
    GenerationBelowThreshold { succeeded: usize, attempted: usize },

    #[error("Unknown generator: {name}")]
    #[diagnostic(code(noxup::generate::unknown))]
    UnknownGenerator { name: String },

    // Validation errors
    #[error("Validation failed: {failed} check(s) reported errors")]
    #[diagnostic(
        code(noxup::validate::failed),
        help("Re-run in recovery mode to attempt automatic repair")
    )]
    ValidationFailed { failed: usize },

    // Audit errors
    #[error("No NoxSuite installations found on this system")]
    #[diagnostic(
        code(noxup::audit::none_found),
        help("Run 'noxup guided' to create a fresh installation")
    )]
    NoInstallationsFound,

    #[error("Not a NoxSuite installation: {path}")]
    #[diagnostic(
        code(noxup::audit::not_an_installation),
        help("A managed installation carries at least 2 of the known marker files")
    )]
    NotAnInstallation { path: String },

    // User interaction
    #[error("Operation cancelled by user")]
    #[diagnostic(code(noxup::ui::cancelled))]
    Cancelled,

    #[error("Prompt failed: {reason}")]
    #[diagnostic(code(noxup::ui::prompt_failed))]
    PromptFailed { reason: String },

    // File system errors
    #[error("Failed to write file: {path}")]
    #[diagnostic(code(noxup::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    // Record / configuration errors
    #[error("Failed to parse configuration file: {path}")]
    #[diagnostic(code(noxup::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(noxup::fs::io_error))]
    IoError { message: String },
}

impl From<std::io::Error> for NoxupError {
    fn from(err: std::io::Error) -> Self {
        NoxupError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for NoxupError {
    fn from(err: serde_json::Error) -> Self {
        NoxupError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for NoxupError {
    fn from(err: serde_yaml::Error) -> Self {
        NoxupError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<inquire::InquireError> for NoxupError {
    fn from(err: inquire::InquireError) -> Self {
        match err {
            inquire::InquireError::OperationCanceled
            | inquire::InquireError::OperationInterrupted => NoxupError::Cancelled,
            other => NoxupError::PromptFailed {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, NoxupError>;
