//! Error types for el-installer
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Build parameter errors
#[derive(Error, Debug)]
pub enum ParamError {
    /// Required parameter absent from every source
    #[error("Required parameter '{name}' was not provided (flag, environment or metadata)")]
    MissingRequired { name: String },

    /// Metadata server lookup failed
    #[error("Failed to read metadata attribute '{key}': {error}")]
    Metadata { key: String, error: String },
}

/// External command errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The program could not be started at all
    #[error("Failed to execute '{program}': {error}")]
    Spawn { program: String, error: String },

    /// The program ran and exited unsuccessfully
    #[error("Command '{program} {}' exited with {}: {stderr}", .args.join(" "), exit_description(.code))]
    Failed {
        program: String,
        args: Vec<String>,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_description(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to resolve a device symlink
    #[error("Failed to resolve device link '{path}': {error}")]
    ResolveLink { path: PathBuf, error: String },
}

/// Text rewrite errors
#[derive(Error, Debug)]
pub enum PatchError {
    /// A rewrite rule carries a pattern the regex engine rejects
    #[error("Rewrite rule '{rule}' has an invalid pattern: {error}")]
    InvalidPattern { rule: String, error: String },

    /// Strict mode: a rewrite rule found nothing to rewrite
    #[error("Rewrite rule '{rule}' did not match anything in {document}")]
    RuleNotMatched { rule: String, document: String },
}

/// Settings file errors
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read settings file
    #[error("Failed to read settings file '{path}': {error}")]
    Read { path: String, error: String },

    /// Failed to parse settings file
    #[error("Failed to parse settings file '{path}': {error}")]
    Parse { path: String, error: String },
}

/// Top-level installer build error type
#[derive(Error, Debug)]
pub enum InstallerError {
    /// Parameter error
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),

    /// Command error
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    /// Patch error
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    /// Settings error
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}
