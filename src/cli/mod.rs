//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Result;
use clap::Parser;

use crate::config::settings::Settings;
use crate::error::InstallerError;
use commands::Commands;

/// Version string with build provenance
pub fn long_version() -> &'static str {
    static LONG_VERSION: OnceLock<String> = OnceLock::new();
    LONG_VERSION.get_or_init(|| {
        format!(
            "{} (git {}, built {})",
            env!("CARGO_PKG_VERSION"),
            option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
            option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        )
    })
}

/// EL installer disk builder
///
/// Turns an Enterprise Linux installer ISO into a bootable GPT disk that
/// installs unattended over a serial console.
#[derive(Parser, Debug)]
#[command(name = "el-installer")]
#[command(author, version, about, long_about = None)]
#[command(long_version = long_version())]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Settings file (defaults to ./el-installer.toml, then the user config dir)
    #[arg(long, global = true, env = "EL_INSTALLER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let Some(cmd) = self.command else {
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            return Ok(());
        };

        let settings = load_settings(self.config.as_deref())?;
        cmd.run(settings).await
    }
}

/// Load the settings file named on the command line, or the discovered one
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, InstallerError> {
    Ok(Settings::discover(explicit)?)
}
