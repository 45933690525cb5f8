//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod doctor;
pub mod patch;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::settings::Settings;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Partition the installer disk, stage the ISO and patch its boot files
    Build(BuildArgs),

    /// Apply one rewrite set to a file in place
    Patch {
        #[command(subcommand)]
        target: PatchTarget,
    },

    /// Check that the external tools a build needs are installed
    Doctor,
}

/// Arguments of `el-installer build`
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Release to build (falls back to the el_release metadata attribute)
    #[arg(long, env = "EL_RELEASE")]
    pub release: Option<String>,

    /// Keep installer logs in the installed image (falls back to el_savelogs)
    #[arg(
        long,
        env = "EL_SAVELOGS",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub save_logs: Option<bool>,

    /// Installer ISO image
    #[arg(long, env = "EL_ISO")]
    pub iso: Option<PathBuf>,

    /// Kickstart answer file
    #[arg(long, env = "EL_KICKSTART")]
    pub kickstart: Option<PathBuf>,

    /// Stable symlink to the target disk
    #[arg(long, env = "EL_DISK")]
    pub disk: Option<PathBuf>,

    /// Directory for the mount points
    #[arg(long, env = "EL_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// Do not consult the instance metadata server
    #[arg(long)]
    pub no_metadata: bool,

    /// Instance metadata attribute endpoint
    #[arg(long, env = "EL_METADATA_URL")]
    pub metadata_url: Option<String>,
}

/// Files `el-installer patch` can rewrite
#[derive(Subcommand, Debug, Clone)]
pub enum PatchTarget {
    /// Rewrite a grub.cfg for serial, unattended installation
    Grub {
        /// grub.cfg to rewrite
        file: PathBuf,

        /// Keep installer logs in the installed image
        #[arg(long)]
        save_logs: bool,

        /// Serial console speed
        #[arg(long)]
        serial_baud: Option<u32>,

        /// Only print the diff
        #[arg(long)]
        dry_run: bool,
    },

    /// Replace the xxd pipeline in a google_nvme_id helper
    NvmeId {
        /// Helper script to rewrite
        file: PathBuf,

        /// Only print the diff
        #[arg(long)]
        dry_run: bool,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self, settings: Settings) -> Result<()> {
        match self {
            Commands::Build(args) => build::execute(args, settings).await,
            Commands::Patch { target } => patch::execute(target, &settings),
            Commands::Doctor => doctor::execute(),
        }
    }
}
