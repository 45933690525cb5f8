//! CLI command implementation for `el-installer build`

use anyhow::{Context, Result};

use super::BuildArgs;
use crate::cli::output::{is_json, maybe_spinner, print_info, print_success};
use crate::config::settings::Settings;
use crate::core::builder::{BuildPlan, InstallerBuilder};
use crate::core::params::{self, BuildParams, ParamOverrides};
use crate::error::InstallerError;
use crate::infra::command::SystemRunner;
use crate::infra::metadata::MetadataClient;

/// Fold command-line paths into the settings
pub fn apply_overrides(args: &BuildArgs, mut settings: Settings) -> Settings {
    if let Some(iso) = &args.iso {
        settings.paths.iso = Some(iso.clone());
    }
    if let Some(kickstart) = &args.kickstart {
        settings.paths.kickstart = Some(kickstart.clone());
    }
    if let Some(disk) = &args.disk {
        settings.paths.disk_link = Some(disk.clone());
    }
    if let Some(workdir) = &args.workdir {
        settings.paths.work_dir = Some(workdir.clone());
    }
    if let Some(url) = &args.metadata_url {
        settings.metadata.url = Some(url.clone());
    }
    settings
}

/// Resolve the release and save-logs switch for this invocation
pub async fn resolve_params(args: &BuildArgs, settings: &Settings) -> Result<BuildParams, InstallerError> {
    let overrides = ParamOverrides {
        release: args.release.clone(),
        save_logs: args.save_logs,
    };
    let metadata = (!args.no_metadata).then(|| MetadataClient::with_url(&settings.metadata_url()));

    Ok(params::resolve(&overrides, metadata.as_ref()).await?)
}

/// Execute the build command
pub async fn execute(args: BuildArgs, settings: Settings) -> Result<()> {
    let settings = apply_overrides(&args, settings);

    let params = resolve_params(&args, &settings)
        .await
        .context("EL Installer build failed")?;

    let plan = BuildPlan::from_settings(&settings);
    let spinner = maybe_spinner(&format!("Building EL {} installer disk...", params.release));

    let build_params = params.clone();
    let result = tokio::task::spawn_blocking(move || {
        InstallerBuilder::new(&SystemRunner, plan).run(&build_params)
    })
    .await
    .context("Build task panicked")?;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let report = result.context("EL Installer build failed")?;

    if is_json() {
        let json = serde_json::json!({
            "status": "success",
            "release": report.release,
            "disk": report.disk.disk,
            "esp": report.disk.esp,
            "data": report.disk.data,
            "boot_args": report.boot_args,
            "grub_rules": report.grub.reports.iter().map(|r| serde_json::json!({
                "rule": r.rule,
                "matches": r.matches,
            })).collect::<Vec<_>>(),
            "nvme_id_patched": report.nvme_id.changed(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    print_info(&format!("Boot arguments: {}", report.boot_args));
    print_success("EL Installer build successful!");
    Ok(())
}
