//! CLI command implementation for `el-installer patch`

use anyhow::{Context, Result};

use super::PatchTarget;
use crate::cli::output::{is_json, is_quiet, print_success, print_warning};
use crate::config::settings::Settings;
use crate::core::boot_config::BootConfigBuilder;
use crate::core::builder::patch_file;
use crate::core::device_id::DeviceIdPatcher;
use crate::core::patch::PatchOutcome;

/// Execute the patch command
pub fn execute(target: PatchTarget, settings: &Settings) -> Result<()> {
    let (file, outcome, dry_run) = match target {
        PatchTarget::Grub {
            file,
            save_logs,
            serial_baud,
            dry_run,
        } => {
            let patcher = BootConfigBuilder::new(save_logs)
                .with_serial_baud(serial_baud.unwrap_or_else(|| settings.serial_baud()))
                .with_source_label_prefix(&settings.source_label_prefix())
                .patcher()?;
            let outcome = patch_file(&file, &patcher, settings.strict_patching(), !dry_run)
                .with_context(|| format!("Failed to patch {}", file.display()))?;
            (file, outcome, dry_run)
        }
        PatchTarget::NvmeId { file, dry_run } => {
            let patcher = DeviceIdPatcher::new().patcher()?;
            let outcome = patch_file(&file, &patcher, false, !dry_run)
                .with_context(|| format!("Failed to patch {}", file.display()))?;
            (file, outcome, dry_run)
        }
    };

    report(&file.display().to_string(), &outcome, dry_run)
}

fn report(file: &str, outcome: &PatchOutcome, dry_run: bool) -> Result<()> {
    if is_json() {
        let json = serde_json::json!({
            "status": "success",
            "file": file,
            "changed": outcome.changed(),
            "written": outcome.changed() && !dry_run,
            "rules": outcome.reports.iter().map(|r| serde_json::json!({
                "rule": r.rule,
                "matches": r.matches,
            })).collect::<Vec<_>>(),
            "diff": outcome.diff(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if !is_quiet() {
        print!("{}", outcome.diff());
    }

    for rule in outcome.unmatched_rules() {
        print_warning(&format!("Rule '{rule}' matched nothing"));
    }

    if !outcome.changed() {
        print_success(&format!("{file} already up to date"));
    } else if dry_run {
        print_success(&format!("{file} would be modified (dry run)"));
    } else {
        print_success(&format!("Patched {file}"));
    }

    Ok(())
}
