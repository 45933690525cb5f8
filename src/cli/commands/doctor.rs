//! CLI command for `el-installer doctor`
//!
//! Checks that the external tools a build needs are on PATH.

use anyhow::Result;

use crate::cli::output::{is_json, is_quiet, print_info, print_success, status};
use crate::core::doctor::run_doctor;

/// Execute the doctor command
pub fn execute() -> Result<()> {
    let report = run_doctor();

    // JSON output mode
    if is_json() {
        let json_result = serde_json::json!({
            "status": if report.all_passed() { "success" } else { "error" },
            "checks": report.checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "passed": c.passed(),
                "path": c.path,
                "suggestion": c.suggestion,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&json_result).unwrap_or_default());

        if !report.all_passed() {
            return Err(anyhow::anyhow!("Missing required tools"));
        }
        return Ok(());
    }

    if !is_quiet() {
        print_info("Checking build tools...");
        for check in &report.checks {
            match &check.path {
                Some(path) => println!("  {} {} ({})", status::SUCCESS, check.name, path.display()),
                None => println!("  {} {} not found", status::ERROR, check.name),
            }
        }
        println!();
    }

    let failed = report.failed();
    if failed.is_empty() {
        print_success("All required tools are installed");
        return Ok(());
    }

    for check in &failed {
        if let Some(suggestion) = &check.suggestion {
            eprintln!("{} {}: {}", status::ERROR, check.name, suggestion);
        }
    }
    Err(anyhow::anyhow!("Missing required tools"))
}
