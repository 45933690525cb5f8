//! Doctor command logic
//!
//! Checks that the external tools the build shells out to are installed.

use std::path::PathBuf;

/// Tools invoked by a build, with the package that usually provides them
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("parted", "parted"),
    ("sync", "coreutils"),
    ("mkfs.vfat", "dosfstools"),
    ("fatlabel", "dosfstools"),
    ("mkfs.ext2", "e2fsprogs"),
    ("mount", "mount / util-linux"),
    ("umount", "mount / util-linux"),
    ("cp", "coreutils"),
];

/// Result of a single tool check
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Tool name
    pub name: String,
    /// Where the tool was found
    pub path: Option<PathBuf>,
    /// Suggestion for fixing a missing tool
    pub suggestion: Option<String>,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.path.is_some()
    }
}

/// Overall doctor report
#[derive(Debug, Default)]
pub struct DoctorReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,
}

impl DoctorReport {
    /// Check if all checks passed
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(CheckResult::passed)
    }

    /// Get all failed checks
    pub fn failed(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed()).collect()
    }
}

/// Look up one tool with a custom lookup function
pub fn check_tool_with<F>(name: &str, package: &str, lookup: F) -> CheckResult
where
    F: Fn(&str) -> Option<PathBuf>,
{
    match lookup(name) {
        Some(path) => CheckResult {
            name: name.to_string(),
            path: Some(path),
            suggestion: None,
        },
        None => CheckResult {
            name: name.to_string(),
            path: None,
            suggestion: Some(format!("Install the '{package}' package")),
        },
    }
}

/// Check every required tool against PATH
pub fn run_doctor() -> DoctorReport {
    run_doctor_with(|name| which::which(name).ok())
}

/// Check every required tool with a custom lookup function
pub fn run_doctor_with<F>(lookup: F) -> DoctorReport
where
    F: Fn(&str) -> Option<PathBuf>,
{
    DoctorReport {
        checks: REQUIRED_TOOLS
            .iter()
            .map(|(name, package)| check_tool_with(name, package, &lookup))
            .collect(),
    }
}
