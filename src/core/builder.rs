//! Build orchestration logic
//!
//! Runs one installer build end to end: resolve the target disk, partition
//! and format it, stage the payload, patch the staged grub configuration and
//! NVMe id helper, then unmount. Every step is blocking and strictly
//! sequential.

use std::path::{Path, PathBuf};

use crate::config::settings::Settings;
use crate::core::boot_config::BootConfigBuilder;
use crate::core::device_id::DeviceIdPatcher;
use crate::core::disk::{DiskPreparer, PreparedDisk};
use crate::core::params::BuildParams;
use crate::core::patch::{PatchOutcome, TextPatcher};
use crate::core::staging::{StageSources, StagedVolumes, VolumeStager};
use crate::error::InstallerError;
use crate::infra::command::CommandRunner;
use crate::infra::filesystem;

/// Everything a build needs besides its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Stable symlink to the target disk
    pub disk_link: PathBuf,
    /// Directory holding the mount points
    pub work_dir: PathBuf,
    /// Files copied onto the disk
    pub sources: StageSources,
    /// Serial console speed
    pub serial_baud: u32,
    /// Label prefix used by the ISO's grub.cfg
    pub source_label_prefix: String,
    /// Fail when a grub rewrite rule matches nothing
    pub strict_patching: bool,
    /// Unmount staged volumes when the build fails
    pub cleanup_on_failure: bool,
}

impl BuildPlan {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            disk_link: settings.disk_link(),
            work_dir: settings.work_dir(),
            sources: StageSources {
                iso: settings.iso(),
                kickstart: settings.kickstart(),
                disk_naming_rule: settings.disk_naming_rule(),
                nvme_id_script: settings.nvme_id_script(),
            },
            serial_baud: settings.serial_baud(),
            source_label_prefix: settings.source_label_prefix(),
            strict_patching: settings.strict_patching(),
            cleanup_on_failure: settings.cleanup_on_failure(),
        }
    }

    /// Grub rewrite rules for these settings
    pub fn boot_config(&self, save_logs: bool) -> BootConfigBuilder {
        let kickstart_name = self
            .sources
            .kickstart
            .file_name()
            .map_or_else(|| "ks.cfg".to_string(), |n| n.to_string_lossy().into_owned());

        BootConfigBuilder::new(save_logs)
            .with_serial_baud(self.serial_baud)
            .with_source_label_prefix(&self.source_label_prefix)
            .with_kickstart_name(&kickstart_name)
    }
}

/// Summary of a finished build
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Release that was built
    pub release: String,
    /// Partitioned disk
    pub disk: PreparedDisk,
    /// Kernel arguments appended to the stage2 line
    pub boot_args: String,
    /// Grub configuration rewrite
    pub grub: PatchOutcome,
    /// NVMe id helper rewrite
    pub nvme_id: PatchOutcome,
}

/// Rewrite a file in place with `patcher`
///
/// With `write` unset the file is left untouched and only the outcome is
/// returned. In strict mode a rule that matched nothing is an error and the
/// file is not written.
pub fn patch_file(
    path: &Path,
    patcher: &TextPatcher,
    strict: bool,
    write: bool,
) -> Result<PatchOutcome, InstallerError> {
    let original = filesystem::read_file(path)?;
    let document = path.display().to_string();

    let outcome = if strict {
        patcher.apply_strict(&original, &document)?
    } else {
        patcher.apply(&original)
    };

    for rule in outcome.unmatched_rules() {
        tracing::warn!("Rewrite rule '{}' matched nothing in {}", rule, document);
    }

    if write && outcome.changed() {
        filesystem::write_file(path, &outcome.patched)?;
    }

    Ok(outcome)
}

/// Runs installer builds
pub struct InstallerBuilder<'a> {
    runner: &'a dyn CommandRunner,
    plan: BuildPlan,
}

impl<'a> InstallerBuilder<'a> {
    pub fn new(runner: &'a dyn CommandRunner, plan: BuildPlan) -> Self {
        Self { runner, plan }
    }

    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    /// Resolve the disk link and build onto the disk it points at
    pub fn run(&self, params: &BuildParams) -> Result<BuildReport, InstallerError> {
        let disk = filesystem::resolve_device_link(&self.plan.disk_link)?;
        tracing::info!(
            "Installer disk {} resolves to {}",
            self.plan.disk_link.display(),
            disk.display()
        );
        self.run_on_disk(&disk, params)
    }

    /// Build onto an already-resolved disk device
    pub fn run_on_disk(&self, disk: &Path, params: &BuildParams) -> Result<BuildReport, InstallerError> {
        tracing::info!("EL Release: {}", params.release);
        tracing::info!("Build working directory: {}", self.plan.work_dir.display());
        tracing::info!("Writing installer disk.");

        let prepared = DiskPreparer::new(self.runner).prepare_partitions(disk)?;

        let stager = VolumeStager::new(self.runner);
        let mut volumes = StagedVolumes::new(&self.plan.work_dir);

        let patched = self.stage_and_patch(&stager, &mut volumes, &prepared, params);
        let (grub, nvme_id) = match patched {
            Ok(outcomes) => outcomes,
            Err(e) => {
                if self.plan.cleanup_on_failure {
                    tracing::warn!("Build failed, unmounting staged volumes");
                    stager.release_best_effort(&mut volumes);
                }
                return Err(e);
            }
        };

        if let Err(e) = stager.unstage_all(&mut volumes) {
            if self.plan.cleanup_on_failure {
                tracing::warn!("Unmount failed, releasing remaining volumes");
                stager.release_best_effort(&mut volumes);
            }
            return Err(e.into());
        }

        Ok(BuildReport {
            release: params.release.clone(),
            disk: prepared,
            boot_args: self.plan.boot_config(params.save_logs).boot_args().render(),
            grub,
            nvme_id,
        })
    }

    fn stage_and_patch(
        &self,
        stager: &VolumeStager<'_>,
        volumes: &mut StagedVolumes,
        prepared: &PreparedDisk,
        params: &BuildParams,
    ) -> Result<(PatchOutcome, PatchOutcome), InstallerError> {
        stager.stage_all(volumes, prepared, &self.plan.sources)?;

        let grub_cfg = volumes.grub_cfg();
        let grub_patcher = self.plan.boot_config(params.save_logs).patcher()?;
        let grub = patch_file(&grub_cfg, &grub_patcher, self.plan.strict_patching, true)?;
        tracing::info!("Modified grub.cfg:\n{}", grub.diff());

        // Newer helpers no longer use xxd, so no match here is expected.
        let nvme_id_path = volumes.data_file(&self.plan.sources.nvme_id_script);
        let nvme_id = patch_file(&nvme_id_path, &DeviceIdPatcher::new().patcher()?, false, true)?;
        if nvme_id.changed() {
            tracing::info!("Replaced xxd pipeline in {}", nvme_id_path.display());
        }

        Ok((grub, nvme_id))
    }
}
