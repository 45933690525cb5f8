//! Volume mounting and payload staging
//!
//! Mounts the installer ISO read-only next to the two freshly formatted
//! partitions, copies the boot payload onto the ESP and the ISO, kickstart
//! and udev helpers onto the data partition, and unmounts everything once
//! the staged files have been patched.

use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::disk::{PreparedDisk, DATA_PARTITION, ESP_PARTITION};
use crate::error::{CommandError, InstallerError};
use crate::infra::command::{CommandRunner, Invocation};
use crate::infra::filesystem;

/// One of the three mounted volumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volume {
    /// Source ISO, read-only loop mount
    Iso,
    /// EFI system partition
    Esp,
    /// Data partition
    Data,
}

impl Volume {
    /// Order in which volumes are mounted
    pub const MOUNT_ORDER: [Volume; 3] = [Volume::Iso, Volume::Esp, Volume::Data];

    /// Order in which volumes are unmounted
    pub const UNMOUNT_ORDER: [Volume; 3] = [Volume::Data, Volume::Iso, Volume::Esp];

    /// Mount point directory name under the work directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            Volume::Iso => defaults::ISO_MOUNT_DIR,
            Volume::Esp => defaults::ESP_MOUNT_DIR,
            Volume::Data => defaults::DATA_MOUNT_DIR,
        }
    }
}

/// Files staged from the build environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSources {
    /// Installer ISO image
    pub iso: PathBuf,
    /// Kickstart answer file
    pub kickstart: PathBuf,
    /// udev disk naming rule
    pub disk_naming_rule: PathBuf,
    /// NVMe id helper script
    pub nvme_id_script: PathBuf,
}

/// Mount points of one build and which of them are currently mounted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedVolumes {
    work_dir: PathBuf,
    mounted: Vec<Volume>,
}

impl StagedVolumes {
    /// Mount points under `work_dir`; nothing is mounted yet
    pub fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            mounted: Vec::new(),
        }
    }

    pub fn mount_point(&self, volume: Volume) -> PathBuf {
        self.work_dir.join(volume.dir_name())
    }

    pub fn is_mounted(&self, volume: Volume) -> bool {
        self.mounted.contains(&volume)
    }

    /// Volumes currently mounted, in mount order
    pub fn mounted(&self) -> &[Volume] {
        &self.mounted
    }

    /// Staged grub configuration on the ESP
    pub fn grub_cfg(&self) -> PathBuf {
        self.mount_point(Volume::Esp).join(defaults::GRUB_CFG_RELATIVE)
    }

    /// Staged copy of a file placed at the root of the data partition
    pub fn data_file(&self, source: &Path) -> PathBuf {
        let name = source.file_name().unwrap_or(source.as_os_str());
        self.mount_point(Volume::Data).join(name)
    }
}

/// Mounts, fills and unmounts the staging volumes
pub struct VolumeStager<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> VolumeStager<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Mount all three volumes and copy every payload into place
    ///
    /// `volumes` records each successful mount as it happens, so a caller can
    /// still release whatever got mounted if a later step fails.
    pub fn stage_all(
        &self,
        volumes: &mut StagedVolumes,
        disk: &PreparedDisk,
        sources: &StageSources,
    ) -> Result<(), InstallerError> {
        for volume in Volume::MOUNT_ORDER {
            filesystem::create_dir_all(&volumes.mount_point(volume))?;
        }

        for volume in Volume::MOUNT_ORDER {
            let target = volumes.mount_point(volume);
            let mount = match volume {
                Volume::Iso => Invocation::new("mount")
                    .args(["-o", "ro,loop", "-t", "iso9660"])
                    .arg_path(&sources.iso),
                Volume::Esp => Invocation::new("mount")
                    .args(["-t", ESP_PARTITION.filesystem.mount_type()])
                    .arg_path(&disk.esp),
                Volume::Data => Invocation::new("mount")
                    .args(["-t", DATA_PARTITION.filesystem.mount_type()])
                    .arg_path(&disk.data),
            };

            tracing::info!("Mounting {:?} at {}", volume, target.display());
            self.runner.run(&mount.arg_path(&target))?;
            volumes.mounted.push(volume);
        }

        self.copy_payload(volumes, sources)?;
        Ok(())
    }

    fn copy_payload(&self, volumes: &StagedVolumes, sources: &StageSources) -> Result<(), CommandError> {
        let iso_root = volumes.mount_point(Volume::Iso);
        let esp_root = volumes.mount_point(Volume::Esp);
        let data_root = volumes.mount_point(Volume::Data);

        for tree in defaults::ESP_PAYLOAD_TREES {
            tracing::info!("Copying {} from ISO to ESP", tree);
            self.runner.run(
                &Invocation::new("cp")
                    .arg("-r")
                    .arg_path(&iso_root.join(tree))
                    .arg_path(&esp_root),
            )?;
        }

        for file in [&sources.iso, &sources.kickstart] {
            tracing::info!("Copying {} to data partition", file.display());
            self.runner
                .run(&Invocation::new("cp").arg_path(file).arg_path(&data_root))?;
        }

        // The udev rule and helper are usually symlinks into the system image.
        for file in [&sources.disk_naming_rule, &sources.nvme_id_script] {
            tracing::info!("Copying {} to data partition", file.display());
            self.runner.run(
                &Invocation::new("cp")
                    .arg("-L")
                    .arg_path(file)
                    .arg_path(&data_root),
            )?;
        }

        Ok(())
    }

    /// Unmount data, ISO and ESP in that order
    ///
    /// Stops at the first failing unmount.
    pub fn unstage_all(&self, volumes: &mut StagedVolumes) -> Result<(), CommandError> {
        for volume in Volume::UNMOUNT_ORDER {
            if !volumes.is_mounted(volume) {
                continue;
            }
            tracing::info!("Unmounting {:?}", volume);
            self.runner
                .run(&Invocation::new("umount").arg_path(&volumes.mount_point(volume)))?;
            volumes.mounted.retain(|v| *v != volume);
        }
        Ok(())
    }

    /// Unmount whatever is still mounted, ignoring failures
    ///
    /// Used on the failure path; errors are logged so they do not hide the
    /// error that caused the build to stop.
    pub fn release_best_effort(&self, volumes: &mut StagedVolumes) {
        for volume in Volume::UNMOUNT_ORDER {
            if !volumes.is_mounted(volume) {
                continue;
            }
            let target = volumes.mount_point(volume);
            match self.runner.run(&Invocation::new("umount").arg_path(&target)) {
                Ok(_) => volumes.mounted.retain(|v| *v != volume),
                Err(e) => tracing::warn!("Could not unmount {}: {}", target.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::command::RecordingRunner;
    use tempfile::TempDir;

    fn sources() -> StageSources {
        StageSources {
            iso: PathBuf::from("/files/installer.iso"),
            kickstart: PathBuf::from("/files/ks.cfg"),
            disk_naming_rule: PathBuf::from("/usr/lib/udev/rules.d/65-gce-disk-naming.rules"),
            nvme_id_script: PathBuf::from("/usr/lib/udev/google_nvme_id"),
        }
    }

    fn disk() -> PreparedDisk {
        PreparedDisk {
            disk: PathBuf::from("/dev/sdb"),
            esp: PathBuf::from("/dev/sdb1"),
            data: PathBuf::from("/dev/sdb2"),
        }
    }

    #[test]
    fn test_stage_all_command_sequence() {
        let temp = TempDir::new().unwrap();
        let work = temp.path();
        let runner = RecordingRunner::new();
        let mut volumes = StagedVolumes::new(work);

        VolumeStager::new(&runner)
            .stage_all(&mut volumes, &disk(), &sources())
            .unwrap();

        let w = work.display();
        assert_eq!(
            runner.command_lines(),
            vec![
                format!("mount -o ro,loop -t iso9660 /files/installer.iso {w}/iso"),
                format!("mount -t vfat /dev/sdb1 {w}/boot"),
                format!("mount -t ext2 /dev/sdb2 {w}/installer"),
                format!("cp -r {w}/iso/EFI {w}/boot"),
                format!("cp -r {w}/iso/images {w}/boot"),
                format!("cp /files/installer.iso {w}/installer"),
                format!("cp /files/ks.cfg {w}/installer"),
                format!("cp -L /usr/lib/udev/rules.d/65-gce-disk-naming.rules {w}/installer"),
                format!("cp -L /usr/lib/udev/google_nvme_id {w}/installer"),
            ]
        );

        assert_eq!(volumes.mounted(), &Volume::MOUNT_ORDER);
        for volume in Volume::MOUNT_ORDER {
            assert!(volumes.mount_point(volume).is_dir());
        }
    }

    #[test]
    fn test_unstage_all_order() {
        let temp = TempDir::new().unwrap();
        let work = temp.path();
        let runner = RecordingRunner::new();
        let stager = VolumeStager::new(&runner);
        let mut volumes = StagedVolumes::new(work);
        stager.stage_all(&mut volumes, &disk(), &sources()).unwrap();

        let before = runner.calls().len();
        stager.unstage_all(&mut volumes).unwrap();

        let w = work.display();
        assert_eq!(
            runner.command_lines()[before..].to_vec(),
            vec![
                format!("umount {w}/installer"),
                format!("umount {w}/iso"),
                format!("umount {w}/boot"),
            ]
        );
        assert!(volumes.mounted().is_empty());
    }

    #[test]
    fn test_failed_mount_records_only_successful_mounts() {
        let temp = TempDir::new().unwrap();
        let runner = RecordingRunner::new().fail_on("mount", Some("ext2"));
        let mut volumes = StagedVolumes::new(temp.path());

        let err = VolumeStager::new(&runner)
            .stage_all(&mut volumes, &disk(), &sources())
            .unwrap_err();

        assert!(matches!(err, InstallerError::Command(_)));
        assert_eq!(volumes.mounted(), &[Volume::Iso, Volume::Esp]);
        assert!(runner.calls_to("cp").is_empty());
    }

    #[test]
    fn test_release_best_effort_continues_past_failures() {
        let temp = TempDir::new().unwrap();
        let work = temp.path();
        let iso_mount = work.join("iso").display().to_string();
        let runner = RecordingRunner::new().fail_on("umount", Some(&iso_mount));
        let stager = VolumeStager::new(&runner);
        let mut volumes = StagedVolumes::new(work);
        stager.stage_all(&mut volumes, &disk(), &sources()).unwrap();

        stager.release_best_effort(&mut volumes);

        assert_eq!(runner.calls_to("umount").len(), 3);
        assert_eq!(volumes.mounted(), &[Volume::Iso]);
    }

    #[test]
    fn test_staged_file_locations() {
        let volumes = StagedVolumes::new(Path::new("/build"));
        assert_eq!(volumes.grub_cfg(), PathBuf::from("/build/boot/EFI/BOOT/grub.cfg"));
        assert_eq!(
            volumes.data_file(Path::new("/usr/lib/udev/google_nvme_id")),
            PathBuf::from("/build/installer/google_nvme_id")
        );
    }
}
