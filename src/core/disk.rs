//! Installer disk partitioning and formatting
//!
//! Lays out the target disk as GPT with two partitions:
//!
//! | # | Type  | Start  | End    | Flags     | Label       |
//! |---|-------|--------|--------|-----------|-------------|
//! | 1 | FAT32 | 1MB    | 1024MB | boot, esp | `ESP`       |
//! | 2 | ext2  | 1024MB | 100%   |           | `INSTALLER` |
//!
//! Every structural change is followed by `sync`; skipping the flush has
//! produced disks the installer could not read.

use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::error::CommandError;
use crate::infra::command::{CommandRunner, Invocation};

/// Filesystems used on the installer disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filesystem {
    /// FAT32, for the EFI system partition
    Fat32,
    /// ext2, for the data partition
    Ext2,
}

impl Filesystem {
    /// Filesystem type name understood by `parted mkpart`
    pub fn parted_name(&self) -> &'static str {
        match self {
            Filesystem::Fat32 => "fat32",
            Filesystem::Ext2 => "ext2",
        }
    }

    /// Filesystem type name understood by `mount -t`
    pub fn mount_type(&self) -> &'static str {
        match self {
            Filesystem::Fat32 => "vfat",
            Filesystem::Ext2 => "ext2",
        }
    }
}

/// Partition flags set through `parted set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionFlag {
    Boot,
    Esp,
}

impl PartitionFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionFlag::Boot => "boot",
            PartitionFlag::Esp => "esp",
        }
    }
}

/// Geometry and formatting of one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSpec {
    /// 1-based partition number
    pub index: u32,
    pub filesystem: Filesystem,
    /// Start offset in parted units
    pub start: &'static str,
    /// End offset in parted units
    pub end: &'static str,
    pub flags: &'static [PartitionFlag],
    /// Volume label written by the formatter
    pub label: &'static str,
}

/// EFI system partition
pub const ESP_PARTITION: PartitionSpec = PartitionSpec {
    index: 1,
    filesystem: Filesystem::Fat32,
    start: "1MB",
    end: "1024MB",
    flags: &[PartitionFlag::Boot, PartitionFlag::Esp],
    label: defaults::ESP_LABEL,
};

/// Data partition holding the ISO and kickstart
pub const DATA_PARTITION: PartitionSpec = PartitionSpec {
    index: 2,
    filesystem: Filesystem::Ext2,
    start: "1024MB",
    end: "100%",
    flags: &[],
    label: defaults::INSTALLER_LABEL,
};

/// Partitions in on-disk order
pub const LAYOUT: [PartitionSpec; 2] = [ESP_PARTITION, DATA_PARTITION];

/// Device node of partition `index` on `disk`
///
/// Disks whose name ends in a digit (`nvme0n1`, `mmcblk0`, `loop0`) take a
/// `p` separator before the partition number.
pub fn partition_path(disk: &Path, index: u32) -> PathBuf {
    let disk = disk.to_string_lossy();
    let separator = if disk.ends_with(|c: char| c.is_ascii_digit()) {
        "p"
    } else {
        ""
    };
    PathBuf::from(format!("{disk}{separator}{index}"))
}

/// A laid-out and formatted installer disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDisk {
    /// Whole-disk device
    pub disk: PathBuf,
    /// EFI system partition device
    pub esp: PathBuf,
    /// Data partition device
    pub data: PathBuf,
}

/// Partitions and formats the installer disk
pub struct DiskPreparer<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> DiskPreparer<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Create the partition table and both filesystems on `disk`
    ///
    /// Any failing step aborts immediately; partial disk state is left as is.
    pub fn prepare_partitions(&self, disk: &Path) -> Result<PreparedDisk, CommandError> {
        tracing::info!("Writing GPT label to {}", disk.display());
        self.step(parted(disk).args(["mklabel", "gpt"]))?;

        for partition in &LAYOUT {
            tracing::info!(
                "Creating partition {} ({}, {} - {})",
                partition.index,
                partition.filesystem.parted_name(),
                partition.start,
                partition.end
            );
            self.step(parted(disk).args([
                "mkpart",
                "primary",
                partition.filesystem.parted_name(),
                partition.start,
                partition.end,
            ]))?;
        }

        for partition in &LAYOUT {
            let index = partition.index.to_string();
            for flag in partition.flags {
                self.step(parted(disk).args(["set", index.as_str(), flag.as_str(), "on"]))?;
            }
        }

        let prepared = PreparedDisk {
            disk: disk.to_path_buf(),
            esp: partition_path(disk, ESP_PARTITION.index),
            data: partition_path(disk, DATA_PARTITION.index),
        };

        for partition in &LAYOUT {
            let device = partition_path(disk, partition.index);
            tracing::info!(
                "Formatting {} as {} with label {}",
                device.display(),
                partition.filesystem.parted_name(),
                partition.label
            );
            self.format(partition, &device)?;
        }

        Ok(prepared)
    }

    fn format(&self, partition: &PartitionSpec, device: &Path) -> Result<(), CommandError> {
        match partition.filesystem {
            Filesystem::Fat32 => {
                self.step(Invocation::new("mkfs.vfat").args(["-F", "32"]).arg_path(device))?;
                self.step(Invocation::new("fatlabel").arg_path(device).arg(partition.label))
            }
            Filesystem::Ext2 => self.step(
                Invocation::new("mkfs.ext2")
                    .args(["-L", partition.label])
                    .arg_path(device),
            ),
        }
    }

    /// Run one structural change followed by a flush
    fn step(&self, invocation: Invocation) -> Result<(), CommandError> {
        self.runner.run(&invocation)?;
        self.runner.run(&Invocation::new("sync"))?;
        Ok(())
    }
}

fn parted(disk: &Path) -> Invocation {
    Invocation::new("parted").arg("--script").arg_path(disk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::command::RecordingRunner;

    #[test]
    fn test_partition_path_plain_disk() {
        assert_eq!(partition_path(Path::new("/dev/sdb"), 1), PathBuf::from("/dev/sdb1"));
        assert_eq!(partition_path(Path::new("/dev/sdb"), 2), PathBuf::from("/dev/sdb2"));
    }

    #[test]
    fn test_partition_path_numbered_disk() {
        assert_eq!(
            partition_path(Path::new("/dev/nvme0n2"), 1),
            PathBuf::from("/dev/nvme0n2p1")
        );
        assert_eq!(partition_path(Path::new("/dev/loop3"), 2), PathBuf::from("/dev/loop3p2"));
    }

    #[test]
    fn test_layout_geometry() {
        assert_eq!(LAYOUT.len(), 2);
        assert_eq!(ESP_PARTITION.index, 1);
        assert_eq!((ESP_PARTITION.start, ESP_PARTITION.end), ("1MB", "1024MB"));
        assert_eq!(ESP_PARTITION.flags, &[PartitionFlag::Boot, PartitionFlag::Esp]);
        assert_eq!(DATA_PARTITION.index, 2);
        assert_eq!((DATA_PARTITION.start, DATA_PARTITION.end), ("1024MB", "100%"));
        assert!(DATA_PARTITION.flags.is_empty());
        // The ESP ends exactly where the data partition starts.
        assert_eq!(ESP_PARTITION.end, DATA_PARTITION.start);
    }

    #[test]
    fn test_prepare_partitions_command_sequence() {
        let runner = RecordingRunner::new();
        let prepared = DiskPreparer::new(&runner)
            .prepare_partitions(Path::new("/dev/sdb"))
            .unwrap();

        assert_eq!(
            prepared,
            PreparedDisk {
                disk: PathBuf::from("/dev/sdb"),
                esp: PathBuf::from("/dev/sdb1"),
                data: PathBuf::from("/dev/sdb2"),
            }
        );

        assert_eq!(
            runner.command_lines(),
            vec![
                "parted --script /dev/sdb mklabel gpt",
                "sync",
                "parted --script /dev/sdb mkpart primary fat32 1MB 1024MB",
                "sync",
                "parted --script /dev/sdb mkpart primary ext2 1024MB 100%",
                "sync",
                "parted --script /dev/sdb set 1 boot on",
                "sync",
                "parted --script /dev/sdb set 1 esp on",
                "sync",
                "mkfs.vfat -F 32 /dev/sdb1",
                "sync",
                "fatlabel /dev/sdb1 ESP",
                "sync",
                "mkfs.ext2 -L INSTALLER /dev/sdb2",
                "sync",
            ]
        );
    }

    #[test]
    fn test_every_structural_step_is_flushed() {
        let runner = RecordingRunner::new();
        DiskPreparer::new(&runner)
            .prepare_partitions(Path::new("/dev/sdc"))
            .unwrap();

        let calls = runner.calls();
        for pair in calls.chunks(2) {
            assert_ne!(pair[0].program, "sync");
            assert_eq!(pair[1].program, "sync");
        }
    }

    #[test]
    fn test_failure_aborts_remaining_steps() {
        let runner = RecordingRunner::new().fail_on("mkfs.vfat", None);
        let err = DiskPreparer::new(&runner)
            .prepare_partitions(Path::new("/dev/sdb"))
            .unwrap_err();

        assert!(matches!(err, CommandError::Failed { ref program, .. } if program == "mkfs.vfat"));
        assert!(runner.calls_to("mkfs.ext2").is_empty());
        assert!(runner.calls_to("fatlabel").is_empty());
        assert_eq!(runner.calls().last().unwrap().program, "mkfs.vfat");
    }
}
