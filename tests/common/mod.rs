//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Scratch directory for one test
///
/// Holds the files a command reads or rewrites and serves as the working
/// directory of the spawned binary.
pub struct TestProject {
    /// Temporary directory for the test
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists in the test project
    #[allow(dead_code)]
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    #[allow(dead_code)]
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Command for the el-installer binary, run inside the project with a
    /// clean parameter environment
    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_el-installer"));
        cmd.current_dir(self.path());
        for var in CLEARED_ENV {
            cmd.env_remove(var);
        }
        cmd.args(args);
        cmd
    }

    /// Run the el-installer binary to completion
    #[allow(dead_code)]
    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .output()
            .expect("Failed to execute el-installer")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment variables the binary reads, removed so the host cannot leak in
pub const CLEARED_ENV: &[&str] = &[
    "EL_RELEASE",
    "EL_SAVELOGS",
    "EL_ISO",
    "EL_KICKSTART",
    "EL_DISK",
    "EL_WORKDIR",
    "EL_METADATA_URL",
    "EL_INSTALLER_CONFIG",
];

/// Trimmed grub.cfg as shipped on a RHEL 8 installer ISO
#[allow(dead_code)]
pub const RHEL_GRUB_CFG: &str = "\
set default=\"1\"

function load_video {
  insmod efi_gop
  insmod efi_uga
}

load_video
set gfxpayload=keep
insmod gzio
insmod part_gpt
insmod ext2

set timeout=60
### END /etc/grub.d/00_header ###

search --no-floppy --set=root -l 'RHEL-8-4-0-BaseOS-x86_64'

### BEGIN /etc/grub.d/10_linux ###
menuentry 'Install Red Hat Enterprise Linux 8.4' --class fedora --class gnu-linux --class gnu --class os {
\tlinuxefi /images/pxeboot/vmlinuz inst.stage2=hd:LABEL=RHEL-8-4-0-BaseOS-x86_64 quiet
\tinitrdefi /images/pxeboot/initrd.img
}
menuentry 'Test this media & install Red Hat Enterprise Linux 8.4' --class fedora --class gnu-linux --class gnu --class os {
\tlinuxefi /images/pxeboot/vmlinuz inst.stage2=hd:LABEL=RHEL-8-4-0-BaseOS-x86_64 rd.live.check quiet
\tinitrdefi /images/pxeboot/initrd.img
}
";

/// google_nvme_id helper that still reads the namespace id through xxd
#[allow(dead_code)]
pub const XXD_NVME_ID: &str = "\
#!/bin/bash
function get_namespace_device_name() {
  local nvme_json
  nvme_json=\"$(\"$nvme_cli_bin\" id-ns -b \"$1\" | xxd -p -seek 384 | xxd -p -r)\"
  echo \"$nvme_json\"
}
";

/// Boot arguments appended to stage2 lines when logs are not kept
#[allow(dead_code)]
pub const ARGS_NOSAVE: &str = "inst.text inst.ks=hd:LABEL=INSTALLER:/ks.cfg \
console=ttyS0,38400n8 inst.gpt inst.loglevel=debug inst.nosave=all";
