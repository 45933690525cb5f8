//! Default configuration values

/// Installer ISO image supplied by the image pipeline
pub const ISO_PATH: &str = "/files/installer.iso";

/// Kickstart answer file supplied by the image pipeline
pub const KICKSTART_PATH: &str = "/files/ks.cfg";

/// Stable symlink naming the disk that becomes the installer
pub const INSTALLER_DISK_LINK: &str = "/dev/disk/by-id/google-disk-installer";

/// udev rule giving block devices predictable names in the install environment
pub const DISK_NAMING_RULE: &str = "/usr/lib/udev/rules.d/65-gce-disk-naming.rules";

/// NVMe identification helper invoked by the udev rule
pub const NVME_ID_SCRIPT: &str = "/usr/lib/udev/google_nvme_id";

/// Volume label of the EFI system partition
pub const ESP_LABEL: &str = "ESP";

/// Volume label of the data partition holding the ISO and kickstart
pub const INSTALLER_LABEL: &str = "INSTALLER";

/// Label prefix the source ISO's grub.cfg uses for its own volume
pub const SOURCE_LABEL_PREFIX: &str = "RHEL";

/// Serial console speed shared by grub and the kernel command line
pub const SERIAL_BAUD: u32 = 38_400;

/// Grub menu timeout after patching
pub const MENU_TIMEOUT: u32 = 1;

/// Grub menu timeout shipped on the ISO
pub const SOURCE_MENU_TIMEOUT: u32 = 60;

/// Byte offset read by the NVMe id helper
pub const NVME_ID_OFFSET: u32 = 384;

/// Grub configuration path relative to the ESP root
pub const GRUB_CFG_RELATIVE: &str = "EFI/BOOT/grub.cfg";

/// Directory trees copied from the ISO onto the ESP
pub const ESP_PAYLOAD_TREES: &[&str] = &["EFI", "images"];

/// Mount point directory names, relative to the work directory
pub const ISO_MOUNT_DIR: &str = "iso";
pub const ESP_MOUNT_DIR: &str = "boot";
pub const DATA_MOUNT_DIR: &str = "installer";

/// Instance metadata attribute endpoint
pub const METADATA_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/attributes";

/// Metadata attribute holding the release to build
pub const RELEASE_ATTRIBUTE: &str = "el_release";

/// Metadata attribute asking the installer to keep its logs
pub const SAVE_LOGS_ATTRIBUTE: &str = "el_savelogs";

/// Maximum time spent retrying a metadata request (in seconds)
pub const METADATA_MAX_ELAPSED_SECS: u64 = 60;

/// Settings file name looked up in the working and config directories
pub const SETTINGS_FILE_NAME: &str = "el-installer.toml";
