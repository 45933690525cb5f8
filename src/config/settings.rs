//! Settings file management
//!
//! Reads optional overrides from an `el-installer.toml` file. Every field is
//! optional; anything left out falls back to [`crate::config::defaults`].
//!
//! ```toml
//! [paths]
//! iso = "/files/installer.iso"
//! work_dir = "/build"
//!
//! [boot]
//! serial_baud = 115200
//!
//! [build]
//! strict_patching = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::error::SettingsError;

/// Settings for an installer build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Input and output locations
    #[serde(default)]
    pub paths: PathSettings,

    /// Boot configuration parameters
    #[serde(default)]
    pub boot: BootSettings,

    /// Build behaviour switches
    #[serde(default)]
    pub build: BuildSettings,

    /// Metadata server settings
    #[serde(default)]
    pub metadata: MetadataSettings,
}

/// Input and output locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathSettings {
    /// Installer ISO image
    pub iso: Option<PathBuf>,
    /// Kickstart answer file
    pub kickstart: Option<PathBuf>,
    /// Stable symlink to the target disk
    pub disk_link: Option<PathBuf>,
    /// Directory holding the mount points
    pub work_dir: Option<PathBuf>,
    /// udev disk naming rule
    pub disk_naming_rule: Option<PathBuf>,
    /// NVMe id helper script
    pub nvme_id_script: Option<PathBuf>,
}

/// Boot configuration parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootSettings {
    /// Serial console speed
    pub serial_baud: Option<u32>,
    /// Label prefix used by the source ISO
    pub source_label_prefix: Option<String>,
}

/// Build behaviour switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Fail when a rewrite rule matches nothing
    pub strict_patching: Option<bool>,
    /// Unmount staged volumes when the build fails
    pub cleanup_on_failure: Option<bool>,
}

/// Metadata server settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataSettings {
    /// Attribute endpoint base URL
    pub url: Option<String>,
}

impl Settings {
    /// Locate and load the settings file
    ///
    /// An explicit path must exist. Without one, `./el-installer.toml` and then
    /// `<config dir>/el-installer/config.toml` are tried; if neither exists the
    /// defaults are returned.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(SettingsError::Read {
                    path: path.display().to_string(),
                    error: "file does not exist".to_string(),
                });
            }
            return Self::load_from_path(path);
        }

        let mut candidates = vec![PathBuf::from(defaults::SETTINGS_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("el-installer").join("config.toml"));
        }

        match candidates.iter().find(|p| p.exists()) {
            Some(path) => {
                tracing::debug!("Using settings file {}", path.display());
                Self::load_from_path(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Load settings from a specific path
    ///
    /// A missing file yields the default settings.
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            SettingsError::Parse { error, .. } => SettingsError::Parse {
                path: path.display().to_string(),
                error,
            },
            other => other,
        })
    }

    /// Parse settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|e| SettingsError::Parse {
            path: "<inline>".to_string(),
            error: e.to_string(),
        })
    }

    pub fn iso(&self) -> PathBuf {
        self.paths
            .iso
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::ISO_PATH))
    }

    pub fn kickstart(&self) -> PathBuf {
        self.paths
            .kickstart
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::KICKSTART_PATH))
    }

    pub fn disk_link(&self) -> PathBuf {
        self.paths
            .disk_link
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::INSTALLER_DISK_LINK))
    }

    pub fn work_dir(&self) -> PathBuf {
        self.paths
            .work_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn disk_naming_rule(&self) -> PathBuf {
        self.paths
            .disk_naming_rule
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::DISK_NAMING_RULE))
    }

    pub fn nvme_id_script(&self) -> PathBuf {
        self.paths
            .nvme_id_script
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::NVME_ID_SCRIPT))
    }

    pub fn serial_baud(&self) -> u32 {
        self.boot.serial_baud.unwrap_or(defaults::SERIAL_BAUD)
    }

    pub fn source_label_prefix(&self) -> String {
        self.boot
            .source_label_prefix
            .clone()
            .unwrap_or_else(|| defaults::SOURCE_LABEL_PREFIX.to_string())
    }

    pub fn strict_patching(&self) -> bool {
        self.build.strict_patching.unwrap_or(false)
    }

    pub fn cleanup_on_failure(&self) -> bool {
        self.build.cleanup_on_failure.unwrap_or(true)
    }

    pub fn metadata_url(&self) -> String {
        self.metadata
            .url
            .clone()
            .unwrap_or_else(|| defaults::METADATA_URL.to_string())
    }
}
