//! Build parameter resolution
//!
//! The release to build is required and the save-logs switch is optional.
//! Explicit values (flags or environment) win over instance metadata
//! attributes. Resolution happens before the disk is touched.

use crate::config::defaults;
use crate::error::ParamError;
use crate::infra::metadata::MetadataClient;

/// Parameters of one installer build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildParams {
    /// Release identifier, e.g. "8"
    pub release: String,
    /// Ask the installer to keep its logs in the installed image
    pub save_logs: bool,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamOverrides {
    pub release: Option<String>,
    pub save_logs: Option<bool>,
}

/// Interpret a metadata save-logs value; only the exact string `true` enables it
pub fn parse_save_logs(value: Option<&str>) -> bool {
    value == Some("true")
}

/// Resolve build parameters from overrides, then metadata
pub async fn resolve(
    overrides: &ParamOverrides,
    metadata: Option<&MetadataClient>,
) -> Result<BuildParams, ParamError> {
    let release = match (&overrides.release, metadata) {
        (Some(release), _) => Some(release.clone()),
        (None, Some(client)) => client.attribute(defaults::RELEASE_ATTRIBUTE).await?,
        (None, None) => None,
    };

    let release = release
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ParamError::MissingRequired {
            name: defaults::RELEASE_ATTRIBUTE.to_string(),
        })?;

    let save_logs = match (overrides.save_logs, metadata) {
        (Some(save_logs), _) => save_logs,
        (None, Some(client)) => {
            let value = client.attribute(defaults::SAVE_LOGS_ATTRIBUTE).await?;
            parse_save_logs(value.as_deref())
        }
        (None, None) => false,
    };

    Ok(BuildParams { release, save_logs })
}
