//! Filesystem operations
//!
//! Handles file and directory operations.

use std::path::{Path, PathBuf};

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Replace a file's content, truncating whatever was there before
pub fn write_file(path: &Path, content: &str) -> Result<(), FilesystemError> {
    std::fs::write(path, content).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Resolve a `/dev/disk/by-*` style symlink to its `/dev/<name>` node
///
/// Only the final component of the link target is kept, so relative targets
/// such as `../../sdb` resolve to `/dev/sdb`.
pub fn resolve_device_link(link: &Path) -> Result<PathBuf, FilesystemError> {
    let target = std::fs::read_link(link).map_err(|e| FilesystemError::ResolveLink {
        path: link.to_path_buf(),
        error: e.to_string(),
    })?;

    let name = target
        .file_name()
        .ok_or_else(|| FilesystemError::ResolveLink {
            path: link.to_path_buf(),
            error: format!("link target '{}' has no file name", target.display()),
        })?;

    Ok(Path::new("/dev").join(name))
}
