//! Path utilities.
//!
//! This module provides utilities for working with file paths.

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Name of the project-local workspace directory.
pub const WORKSPACE_DIR_NAME: &str = ".keepsake";

/// Directory used for temporary workspaces.
pub fn temp_workspace_dir() -> PathBuf {
    std::env::temp_dir().join("keepsake")
}

/// Get the project-local workspace directory.
pub fn local_workspace_dir(project_root: &Path) -> PathBuf {
    project_root.join(WORKSPACE_DIR_NAME)
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => {
                result.push(component);
            }
        }
    }

    result
}

/// Make `path` absolute against the current working directory.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    let cwd = std::env::current_dir()?;
    Ok(normalize(&cwd.join(path)))
}

/// Resolve the canonical absolute form of a file path.
///
/// The file itself may be missing (for example after the user deleted a
/// tracked file); in that case the parent directory is canonicalized and the
/// file name re-attached, so the result matches what was recorded while the
/// file still existed.
pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::invalid_input("empty path"));
    }

    if let Ok(canonical) = std::fs::canonicalize(path) {
        return Ok(canonical);
    }

    let absolute = absolute(path)?;
    let file_name = absolute
        .file_name()
        .ok_or_else(|| Error::invalid_input(format!("not a file path: {}", path.display())))?
        .to_os_string();

    match absolute.parent().map(std::fs::canonicalize) {
        Some(Ok(parent)) => Ok(parent.join(file_name)),
        _ => Ok(absolute),
    }
}
