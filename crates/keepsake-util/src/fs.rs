//! Filesystem primitives.
//!
//! Thin async wrappers over `tokio::fs` that attach the offending path to every
//! failure and classify it with an [`ErrorKind`](crate::ErrorKind). Nothing in
//! here keeps state; higher layers compose these into transactions.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::trace;

/// Subset of file metadata the engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub len: u64,
    pub is_file: bool,
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
}

/// Check whether anything exists at `path`.
pub async fn exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

/// Check whether `path` is an existing regular file.
pub async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Stat a path.
pub async fn stat(path: &Path) -> Result<FileStat> {
    let meta = fs::metadata(path)
        .await
        .map_err(|e| Error::from_io(e, path))?;
    Ok(FileStat {
        len: meta.len(),
        is_file: meta.is_file(),
        is_dir: meta.is_dir(),
        modified: meta.modified().ok(),
    })
}

/// Read a whole file as bytes.
pub async fn read(path: &Path) -> Result<Vec<u8>> {
    trace!(path = %path.display(), "read");
    fs::read(path).await.map_err(|e| Error::from_io(e, path))
}

/// Read a whole file, returning `None` if it does not exist.
pub async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::from_io(e, path)),
    }
}

/// Write bytes to a file through a sibling temp file and a rename.
///
/// Readers observe either the previous content or the new content, never a
/// partially written file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    trace!(path = %path.display(), len = contents.len(), "write_atomic");
    create_parent_dirs(path).await?;

    let temp = temp_sibling(path);
    fs::write(&temp, contents)
        .await
        .map_err(|e| Error::from_io(e, &temp))?;

    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(Error::from_io(e, path));
    }

    Ok(())
}

/// Copy a file, creating the destination's parent directories.
pub async fn copy(from: &Path, to: &Path) -> Result<u64> {
    trace!(from = %from.display(), to = %to.display(), "copy");
    create_parent_dirs(to).await?;
    fs::copy(from, to).await.map_err(|e| Error::from_io(e, from))
}

/// Rename a file, creating the destination's parent directories.
pub async fn rename(from: &Path, to: &Path) -> Result<()> {
    trace!(from = %from.display(), to = %to.display(), "rename");
    create_parent_dirs(to).await?;
    fs::rename(from, to)
        .await
        .map_err(|e| Error::from_io(e, from))
}

/// Remove a file.
pub async fn remove_file(path: &Path) -> Result<()> {
    trace!(path = %path.display(), "remove_file");
    fs::remove_file(path)
        .await
        .map_err(|e| Error::from_io(e, path))
}

/// Remove a file, returning whether anything was removed.
pub async fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::from_io(e, path)),
    }
}

/// Create a directory and all of its parents.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| Error::from_io(e, path))
}

/// Remove a directory tree. Missing directories are not an error.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::from_io(e, path)),
    }
}

/// Remove a directory only if it is empty.
pub async fn remove_dir(path: &Path) -> Result<()> {
    fs::remove_dir(path)
        .await
        .map_err(|e| Error::from_io(e, path))
}

/// List the entry names of a directory. A missing directory lists as empty.
pub async fn list_dir(path: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(Error::from_io(e, path)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::from_io(e, path))?
    {
        names.push(entry.file_name().to_string_lossy().to_string());
    }

    names.sort();
    Ok(names)
}

async fn create_parent_dirs(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir_all(parent).await,
        _ => Ok(()),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}
