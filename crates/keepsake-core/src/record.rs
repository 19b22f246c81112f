//! Persisted records.

use crate::CoreResult;
use chrono::{DateTime, Utc};
use keepsake_util::hash::{path_key, sha256_hex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file under backup tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFile {
    /// Canonical path of the working file.
    pub path: PathBuf,
    /// Where the backup copy lives.
    pub backup_path: PathBuf,
    pub tracked_at: DateTime<Utc>,
}

/// Contents of `state.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupState {
    #[serde(default)]
    pub tracked_files: Vec<TrackedFile>,
    pub last_modified: DateTime<Utc>,
}

impl Default for BackupState {
    fn default() -> Self {
        Self {
            tracked_files: Vec::new(),
            last_modified: Utc::now(),
        }
    }
}

impl BackupState {
    pub fn find(&self, path: &Path) -> Option<&TrackedFile> {
        self.tracked_files.iter().find(|f| f.path == path)
    }

    /// State with `file` appended.
    pub(crate) fn with_file(&self, file: TrackedFile) -> Self {
        let mut next = self.clone();
        next.tracked_files.push(file);
        next.last_modified = Utc::now();
        next
    }

    /// State with the record for `path` dropped.
    pub(crate) fn without(&self, path: &Path) -> Self {
        let mut next = self.clone();
        next.tracked_files.retain(|f| f.path != path);
        next.last_modified = Utc::now();
        next
    }
}

/// One immutable snapshot of a versioned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub version: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// SHA-256 of `content`, hex encoded.
    pub checksum: String,
    pub content: String,
}

impl VersionRecord {
    pub fn new(version: u32, message: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            version,
            message: message.into(),
            timestamp: Utc::now(),
            checksum: sha256_hex(content.as_bytes()),
            content,
        }
    }

    /// Whether the stored checksum still matches the content.
    pub fn verify(&self) -> bool {
        self.checksum == sha256_hex(self.content.as_bytes())
    }
}

/// Contents of `versions/<hash>/meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMeta {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// The full history of one versioned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistory {
    pub path: PathBuf,
    pub current_version: u32,
    /// Records in creation order.
    pub versions: Vec<VersionRecord>,
}

impl VersionHistory {
    pub fn latest_version(&self) -> u32 {
        self.versions.iter().map(|v| v.version).max().unwrap_or(0)
    }

    pub fn get(&self, version: u32) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.version == version)
    }

    pub fn current(&self) -> Option<&VersionRecord> {
        self.get(self.current_version)
    }

    /// Number the next commit gets, regardless of what is checked out.
    pub fn next_version(&self) -> u32 {
        self.latest_version() + 1
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Canonical path of a working file plus the hash its stores are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub path: PathBuf,
    pub hash: String,
}

impl FileKey {
    pub fn resolve(path: &Path) -> CoreResult<Self> {
        let path = keepsake_util::path::canonicalize(path)?;
        let hash = path_key(&path);
        Ok(Self { path, hash })
    }

    /// Short display name for diff headers.
    pub fn label(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
