//! Error types for the core crate.

use keepsake_storage::StorageError;
use keepsake_util::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The two ways a file can be placed under supervision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Single backup copy, resolved by keep or undo.
    Backup,
    /// Numbered version history.
    Versioned,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::Backup => write!(f, "backup"),
            TrackingMode::Versioned => write!(f, "version"),
        }
    }
}

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Target file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File is already tracked in the requested mode.
    #[error("file is already tracked: {}", .0.display())]
    AlreadyTracked(PathBuf),

    /// File has no tracking record.
    #[error("file is not tracked: {}", .0.display())]
    NotTracked(PathBuf),

    /// Working content equals the current version.
    #[error("no changes to commit for {}", .0.display())]
    NoChanges(PathBuf),

    /// Requested version is not in the file's log.
    #[error("version {version} not found for {}", path.display())]
    VersionNotFound { path: PathBuf, version: u32 },

    /// Workspace root or its config is missing.
    #[error("workspace not found at {}", .0.display())]
    WorkspaceNotFound(PathBuf),

    /// Workspace metadata is missing or unparseable.
    #[error("workspace at {} is corrupted: {reason}", path.display())]
    WorkspaceCorrupted { path: PathBuf, reason: String },

    /// `init` called on an initialized workspace.
    #[error("workspace already initialized at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// File is already supervised in the other mode.
    #[error("{} is already under {mode} tracking", path.display())]
    ModeConflict { path: PathBuf, mode: TrackingMode },

    /// File cannot be tracked as text.
    #[error("cannot track {}: {reason}", path.display())]
    InvalidContent { path: PathBuf, reason: String },

    /// Filesystem refused access.
    #[error("permission denied: {0}")]
    PermissionDenied(#[source] keepsake_util::Error),

    /// Any other filesystem failure.
    #[error("io error: {0}")]
    Io(#[source] keepsake_util::Error),

    /// Transaction was already committed or rolled back.
    #[error("transaction is closed")]
    TransactionClosed,

    /// Metadata storage error.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn invalid_content(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidContent {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::WorkspaceCorrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can carry on without any repair.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoChanges(_))
    }
}

impl From<keepsake_util::Error> for CoreError {
    fn from(err: keepsake_util::Error) -> Self {
        match err.kind() {
            ErrorKind::PermissionDenied => Self::PermissionDenied(err),
            _ => Self::Io(err),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Fs(inner) => inner.into(),
            other => Self::Storage(other),
        }
    }
}
