//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error (permission denied, missing parent, etc.)
    #[error("filesystem error: {0}")]
    Fs(#[from] keepsake_util::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored document exists but cannot be parsed
    #[error("corrupt document {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    /// Invalid key format
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey(message.into())
    }

    /// Create a corrupt document error.
    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the stored data is unreadable rather than
    /// the filesystem refusing access.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_invalid_key_formats_message() {
        let err = StorageError::invalid_key("empty key component");
        assert_eq!(err.to_string(), "Invalid key: empty key component");
    }

    #[test]
    fn storage_error_fs_wraps_util_error() {
        let err = StorageError::from(keepsake_util::Error::not_found("state.json"));
        assert!(err.to_string().contains("filesystem error"));
        assert!(!err.is_corrupt());
    }

    #[test]
    fn storage_error_corrupt_names_path() {
        let err = StorageError::corrupt("/ws/state.json", "expected value at line 1");
        assert!(err.is_corrupt());
        assert_eq!(
            err.to_string(),
            "corrupt document /ws/state.json: expected value at line 1"
        );
    }

    #[test]
    fn storage_error_json_wraps_serde_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err = StorageError::from(json_err);
        assert!(err.to_string().contains("JSON error"));
    }
}
