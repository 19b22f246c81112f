//! Metadata storage for keepsake workspaces.
//!
//! Workspace metadata (configuration, backup state, version logs) is kept as
//! small JSON documents addressed by key paths such as `["versions", hash, "log"]`.

pub mod error;
pub mod json;

pub use error::{StorageError, StorageResult};
pub use json::JsonStorage;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;

/// A trait for key-value storage backends.
///
/// Keys are represented as path segments, e.g., `["versions", "<hash>", "log"]`.
/// Values are serialized/deserialized as JSON.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value from storage.
    ///
    /// Returns `None` if the key doesn't exist.
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>>;

    /// Write a value to storage, replacing any previous value atomically.
    ///
    /// Creates parent directories if necessary.
    async fn write<T: Serialize + Send + Sync>(&self, key: &[&str], value: &T)
        -> StorageResult<()>;

    /// Remove a value from storage. Missing keys are not an error.
    async fn remove(&self, key: &[&str]) -> StorageResult<()>;

    /// Check if a key exists.
    async fn exists(&self, key: &[&str]) -> StorageResult<bool>;

    /// Resolve the file backing a key.
    ///
    /// Used by callers that stage writes through a transaction instead of
    /// writing directly.
    fn path_for(&self, key: &[&str]) -> StorageResult<PathBuf>;
}

/// Serialize a value the same way [`Storage::write`] does.
pub fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}
