//! One JSON file per key:
//! `["versions", "ab12", "log"]` -> `<base>/versions/ab12/log.json`

use crate::{encode, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use keepsake_util::fs;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores each key as one pretty-printed JSON document under `base_path`.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    base_path: PathBuf,
}

impl JsonStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map `key` onto a file below the base path.
    fn locate(&self, key: &[&str]) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::invalid_key("empty key"));
        }
        if let Some(bad) = key.iter().find(|c| !is_plain_component(c)) {
            return Err(StorageError::invalid_key(format!(
                "bad key component {bad:?}"
            )));
        }

        let mut path: PathBuf = key.iter().fold(self.base_path.clone(), |p, c| p.join(c));
        path.set_extension("json");
        Ok(path)
    }
}

/// A component must name one entry inside its parent directory.
fn is_plain_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\'])
}

#[async_trait]
impl Storage for JsonStorage {
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>> {
        let path = self.locate(key)?;
        debug!(path = %path.display(), "storage read");

        let Some(bytes) = fs::read_optional(&path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::corrupt(&path, e.to_string()))
    }

    async fn write<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        let path = self.locate(key)?;
        debug!(path = %path.display(), "storage write");
        fs::write_atomic(&path, &encode(value)?).await?;
        Ok(())
    }

    async fn remove(&self, key: &[&str]) -> StorageResult<()> {
        let path = self.locate(key)?;
        debug!(path = %path.display(), "storage remove");
        fs::remove_file_if_exists(&path).await?;
        Ok(())
    }

    async fn exists(&self, key: &[&str]) -> StorageResult<bool> {
        Ok(fs::exists(&self.locate(key)?).await)
    }

    fn path_for(&self, key: &[&str]) -> StorageResult<PathBuf> {
        self.locate(key)
    }
}
