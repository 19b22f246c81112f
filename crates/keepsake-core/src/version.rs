//! Multi-snapshot tracking.
//!
//! Each versioned file owns a store under `versions/<hash>/`:
//!
//! - `log.json`: every [`VersionRecord`] in creation order
//! - `current`: the checked-out version number as plain text
//! - `meta.json`: the file path, so listings can name it
//!
//! Version numbers are assigned as `max(existing) + 1`. Checking out an old
//! version moves the `current` pointer but never truncates or forks the log,
//! so a commit after a checkout still appends at the end.

use crate::diff::{generate_diff, DiffResult};
use crate::error::{CoreError, CoreResult, TrackingMode};
use crate::record::{FileKey, VersionHistory, VersionMeta, VersionRecord};
use crate::transaction::Transaction;
use crate::workspace::Workspace;
use chrono::Utc;
use keepsake_storage::{encode, Storage, StorageError};
use keepsake_util::{fs, TimingGuard};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Summary of one versioned file, as returned by [`VersionManager::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedFile {
    pub path: PathBuf,
    pub current_version: u32,
    pub latest_version: u32,
}

/// Version-mode operations on a workspace.
#[derive(Debug, Clone)]
pub struct VersionManager {
    workspace: Workspace,
}

impl VersionManager {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    /// Snapshot the current content of `path` as version 1.
    pub async fn create_initial_version(
        &self,
        path: impl AsRef<Path>,
        message: impl Into<String>,
    ) -> CoreResult<VersionRecord> {
        let _timing = TimingGuard::version("create_initial_version");
        let key = FileKey::resolve(path.as_ref())?;
        let _lock = self.workspace.locks().lock(&key.hash).await;

        let content = self.workspace.read_text(&key.path).await?;
        if self.store_exists(&key).await {
            return Err(CoreError::AlreadyTracked(key.path));
        }
        if self.workspace.load_state().await?.find(&key.path).is_some() {
            return Err(CoreError::ModeConflict {
                path: key.path,
                mode: TrackingMode::Backup,
            });
        }

        let record = VersionRecord::new(1, message, content);
        let meta = VersionMeta {
            path: key.path.clone(),
            created_at: Utc::now(),
        };

        let mut tx = Transaction::new();
        tx.create(self.path_for(&key, "meta")?, encode(&meta)?)?;
        tx.create(self.path_for(&key, "log")?, encode(&[record.clone()])?)?;
        tx.create(self.current_path(&key), pointer(1))?;
        tx.execute().await?;

        info!(path = %key.path.display(), "Created initial version");
        Ok(record)
    }

    /// Record the working content as a new version.
    ///
    /// Fails with [`CoreError::NoChanges`] when the content equals the
    /// checked-out version.
    pub async fn commit_version(
        &self,
        path: impl AsRef<Path>,
        message: impl Into<String>,
    ) -> CoreResult<VersionRecord> {
        let _timing = TimingGuard::version("commit");
        let key = FileKey::resolve(path.as_ref())?;
        let _lock = self.workspace.locks().lock(&key.hash).await;

        let history = self.load_history(&key).await?;
        let content = self.workspace.read_text(&key.path).await?;
        if history.current().map(|r| r.content == content).unwrap_or(false) {
            return Err(CoreError::NoChanges(key.path));
        }

        let record = VersionRecord::new(history.next_version(), message, content);
        let mut versions = history.versions;
        versions.push(record.clone());

        let mut tx = Transaction::new();
        tx.write(self.path_for(&key, "log")?, encode(&versions)?)?;
        tx.write(self.current_path(&key), pointer(record.version))?;
        tx.execute().await?;

        info!(
            path = %key.path.display(),
            version = record.version,
            "Committed version"
        );
        Ok(record)
    }

    /// Overwrite the working file with version `version` and point at it.
    pub async fn checkout_version(
        &self,
        path: impl AsRef<Path>,
        version: u32,
    ) -> CoreResult<VersionRecord> {
        let _timing = TimingGuard::version("checkout");
        let key = FileKey::resolve(path.as_ref())?;
        let _lock = self.workspace.locks().lock(&key.hash).await;

        let history = self.load_history(&key).await?;
        let record = history
            .get(version)
            .cloned()
            .ok_or_else(|| CoreError::VersionNotFound {
                path: key.path.clone(),
                version,
            })?;

        let mut tx = Transaction::new();
        tx.write(&key.path, record.content.clone())?;
        tx.write(self.current_path(&key), pointer(version))?;
        tx.execute().await?;

        info!(
            path = %key.path.display(),
            from = history.current_version,
            to = version,
            "Checked out version"
        );
        Ok(record)
    }

    /// All records of `path` in creation order.
    pub async fn version_history(
        &self,
        path: impl AsRef<Path>,
    ) -> CoreResult<Vec<VersionRecord>> {
        Ok(self.history(path).await?.versions)
    }

    /// Records plus the current pointer.
    pub async fn history(&self, path: impl AsRef<Path>) -> CoreResult<VersionHistory> {
        let key = FileKey::resolve(path.as_ref())?;
        self.load_history(&key).await
    }

    pub async fn current_version(&self, path: impl AsRef<Path>) -> CoreResult<u32> {
        Ok(self.history(path).await?.current_version)
    }

    pub async fn version(&self, path: impl AsRef<Path>, version: u32) -> CoreResult<VersionRecord> {
        let history = self.history(path).await?;
        history
            .get(version)
            .cloned()
            .ok_or(CoreError::VersionNotFound {
                path: history.path,
                version,
            })
    }

    pub async fn is_versioned(&self, path: impl AsRef<Path>) -> CoreResult<bool> {
        let key = FileKey::resolve(path.as_ref())?;
        Ok(self.store_exists(&key).await)
    }

    /// Every versioned file in the workspace, sorted by path.
    ///
    /// Stores without readable metadata are skipped.
    pub async fn list(&self) -> CoreResult<Vec<VersionedFile>> {
        let mut files = Vec::new();

        for hash in fs::list_dir(&self.workspace.versions_dir()).await? {
            let meta = match self
                .workspace
                .storage()
                .read::<VersionMeta>(&["versions", hash.as_str(), "meta"])
                .await
            {
                Ok(Some(meta)) => meta,
                Ok(None) => {
                    debug!(store = %hash, "Skipping store without metadata");
                    continue;
                }
                Err(e) => {
                    warn!(store = %hash, error = %e, "Skipping unreadable store");
                    continue;
                }
            };

            let key = FileKey {
                path: meta.path,
                hash,
            };
            match self.load_history(&key).await {
                Ok(history) => files.push(VersionedFile {
                    latest_version: history.latest_version(),
                    current_version: history.current_version,
                    path: history.path,
                }),
                Err(e) => warn!(path = %key.path.display(), error = %e, "Skipping unreadable store"),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Diff between two states of `path`.
    ///
    /// - neither given: current version against the working file
    /// - `from` only: version `from` against the working file
    /// - `to` only: current version against version `to`
    /// - both: version `from` against version `to`
    pub async fn version_diff(
        &self,
        path: impl AsRef<Path>,
        from: Option<u32>,
        to: Option<u32>,
    ) -> CoreResult<DiffResult> {
        let key = FileKey::resolve(path.as_ref())?;
        let history = self.load_history(&key).await?;
        let label = key.label();

        let lookup = |version: u32| {
            history
                .get(version)
                .ok_or_else(|| CoreError::VersionNotFound {
                    path: key.path.clone(),
                    version,
                })
        };

        let old = lookup(from.unwrap_or(history.current_version))?;
        let old_label = format!("{label}@{}", old.version);

        let (new_text, new_label) = match to {
            Some(version) => {
                let record = lookup(version)?;
                (record.content.clone(), format!("{label}@{version}"))
            }
            None => (
                self.working_text(&key.path).await?.unwrap_or_default(),
                label,
            ),
        };

        let options = self.workspace.diff_options(old_label, new_label);
        Ok(generate_diff(&old.content, &new_text, &options))
    }

    /// Whether the working file differs from the checked-out version.
    pub async fn has_changes(&self, path: impl AsRef<Path>) -> CoreResult<bool> {
        let key = FileKey::resolve(path.as_ref())?;
        let history = self.load_history(&key).await?;
        // A deleted working file always counts as changed
        let Some(working) = self.working_text(&key.path).await? else {
            return Ok(true);
        };
        Ok(history
            .current()
            .map(|r| r.content != working)
            .unwrap_or(true))
    }

    /// Restore the content captured by the initial version and drop the
    /// store.
    pub async fn undo(&self, path: impl AsRef<Path>) -> CoreResult<VersionRecord> {
        let _timing = TimingGuard::version("undo");
        let key = FileKey::resolve(path.as_ref())?;
        let _lock = self.workspace.locks().lock(&key.hash).await;

        let history = self.load_history(&key).await?;
        let initial = history
            .versions
            .first()
            .cloned()
            .ok_or_else(|| CoreError::corrupted(self.store_dir(&key), "version log is empty"))?;

        let mut tx = Transaction::new();
        tx.write(&key.path, initial.content.clone())?;
        self.queue_store_removal(&mut tx, &key).await?;
        tx.execute().await?;
        self.remove_store_dir(&key).await;

        info!(path = %key.path.display(), "Restored initial version");
        Ok(initial)
    }

    /// Drop the store and keep the working file as it is.
    pub async fn untrack(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let _timing = TimingGuard::version("untrack");
        let key = FileKey::resolve(path.as_ref())?;
        let _lock = self.workspace.locks().lock(&key.hash).await;

        if !self.store_exists(&key).await {
            return Err(CoreError::NotTracked(key.path));
        }

        let mut tx = Transaction::new();
        self.queue_store_removal(&mut tx, &key).await?;
        tx.execute().await?;
        self.remove_store_dir(&key).await;

        info!(path = %key.path.display(), "Stopped versioning");
        Ok(())
    }

    pub(crate) async fn store_exists(&self, key: &FileKey) -> bool {
        fs::is_file(&self.store_dir(key).join("log.json")).await
    }

    /// Load the log and pointer of a store.
    pub(crate) async fn load_history(&self, key: &FileKey) -> CoreResult<VersionHistory> {
        let store = self.store_dir(key);
        let versions = match self
            .workspace
            .storage()
            .read::<Vec<VersionRecord>>(&["versions", key.hash.as_str(), "log"])
            .await
        {
            Ok(Some(versions)) => versions,
            Ok(None) => return Err(CoreError::NotTracked(key.path.clone())),
            Err(e) if e.is_corrupt() => return Err(CoreError::corrupted(&store, e.to_string())),
            Err(e) => return Err(e.into()),
        };

        for record in versions.iter().filter(|r| !r.verify()) {
            warn!(
                path = %key.path.display(),
                version = record.version,
                "Checksum mismatch in version log"
            );
        }

        let raw = fs::read_optional(&self.current_path(key))
            .await?
            .ok_or_else(|| CoreError::corrupted(&store, "current version pointer is missing"))?;
        let current_version = String::from_utf8_lossy(&raw)
            .trim()
            .parse::<u32>()
            .map_err(|e| CoreError::corrupted(&store, format!("bad version pointer: {e}")))?;

        let history = VersionHistory {
            path: key.path.clone(),
            current_version,
            versions,
        };
        if history.current().is_none() {
            return Err(CoreError::corrupted(
                &store,
                format!("current version {current_version} is not in the log"),
            ));
        }

        Ok(history)
    }

    async fn queue_store_removal(&self, tx: &mut Transaction, key: &FileKey) -> CoreResult<()> {
        for file in [
            self.path_for(key, "log")?,
            self.current_path(key),
            self.path_for(key, "meta")?,
        ] {
            if fs::exists(&file).await {
                tx.delete(file)?;
            }
        }
        Ok(())
    }

    async fn remove_store_dir(&self, key: &FileKey) {
        let dir = self.store_dir(key);
        if let Err(e) = fs::remove_dir(&dir).await {
            warn!(store = %dir.display(), error = %e, "Could not remove version store directory");
        }
    }

    /// Working file content, `None` if it has been deleted.
    async fn working_text(&self, path: &Path) -> CoreResult<Option<String>> {
        match self.workspace.read_text(path).await {
            Ok(text) => Ok(Some(text)),
            Err(CoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store_dir(&self, key: &FileKey) -> PathBuf {
        self.workspace.versions_dir().join(&key.hash)
    }

    fn current_path(&self, key: &FileKey) -> PathBuf {
        self.store_dir(key).join("current")
    }

    fn path_for(&self, key: &FileKey, name: &str) -> Result<PathBuf, StorageError> {
        self.workspace
            .storage()
            .path_for(&["versions", key.hash.as_str(), name])
    }
}

fn pointer(version: u32) -> String {
    format!("{version}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceLocation;
    use tempfile::{tempdir, TempDir};

    async fn setup() -> (TempDir, VersionManager, PathBuf) {
        let dir = tempdir().unwrap();
        let workspace = Workspace::init(WorkspaceLocation::Explicit(dir.path().join("ws")))
            .await
            .unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "line1\nline2\n").unwrap();
        (dir, workspace.versions(), file)
    }

    #[tokio::test]
    async fn test_initial_version() {
        let (_dir, versions, file) = setup().await;

        let record = versions
            .create_initial_version(&file, "initial")
            .await
            .unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.content, "line1\nline2\n");
        assert_eq!(versions.current_version(&file).await.unwrap(), 1);
        assert!(versions.is_versioned(&file).await.unwrap());
        assert!(!versions.has_changes(&file).await.unwrap());

        let err = versions
            .create_initial_version(&file, "again")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyTracked(_)));
    }

    #[tokio::test]
    async fn test_store_layout() {
        let (_dir, versions, file) = setup().await;
        versions.create_initial_version(&file, "initial").await.unwrap();

        let key = FileKey::resolve(&file).unwrap();
        let store = versions.store_dir(&key);
        assert!(store.join("log.json").is_file());
        assert!(store.join("meta.json").is_file());
        assert_eq!(std::fs::read_to_string(store.join("current")).unwrap(), "1\n");
    }

    #[tokio::test]
    async fn test_commit_without_changes() {
        let (_dir, versions, file) = setup().await;
        versions.create_initial_version(&file, "initial").await.unwrap();

        let err = versions.commit_version(&file, "noop").await.unwrap_err();
        assert!(matches!(err, CoreError::NoChanges(_)));
        assert!(err.is_recoverable());
        assert_eq!(versions.version_history(&file).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_after_checkout_appends() {
        let (_dir, versions, file) = setup().await;
        versions.create_initial_version(&file, "initial").await.unwrap();

        std::fs::write(&file, "line1\nchanged\n").unwrap();
        assert_eq!(versions.commit_version(&file, "edit").await.unwrap().version, 2);

        versions.checkout_version(&file, 1).await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "line1\nline2\n");
        assert_eq!(versions.current_version(&file).await.unwrap(), 1);

        std::fs::write(&file, "line1\nnewpath\n").unwrap();
        let record = versions.commit_version(&file, "branch").await.unwrap();
        assert_eq!(record.version, 3);

        let numbers: Vec<u32> = versions
            .version_history(&file)
            .await
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_checkout_unknown_version() {
        let (_dir, versions, file) = setup().await;
        versions.create_initial_version(&file, "initial").await.unwrap();

        let err = versions.checkout_version(&file, 9).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::VersionNotFound { version: 9, .. }
        ));
        assert_eq!(versions.current_version(&file).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_version_diff_modes() {
        let (_dir, versions, file) = setup().await;
        versions.create_initial_version(&file, "initial").await.unwrap();
        std::fs::write(&file, "line1\nchanged\n").unwrap();
        versions.commit_version(&file, "edit").await.unwrap();

        let between = versions
            .version_diff(&file, Some(1), Some(2))
            .await
            .unwrap();
        assert!(between.has_changes);
        assert_eq!(between.modified_lines, 1);

        let working = versions.version_diff(&file, None, None).await.unwrap();
        assert!(!working.has_changes);
        assert!(working.diff_text.is_empty());

        let from_first = versions.version_diff(&file, Some(1), None).await.unwrap();
        assert_eq!(from_first.modified_lines, 1);

        let err = versions
            .version_diff(&file, Some(4), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::VersionNotFound { version: 4, .. }));
    }

    #[tokio::test]
    async fn test_history_of_untracked_file() {
        let (_dir, versions, file) = setup().await;
        let err = versions.version_history(&file).await.unwrap_err();
        assert!(matches!(err, CoreError::NotTracked(_)));
    }

    #[tokio::test]
    async fn test_undo_restores_initial_and_removes_store() {
        let (_dir, versions, file) = setup().await;
        versions.create_initial_version(&file, "initial").await.unwrap();
        std::fs::write(&file, "v2\n").unwrap();
        versions.commit_version(&file, "two").await.unwrap();

        versions.undo(&file).await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "line1\nline2\n");
        assert!(!versions.is_versioned(&file).await.unwrap());

        let key = FileKey::resolve(&file).unwrap();
        assert!(!versions.store_dir(&key).exists());
    }

    #[tokio::test]
    async fn test_untrack_keeps_working_file() {
        let (_dir, versions, file) = setup().await;
        versions.create_initial_version(&file, "initial").await.unwrap();
        std::fs::write(&file, "kept\n").unwrap();

        versions.untrack(&file).await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "kept\n");
        assert!(versions.list().await.unwrap().is_empty());

        let err = versions.untrack(&file).await.unwrap_err();
        assert!(matches!(err, CoreError::NotTracked(_)));
    }

    #[tokio::test]
    async fn test_dangling_pointer_is_corruption() {
        let (_dir, versions, file) = setup().await;
        versions.create_initial_version(&file, "initial").await.unwrap();

        let key = FileKey::resolve(&file).unwrap();
        std::fs::write(versions.current_path(&key), "7\n").unwrap();

        let err = versions.current_version(&file).await.unwrap_err();
        assert!(matches!(err, CoreError::WorkspaceCorrupted { .. }));
    }

    #[tokio::test]
    async fn test_list_names_files() {
        let (dir, versions, file) = setup().await;
        let other = dir.path().join("other.txt");
        std::fs::write(&other, "b\n").unwrap();

        versions.create_initial_version(&file, "a").await.unwrap();
        versions.create_initial_version(&other, "b").await.unwrap();
        std::fs::write(&other, "b2\n").unwrap();
        versions.commit_version(&other, "b2").await.unwrap();

        let listed = versions.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        let other_entry = listed
            .iter()
            .find(|f| f.path.ends_with("other.txt"))
            .unwrap();
        assert_eq!(other_entry.latest_version, 2);
        assert_eq!(other_entry.current_version, 2);
    }
}
