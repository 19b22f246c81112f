//! Single-snapshot tracking.
//!
//! `track` copies a file to `backups/<hash>` and records it in `state.json`.
//! The record lives until the caller resolves it:
//!
//! - `keep` / `abort` drop the backup and leave the working file as it is
//! - `undo` writes the backup over the working file, then drops it
//!
//! Every mutation runs as one [`Transaction`] under the file lock and the
//! state lock, so a failure never leaves a record pointing at a removed
//! backup.

use crate::diff::{generate_diff, DiffResult};
use crate::error::{CoreError, CoreResult, TrackingMode};
use crate::record::{FileKey, TrackedFile};
use crate::transaction::Transaction;
use crate::workspace::Workspace;
use chrono::Utc;
use keepsake_storage::encode;
use keepsake_util::{fs, TimingGuard};
use std::path::Path;
use tracing::{debug, info, warn};

/// Backup-mode operations on a workspace.
#[derive(Debug, Clone)]
pub struct BackupTracker {
    workspace: Workspace,
}

impl BackupTracker {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    /// Start tracking `path` by copying it to the backup area.
    pub async fn track(&self, path: impl AsRef<Path>) -> CoreResult<TrackedFile> {
        let _timing = TimingGuard::backup("track");
        let key = FileKey::resolve(path.as_ref())?;
        let _lock = self.workspace.locks().lock_with_state(&key.hash).await;

        self.workspace.check_file(&key.path).await?;

        let state = self.workspace.load_state().await?;
        if state.find(&key.path).is_some() {
            return Err(CoreError::AlreadyTracked(key.path));
        }
        if self.workspace.versions().store_exists(&key).await {
            return Err(CoreError::ModeConflict {
                path: key.path,
                mode: TrackingMode::Versioned,
            });
        }

        let record = TrackedFile {
            path: key.path.clone(),
            backup_path: self.workspace.backups_dir().join(&key.hash),
            tracked_at: Utc::now(),
        };
        let next = state.with_file(record.clone());

        let mut tx = Transaction::new();
        tx.copy(&record.path, &record.backup_path)?;
        tx.write(self.workspace.state_path()?, encode(&next)?)?;
        tx.execute().await?;

        info!(path = %record.path.display(), "Tracking file");
        Ok(record)
    }

    pub async fn is_tracked(&self, path: impl AsRef<Path>) -> CoreResult<bool> {
        let key = FileKey::resolve(path.as_ref())?;
        let state = self.workspace.load_state().await?;
        Ok(state.find(&key.path).is_some())
    }

    /// The tracking record for `path`.
    pub async fn tracked_file(&self, path: impl AsRef<Path>) -> CoreResult<TrackedFile> {
        let key = FileKey::resolve(path.as_ref())?;
        let state = self.workspace.load_state().await?;
        state
            .find(&key.path)
            .cloned()
            .ok_or(CoreError::NotTracked(key.path))
    }

    pub async fn list(&self) -> CoreResult<Vec<TrackedFile>> {
        Ok(self.workspace.load_state().await?.tracked_files)
    }

    /// Whether the working file differs from its backup.
    ///
    /// A deleted working file counts as changed.
    pub async fn has_changes(&self, path: impl AsRef<Path>) -> CoreResult<bool> {
        let record = self.tracked_file(path).await?;
        let backup = fs::read(&record.backup_path).await?;
        match fs::read_optional(&record.path).await? {
            Some(current) => Ok(current != backup),
            None => Ok(true),
        }
    }

    /// Line diff from the backup to the working file.
    pub async fn diff(&self, path: impl AsRef<Path>) -> CoreResult<DiffResult> {
        let key = FileKey::resolve(path.as_ref())?;
        let record = self.tracked_file(&key.path).await?;

        let backup = self.workspace.read_text(&record.backup_path).await?;
        let current = match self.workspace.read_text(&record.path).await {
            Ok(text) => text,
            Err(CoreError::NotFound(_)) => String::new(),
            Err(e) => return Err(e),
        };

        let label = key.label();
        let options = self
            .workspace
            .diff_options(format!("{label}@backup"), label);
        Ok(generate_diff(&backup, &current, &options))
    }

    /// Accept the working content and stop tracking.
    pub async fn keep(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let _timing = TimingGuard::backup("keep");
        let record = self.release(path.as_ref(), false).await?;
        info!(path = %record.path.display(), "Kept changes");
        Ok(())
    }

    /// Restore the backup over the working file and stop tracking.
    ///
    /// A working file deleted since `track` is recreated.
    pub async fn undo(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let _timing = TimingGuard::backup("undo");
        let record = self.release(path.as_ref(), true).await?;
        info!(path = %record.path.display(), "Restored backup");
        Ok(())
    }

    /// Stop tracking without touching the working file.
    pub async fn abort(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let _timing = TimingGuard::backup("abort");
        let record = self.release(path.as_ref(), false).await?;
        info!(path = %record.path.display(), "Stopped tracking");
        Ok(())
    }

    async fn release(&self, path: &Path, restore: bool) -> CoreResult<TrackedFile> {
        let key = FileKey::resolve(path)?;
        let _lock = self.workspace.locks().lock_with_state(&key.hash).await;

        let state = self.workspace.load_state().await?;
        let record = state
            .find(&key.path)
            .cloned()
            .ok_or_else(|| CoreError::NotTracked(key.path.clone()))?;
        let next = state.without(&record.path);

        let backup_exists = fs::is_file(&record.backup_path).await;
        if restore && !backup_exists {
            return Err(CoreError::corrupted(
                self.workspace.root(),
                format!("backup of {} is missing", record.path.display()),
            ));
        }

        let mut tx = Transaction::new();
        if restore {
            tx.copy(&record.backup_path, &record.path)?;
        }
        if backup_exists {
            tx.delete(&record.backup_path)?;
        } else {
            warn!(
                path = %record.path.display(),
                backup = %record.backup_path.display(),
                "Backup already gone, dropping record only"
            );
        }
        tx.write(self.workspace.state_path()?, encode(&next)?)?;
        tx.execute().await?;

        debug!(path = %record.path.display(), restore, "Released tracked file");
        Ok(record)
    }
}
